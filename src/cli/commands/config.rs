//! `cairn config` — show and change configuration.

use crate::cli::args::{ConfigCommands, ProxyArgs};
use crate::config::{GeneralSettings, ProxyScheme, ProxySettings, ThemeSettings};
use crate::error::Result;
use crate::events::{EventBus, EventSink};

use super::{error, report, App};

pub fn run(app: &App, command: &ConfigCommands) -> Result<i32> {
    match command {
        ConfigCommands::Show => show(app),
        ConfigCommands::Proxy(args) => proxy(app, args),
    }
}

fn show(app: &App) -> Result<i32> {
    let store = app.config_store(EventSink::detached())?;

    let general = GeneralSettings::load(&store);
    println!("{}", console::style("settings").bold());
    println!("  python:              {}", general.python);
    println!("  probe timeout:       {}s", general.probe_timeout_secs);

    let proxy = ProxySettings::load(&store);
    println!("{}", console::style("proxy").bold());
    println!("  enabled:             {}", proxy.enabled);
    if !proxy.host.is_empty() {
        // Mask credentials; the URL may embed them
        println!(
            "  url:                 {}://{}:{}",
            match proxy.scheme {
                ProxyScheme::Http => "http",
                ProxyScheme::Socks5 => "socks5",
            },
            proxy.host,
            proxy.port
        );
    }

    let theme = ThemeSettings::load(&store);
    println!("{}", console::style("theme").bold());
    println!("  name:                {}", theme.name);

    let domains = store.list();
    if !domains.is_empty() {
        println!("{}", console::style("stored domains").bold());
        for domain in domains {
            println!("  {}", domain);
        }
    }
    Ok(0)
}

fn proxy(app: &App, args: &ProxyArgs) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let store = app.config_store(sink)?;

    let mut settings = ProxySettings::load(&store);

    if args.enable {
        settings.enabled = true;
    }
    if args.disable {
        settings.enabled = false;
    }
    if let Some(scheme) = &args.scheme {
        settings.scheme = match scheme.to_lowercase().as_str() {
            "http" => ProxyScheme::Http,
            "socks5" => ProxyScheme::Socks5,
            other => {
                error(&format!("Unknown proxy scheme '{}'", other));
                return Ok(1);
            }
        };
    }
    if let Some(host) = &args.host {
        settings.host = host.clone();
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(username) = &args.username {
        settings.username = username.clone();
    }
    if let Some(password) = &args.password {
        settings.password = password.clone();
    }

    let ok = settings.store(&store);
    let state = if settings.enabled { "enabled" } else { "disabled" };
    Ok(report(
        ok,
        &format!("Proxy settings saved ({})", state),
        &rx,
    ))
}
