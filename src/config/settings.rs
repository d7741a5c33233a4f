//! Typed settings for the fixed configuration domains.
//!
//! Each domain is an explicit struct with a default for every field, so a
//! missing or partially-written document always deserializes to something
//! usable. Loading falls back to defaults on any miss; saving goes through
//! the generic store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::store::ConfigStore;

/// Proxy scheme used to build the proxy URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyScheme {
    #[default]
    Http,
    Socks5,
}

impl ProxyScheme {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Socks5 => "socks5",
        }
    }
}

/// Proxy configuration applied around installer invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub scheme: ProxyScheme,

    #[serde(default)]
    pub host: String,

    #[serde(default = "default_proxy_port")]
    pub port: u16,

    /// Optional basic-auth credentials, embedded in the proxy URL when set.
    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,
}

fn default_proxy_port() -> u16 {
    1080
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            scheme: ProxyScheme::Http,
            host: String::new(),
            port: default_proxy_port(),
            username: String::new(),
            password: String::new(),
        }
    }
}

impl ProxySettings {
    pub const DOMAIN: &'static str = "proxy";

    /// Load from the store, defaulting on a missing or corrupt document.
    pub fn load(store: &ConfigStore) -> Self {
        store.load_as(Self::DOMAIN).unwrap_or_default()
    }

    /// Persist to the store.
    pub fn store(&self, store: &ConfigStore) -> bool {
        store.save_as(Self::DOMAIN, self)
    }

    /// The composed proxy URL, `scheme://[user:pass@]host:port`.
    pub fn proxy_url(&self) -> String {
        if self.username.is_empty() {
            format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
        } else {
            format!(
                "{}://{}:{}@{}:{}",
                self.scheme.as_str(),
                self.username,
                self.password,
                self.host,
                self.port
            )
        }
    }

    /// Environment variables to overlay on installer invocations.
    ///
    /// Enabled: `HTTP_PROXY`/`HTTPS_PROXY` set to the proxy URL. Disabled:
    /// both set to empty, which the process layer interprets as removal, so
    /// a previously-exported proxy never leaks into an invocation.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        let value = if self.enabled {
            self.proxy_url()
        } else {
            String::new()
        };
        vec![
            ("HTTP_PROXY".to_string(), value.clone()),
            ("HTTPS_PROXY".to_string(), value),
        ]
    }
}

/// Theme selection and palette overrides for the shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeSettings {
    #[serde(default = "default_theme_name")]
    pub name: String,

    /// Named color overrides, e.g. `accent -> "#268bd2"`.
    #[serde(default)]
    pub palette: BTreeMap<String, String>,
}

fn default_theme_name() -> String {
    "light".to_string()
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            name: default_theme_name(),
            palette: BTreeMap::new(),
        }
    }
}

impl ThemeSettings {
    pub const DOMAIN: &'static str = "theme";

    pub fn load(store: &ConfigStore) -> Self {
        store.load_as(Self::DOMAIN).unwrap_or_default()
    }

    pub fn store(&self, store: &ConfigStore) -> bool {
        store.save_as(Self::DOMAIN, self)
    }
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralSettings {
    /// Base interpreter used to create new virtual environments.
    #[serde(default = "default_python")]
    pub python: String,

    /// Timeout in seconds for mirror latency probes.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_python() -> String {
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

fn default_probe_timeout() -> u64 {
    5
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            python: default_python(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl GeneralSettings {
    pub const DOMAIN: &'static str = "settings";

    pub fn load(store: &ConfigStore) -> Self {
        store.load_as(Self::DOMAIN).unwrap_or_default()
    }

    pub fn store(&self, store: &ConfigStore) -> bool {
        store.save_as(Self::DOMAIN, self)
    }
}
