use meshlink_core::{CoreError, Result};

/// CA service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Config {
    /// Read `CA_BIND` and `CA_PORT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match lookup("CA_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| CoreError::Config(format!("CA_PORT is not a port: {raw}")))?,
            None => defaults.port,
        };
        Ok(Self {
            bind_host: lookup("CA_BIND").unwrap_or(defaults.bind_host),
            port,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }
}
