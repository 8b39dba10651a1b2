//! Server configuration.

use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use rustls::{Certificate, PrivateKey};
use serde::Deserialize;
use thiserror::Error;

/// Errors that could happen when loading or processing a config
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TLS error: {0}")]
    TlsError(#[from] rustls::Error),
    #[error("{0}")]
    FormatError(String),
}

/// TLS material for the listener; presence of this section enables TLS.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

fn default_name() -> String {
    "localhost".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_addr() -> String {
    "127.0.0.1:6667".to_string()
}

fn default_registered_idle_secs() -> u64 {
    180
}

fn default_unregistered_idle_secs() -> u64 {
    60
}

fn default_quit_secs() -> u64 {
    180
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name used in the prefix of every server-sourced message.
    #[serde(default = "default_name")]
    pub name: String,

    /// Reported in RPL_YOURHOST and RPL_MYINFO.
    #[serde(default = "default_version")]
    pub version: String,

    /// Message of the day; empty means ERR_NOMOTD.
    #[serde(default)]
    pub motd: String,

    /// `host:port` to bind the listener to.
    #[serde(default = "default_addr")]
    pub addr: String,

    /// Server password checked by PASS; empty disables authentication.
    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub tls: Option<TlsConfig>,

    /// Idle interval before a registered client is PINGed.
    #[serde(default = "default_registered_idle_secs")]
    pub registered_idle_secs: u64,

    /// Idle interval before an unregistered client is dropped.
    #[serde(default = "default_unregistered_idle_secs")]
    pub unregistered_idle_secs: u64,

    /// Grace interval between the PING and the disconnect.
    #[serde(default = "default_quit_secs")]
    pub quit_secs: u64,

    /// Username to password map seeding the built-in operator authenticator.
    #[serde(default)]
    pub opers: HashMap<String, String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
            motd: String::new(),
            addr: default_addr(),
            password: String::new(),
            tls: None,
            registered_idle_secs: default_registered_idle_secs(),
            unregistered_idle_secs: default_unregistered_idle_secs(),
            quit_secs: default_quit_secs(),
            opers: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// Load the server configuration from a given file path
    pub fn load_file<P: AsRef<Path>>(filename: P) -> Result<Self, ConfigError> {
        let file = File::open(filename)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn registered_idle(&self) -> Duration {
        Duration::from_secs(self.registered_idle_secs)
    }

    pub fn unregistered_idle(&self) -> Duration {
        Duration::from_secs(self.unregistered_idle_secs)
    }

    pub fn quit_interval(&self) -> Duration {
        Duration::from_secs(self.quit_secs)
    }
}

impl TlsConfig {
    fn load_cert_and_key(&self) -> Result<(Vec<Certificate>, PrivateKey), ConfigError> {
        let cert_file = File::open(&self.cert_file)?;
        let mut cert_reader = BufReader::new(cert_file);
        let cert_chain = rustls_pemfile::certs(&mut cert_reader)?
            .into_iter()
            .map(Certificate)
            .collect();

        let key_file = File::open(&self.key_file)?;
        let mut key_reader = BufReader::new(key_file);
        let server_key = rustls_pemfile::read_one(&mut key_reader)?;

        use rustls_pemfile::Item;

        let server_key = match server_key {
            Some(Item::RSAKey(key)) | Some(Item::PKCS8Key(key)) | Some(Item::ECKey(key)) => key,
            _ => return Err(ConfigError::FormatError("No private key in file".to_string())),
        };

        Ok((cert_chain, PrivateKey(server_key)))
    }

    /// Builds the rustls server configuration for the listener.
    pub fn server_config(&self) -> Result<Arc<rustls::ServerConfig>, ConfigError> {
        let (cert_chain, key) = self.load_cert_and_key()?;
        let config = rustls::ServerConfig::builder()
            .with_safe_defaults()
            .with_no_client_auth()
            .with_single_cert(cert_chain, key)?;
        Ok(Arc::new(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.name, "localhost");
        assert_eq!(config.version, "1.0");
        assert!(config.password.is_empty());
        assert!(config.tls.is_none());
        assert_eq!(config.registered_idle(), Duration::from_secs(180));
    }

    #[test]
    fn parses_full_config() {
        let config: ServerConfig = serde_json::from_str(
            r#"{
                "name": "irc.example.net",
                "addr": "0.0.0.0:6667",
                "motd": "welcome",
                "password": "hunter2",
                "quit_secs": 30,
                "opers": { "admin": "secret" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.name, "irc.example.net");
        assert_eq!(config.motd, "welcome");
        assert_eq!(config.quit_interval(), Duration::from_secs(30));
        assert_eq!(config.opers.get("admin").map(String::as_str), Some("secret"));
    }
}
