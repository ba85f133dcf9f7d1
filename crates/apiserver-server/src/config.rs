use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_http_host")]
    pub http_host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Upper bound for reading a request and producing its response.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Keep-alive idle timeout. Reported at startup only.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Pause between receiving the interrupt and starting to drain.
    #[serde(default)]
    pub stop_delay_secs: u64,
    /// How long in-flight requests may run after draining starts.
    #[serde(default = "default_graceful_timeout_secs")]
    pub graceful_timeout_secs: u64,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL. When set, the individual fields below are ignored.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default = "default_db_password")]
    pub password: String,
    #[serde(default = "default_db_name")]
    pub dbname: String,
    #[serde(default = "default_sslmode")]
    pub sslmode: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// File receiving SQL statement logs. Empty disables the file.
    #[serde(default = "default_sql_log_file")]
    pub sql_log_file: String,
    #[serde(default = "default_true")]
    pub sql_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Accept every request without checking credentials. Development only.
    #[serde(default)]
    pub bypass: bool,
    #[serde(default = "default_credentials")]
    pub credentials: BTreeMap<String, String>,
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_graceful_timeout_secs() -> u64 {
    15
}

fn default_db_host() -> String {
    "127.0.0.1".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_user() -> String {
    "masud".to_string()
}

fn default_db_password() -> String {
    "masud123".to_string()
}

fn default_db_name() -> String {
    "apiserver".to_string()
}

fn default_sslmode() -> String {
    "disable".to_string()
}

fn default_timezone() -> String {
    "Asia/Dhaka".to_string()
}

fn default_sql_log_file() -> String {
    "apiserver.log".to_string()
}

fn default_true() -> bool {
    true
}

fn default_credentials() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("masud".to_string(), "pass".to_string()),
        ("admin".to_string(), "admin".to_string()),
    ])
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_host: default_http_host(),
            http_port: default_http_port(),
            request_timeout_secs: default_request_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            stop_delay_secs: 0,
            graceful_timeout_secs: default_graceful_timeout_secs(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: default_db_password(),
            dbname: default_db_name(),
            sslmode: default_sslmode(),
            timezone: default_timezone(),
            sql_log_file: default_sql_log_file(),
            sql_logging: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bypass: false,
            credentials: default_credentials(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl DatabaseConfig {
    /// The `url` override when set, otherwise a PostgreSQL URL built from
    /// the parts. User and password are percent-encoded.
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}?sslmode={}",
                urlencoding::encode(&self.user),
                urlencoding::encode(&self.password),
                self.host,
                self.port,
                self.dbname,
                self.sslmode
            ),
        }
    }

    /// [`connection_url`](Self::connection_url) with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        redact_password(&self.connection_url())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }
}

fn redact_password(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let rest = &url[scheme_end + 3..];
    let Some(at) = rest.find('@') else {
        return url.to_string();
    };
    match rest[..at].find(':') {
        Some(colon) => format!(
            "{}{}:***{}",
            &url[..scheme_end + 3],
            &rest[..colon],
            &rest[at..]
        ),
        None => url.to_string(),
    }
}
