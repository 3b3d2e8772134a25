use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::domain::LoginMethod;

/// Name of the dot-file holding the generated CSRF key.
pub const CSRF_KEY_FILE: &str = ".quillpress-csrf-key";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub user: UserConfig,

    pub session: SessionConfig,

    pub csrf: CsrfConfig,

    pub blog: BlogConfig,

    pub file: FileConfig,

    pub mail: MailConfig,

    pub server: ServerConfig,

    pub log: LogConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    /// Number of tokio worker threads (0 = number of CPU cores)
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/quillpress.db".to_string(),
            worker_threads: 0,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Minimum plain password length enforced on create and password change.
    pub min_password_length: usize,

    pub login_method: LoginMethod,

    /// bcrypt work factor.
    pub bcrypt_cost: u32,

    /// Log every user create/update/remove through the audit hooks.
    pub audit_hooks: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            min_password_length: 12,
            login_method: LoginMethod::Username,
            bcrypt_cost: 12,
            audit_hooks: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is purged.
    pub ttl_minutes: u64,

    /// Period of the session sweeper.
    pub gc_interval_seconds: u64,

    pub cookie_name: String,

    pub cookie_path: String,

    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 60,
            gc_interval_seconds: 60,
            cookie_name: "quillpress-session".to_string(),
            cookie_path: "/".to_string(),
            cookie_secure: true,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }

    #[must_use]
    pub const fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_seconds)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Hex encoded key; generated and persisted to [`CSRF_KEY_FILE`] when empty.
    pub random_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    pub title: String,

    pub description: String,

    pub language: String,

    pub articles_per_page: u64,

    /// Number of items in the RSS feed.
    pub feed_items: u64,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            title: "quillpress".to_string(),
            description: "A small blog".to_string(),
            language: "en-us".to_string(),
            articles_per_page: 20,
            feed_items: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Upload root; blobs live at `<location>/<unique name>`.
    pub location: String,

    /// Upper bound for a single upload in bytes.
    pub max_upload_size: usize,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            location: "./uploads".to_string(),
            max_upload_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub enabled: bool,

    pub host: String,

    pub port: u16,

    pub user: String,

    pub password: String,

    pub sender: String,

    pub subject_prefix: String,

    /// Capacity of the outgoing mail queue.
    pub queue_size: usize,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: 587,
            user: String::new(),
            password: String::new(),
            sender: String::new(),
            subject_prefix: "[quillpress]".to_string(),
            queue_size: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,

    pub port: u16,

    pub tls: bool,

    pub cert: String,

    pub key: String,

    /// Public base URL embedded in feed and mail links.
    pub domain: String,

    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8080,
            tls: false,
            cert: String::new(),
            key: String::new(),
            domain: "http://localhost:8080".to_string(),
            cors_allowed_origins: vec![],
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    /// Domain without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.domain.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,

    /// Append to this file instead of stdout when set.
    pub path: Option<String>,

    /// Emit one log line per HTTP request.
    pub access: bool,

    /// `text` or `json`
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
            access: true,
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("quillpress").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".quillpress").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.blog.articles_per_page == 0 {
            anyhow::bail!("blog.articles_per_page must be > 0");
        }

        if self.user.min_password_length == 0 {
            anyhow::bail!("user.min_password_length must be > 0");
        }

        if !(4..=31).contains(&self.user.bcrypt_cost) {
            anyhow::bail!("user.bcrypt_cost must be between 4 and 31");
        }

        if self.server.tls && (self.server.cert.is_empty() || self.server.key.is_empty()) {
            anyhow::bail!("server.cert and server.key are required when server.tls is enabled");
        }

        url::Url::parse(&self.server.domain)
            .with_context(|| format!("server.domain is not a valid URL: {}", self.server.domain))?;

        if self.mail.enabled && (self.mail.host.is_empty() || self.mail.sender.is_empty()) {
            anyhow::bail!("mail.host and mail.sender are required when mail is enabled");
        }

        if self.session.gc_interval_seconds == 0 {
            anyhow::bail!("session.gc_interval_seconds must be > 0");
        }

        Ok(())
    }

    /// Returns the CSRF key, generating and persisting one next to the binary if unset.
    pub fn ensure_csrf_key(&mut self) -> Result<String> {
        if !self.csrf.random_key.is_empty() {
            return Ok(self.csrf.random_key.clone());
        }

        let dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        let key = load_or_create_key(&dir.join(CSRF_KEY_FILE))?;
        self.csrf.random_key.clone_from(&key);
        Ok(key)
    }
}

fn load_or_create_key(path: &Path) -> Result<String> {
    if path.exists() {
        let key = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read CSRF key from {}", path.display()))?;
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }

    let bytes: [u8; 32] = rand::random();
    let key = hex::encode(bytes);
    std::fs::write(path, &key)
        .with_context(|| format!("Failed to persist CSRF key to {}", path.display()))?;
    info!("Generated CSRF key at {}", path.display());
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.user.min_password_length, 12);
        assert_eq!(config.user.bcrypt_cost, 12);
        assert_eq!(config.user.login_method, LoginMethod::Username);
        assert!(config.session.cookie_secure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[user]"));
        assert!(toml_str.contains("[session]"));
        assert!(toml_str.contains("[mail]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [user]
            min_password_length = 16
            login_method = "mail"

            [session]
            ttl_minutes = 5
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.user.min_password_length, 16);
        assert_eq!(config.user.login_method, LoginMethod::Mail);
        assert_eq!(config.session.ttl(), Duration::from_secs(300));

        assert_eq!(config.blog.articles_per_page, 20);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.blog.articles_per_page = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.tls = true;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.mail.enabled = true;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.user.bcrypt_cost = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_csrf_key_is_persisted() {
        let path = std::env::temp_dir().join(format!("csrf-{}", uuid::Uuid::new_v4()));

        let first = load_or_create_key(&path).unwrap();
        let second = load_or_create_key(&path).unwrap();
        assert_eq!(first.len(), 64);
        assert_eq!(first, second);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_base_url_trims_slash() {
        let mut server = ServerConfig::default();
        server.domain = "https://blog.example.com/".to_string();
        assert_eq!(server.base_url(), "https://blog.example.com");
    }
}
