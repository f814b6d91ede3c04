//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The app secret is loaded from CONNECT_APP_SECRET or secret_file, never
//! stored in the TOML directly.

use common::Secret;
use connect_auth::{AppCredentials, Endpoints, GRAPH_URL, WWW_URL};
use graph_api::TransportConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// The registered application
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub app_id: String,
    #[serde(skip)]
    pub secret: Option<Secret<String>>,
    /// Path to a file containing the app secret (alternative to CONNECT_APP_SECRET)
    #[serde(default)]
    pub secret_file: Option<PathBuf>,
}

/// Provider endpoints and transport settings
#[derive(Debug, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
    #[serde(default = "default_www_url")]
    pub www_url: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub ca_bundle: Option<PathBuf>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Session store location. In-memory when `path` is unset.
#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_graph_url() -> String {
    GRAPH_URL.to_string()
}

fn default_www_url() -> String {
    WWW_URL.to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_timeout() -> u64 {
    60
}

fn default_session_cookie() -> String {
    "connect_sid".to_string()
}

fn default_max_connections() -> usize {
    1000
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            graph_url: default_graph_url(),
            www_url: default_www_url(),
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
            ca_bundle: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution order:
    /// 1. CONNECT_APP_SECRET env var
    /// 2. secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.app.app_id.trim().is_empty() {
            return Err(common::Error::Config("app_id must not be empty".into()));
        }

        for (name, url) in [
            ("graph_url", &config.graph.graph_url),
            ("www_url", &config.graph.www_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{name} must start with http:// or https://, got: {url}"
                )));
            }
        }

        if config.graph.connect_timeout_secs == 0 || config.graph.timeout_secs == 0 {
            return Err(common::Error::Config(
                "connect_timeout_secs and timeout_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Env var takes precedence over file
        if let Ok(secret) = std::env::var("CONNECT_APP_SECRET") {
            config.app.secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.app.secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.app.secret = Some(Secret::new(secret));
            }
        }

        if config.app.secret.as_ref().is_none_or(Secret::is_empty) {
            return Err(common::Error::Config(
                "no app secret: set CONNECT_APP_SECRET or app.secret_file".into(),
            ));
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("connect-gateway.toml")
    }

    pub fn credentials(&self) -> common::Result<AppCredentials> {
        let secret = self
            .app
            .secret
            .as_ref()
            .ok_or_else(|| common::Error::Config("app secret not loaded".into()))?;
        Ok(AppCredentials::new(
            self.app.app_id.clone(),
            secret.expose().clone(),
        ))
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            graph: self.graph.graph_url.clone(),
            www: self.graph.www_url.clone(),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_secs(self.graph.connect_timeout_secs),
            timeout: Duration::from_secs(self.graph.timeout_secs),
            ca_bundle: self.graph.ca_bundle.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    const MINIMAL: &str = r#"
[app]
app_id = "1234"

[server]
listen_addr = "127.0.0.1:8080"
"#;

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_minimal_config_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, MINIMAL);

        unsafe { set_env("CONNECT_APP_SECRET", "s3cret") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("CONNECT_APP_SECRET") };

        assert_eq!(config.app.app_id, "1234");
        assert_eq!(config.graph.graph_url, "https://graph.facebook.com/");
        assert_eq!(config.graph.www_url, "https://www.facebook.com/");
        assert_eq!(config.graph.connect_timeout_secs, 10);
        assert_eq!(config.graph.timeout_secs, 60);
        assert_eq!(config.server.session_cookie, "connect_sid");
        assert_eq!(config.server.max_connections, 1000);
        assert!(config.store.path.is_none());

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.application_token(), "1234|s3cret");
        assert_eq!(config.transport().timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(common::Error::Io(_))));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("app_secret");
        std::fs::write(&secret_path, "file-secret\n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[app]
app_id = "1234"
secret_file = "{}"

[server]
listen_addr = "127.0.0.1:8080"

[store]
path = "/var/lib/connect/sessions.json"
"#,
                secret_path.display()
            ),
        );

        unsafe { remove_env("CONNECT_APP_SECRET") };
        let config = Config::load(&path).unwrap();
        assert_eq!(config.app.secret.as_ref().unwrap().expose(), "file-secret");
        assert_eq!(
            config.store.path,
            Some(PathBuf::from("/var/lib/connect/sessions.json"))
        );
    }

    #[test]
    fn test_secret_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[app]
app_id = "1234"
secret_file = "/nonexistent/app_secret"

[server]
listen_addr = "127.0.0.1:8080"
"#,
        );

        unsafe { set_env("CONNECT_APP_SECRET", "env-secret") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env("CONNECT_APP_SECRET") };
        assert_eq!(config.app.secret.as_ref().unwrap().expose(), "env-secret");
    }

    #[test]
    fn test_missing_secret_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, MINIMAL);

        unsafe { remove_env("CONNECT_APP_SECRET") };
        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("no app secret"), "got: {err}");
    }

    #[test]
    fn test_empty_secret_file_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("app_secret");
        std::fs::write(&secret_path, "  \n").unwrap();
        let path = write_config(
            &dir,
            &format!(
                r#"
[app]
app_id = "1234"
secret_file = "{}"

[server]
listen_addr = "127.0.0.1:8080"
"#,
                secret_path.display()
            ),
        );

        unsafe { remove_env("CONNECT_APP_SECRET") };
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONNECT_APP_SECRET", "s") };

        let cases = [
            (
                "empty app_id",
                r#"
[app]
app_id = ""
[server]
listen_addr = "127.0.0.1:8080"
"#,
            ),
            (
                "schemeless graph_url",
                r#"
[app]
app_id = "1"
[graph]
graph_url = "graph.facebook.com"
[server]
listen_addr = "127.0.0.1:8080"
"#,
            ),
            (
                "zero timeout",
                r#"
[app]
app_id = "1"
[graph]
timeout_secs = 0
[server]
listen_addr = "127.0.0.1:8080"
"#,
            ),
            (
                "zero max_connections",
                r#"
[app]
app_id = "1"
[server]
listen_addr = "127.0.0.1:8080"
max_connections = 0
"#,
            ),
        ];

        for (name, contents) in cases {
            let dir = tempfile::tempdir().unwrap();
            let path = write_config(&dir, contents);
            assert!(
                matches!(Config::load(&path), Err(common::Error::Config(_))),
                "{name} must be rejected"
            );
        }

        unsafe { remove_env("CONNECT_APP_SECRET") };
    }

    #[test]
    fn test_resolve_path_cli_arg() {
        let path = Config::resolve_path(Some("/custom/path.toml"));
        assert_eq!(path, PathBuf::from("/custom/path.toml"));
    }

    #[test]
    fn test_resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/path.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("connect-gateway.toml"));
    }
}
