//! Common test utilities for E2E tests

use std::path::PathBuf;

use giftsync::{AppState, config};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Gift listing for an account with no collectibles
pub const EMPTY_GIFTS_SCRIPT: &str =
    r#"printf '{"success":true,"gifts":[],"user":{"username":"%s"}}\n' "${1#@}""#;

/// Decoration lookup that reports nothing usable
pub const BARE_PROFILE_SCRIPT: &str = r#"echo '{"success":true}'"#;

/// Test server instance
///
/// The fetcher runs `/bin/sh` scripts written into a temp dir, which is
/// also the scripts' working directory and holds the SQLite cache.
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Create a test server whose accounts have empty inventories
    pub async fn new() -> Self {
        Self::with_scripts(EMPTY_GIFTS_SCRIPT, BARE_PROFILE_SCRIPT).await
    }

    /// Create a test server running the given gift and profile scripts
    pub async fn with_scripts(gifts_script: &str, profile_script: &str) -> Self {
        giftsync::metrics::init_metrics();

        // Create temporary directory for scripts and the cache database
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("gifts.sh"), gifts_script).unwrap();
        std::fs::write(temp_dir.path().join("profile.sh"), profile_script).unwrap();

        // Create test configuration
        let config = config::AppConfig {
            server: config::ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0, // Let OS assign port
                allowed_origin: None,
            },
            fetcher: config::FetcherConfig {
                interpreter: PathBuf::from("/bin/sh"),
                working_dir: temp_dir.path().to_path_buf(),
                gifts_script: PathBuf::from("gifts.sh"),
                profile_script: PathBuf::from("profile.sh"),
                timeout_seconds: 10,
                max_output_bytes: 1024 * 1024,
            },
            cache: config::CacheConfig {
                mode: config::CacheMode::Sqlite,
                path: temp_dir.path().join("cache").join("profile_cache.db"),
            },
            profile: config::ProfileConfig {
                default_username: "collector".to_string(),
            },
            decoration: config::DecorationConfig { timeout_ms: 2000 },
            poll: config::PollConfig { delay_ms: 50 },
            logging: config::LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        };

        // Initialize app state
        let state = AppState::new(config).await.unwrap();

        // Create HTTP client
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        // Build router
        let app = giftsync::build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait a bit for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for API requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// GET `/profile-gifts` and return status plus JSON body
    pub async fn profile_gifts(&self, username: Option<&str>) -> (u16, serde_json::Value) {
        let path = match username {
            Some(username) => format!("/profile-gifts?username={}", encode(username)),
            None => "/profile-gifts".to_string(),
        };

        let response = self.client.get(self.url(&path)).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }

    /// Number of lines the scripts appended to `name` in their working dir
    #[allow(dead_code)]
    pub fn script_calls(&self, name: &str) -> usize {
        std::fs::read_to_string(self._temp_dir.path().join(name))
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
