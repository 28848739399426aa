//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::path::Path;

use axum::Router;

use crate::config::AppConfig;

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Config pointing the completion client at `base_url` and storage into `dir`.
pub fn test_config(base_url: &str, dir: &Path) -> AppConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("BOT_TOKEN", "123:test".to_string()),
        ("OPENROUTER_API_KEY", "sk-test".to_string()),
        ("MODEL_ID", "test/model".to_string()),
        ("OPENROUTER_BASE_URL", base_url.to_string()),
        ("MEMORY_PATH", dir.join("memory.json").display().to_string()),
        ("LOG_DIR", dir.join("logs").display().to_string()),
        ("LLM_TIMEOUT_SECS", "5".to_string()),
        ("LLM_RETRY_BACKOFF_MS", "1".to_string()),
    ]);
    AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}
