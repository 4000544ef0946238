use serde::Deserialize;

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the trained model artifact
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Seconds a cached recommendation payload stays fresh
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,

    /// Entry count past which the cache compacts down to half
    #[serde(default = "default_max_cache_size")]
    pub max_cache_size: usize,

    /// Recommendation count used when the request does not specify one
    #[serde(default = "default_rec_count")]
    pub default_rec_count: usize,

    /// Upper bound on the requested recommendation count
    #[serde(default = "default_max_rec_count")]
    pub max_rec_count: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_model_path() -> String {
    "models/recommendation_model.json".to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_max_cache_size() -> usize {
    1000
}

fn default_rec_count() -> usize {
    10
}

fn default_max_rec_count() -> usize {
    50
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }
}
