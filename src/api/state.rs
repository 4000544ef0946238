use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cache::RecommendationCache;
use crate::config::Config;
use crate::services::Recommender;

/// Shared application state
///
/// The recommender (and the model behind it) and the configuration are
/// read-only after startup. The cache is the only mutable shared structure
/// and synchronizes internally, so the state clones freely into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Absent when the model artifact failed to load; the API then serves
    /// degraded (status works, model-backed endpoints return 503).
    pub recommender: Option<Recommender>,
    pub cache: Arc<RecommendationCache>,
    pub config: Arc<Config>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Creates the state shared by all request handlers
    pub fn new(
        recommender: Option<Recommender>,
        cache: RecommendationCache,
        config: Config,
    ) -> Self {
        Self {
            recommender,
            cache: Arc::new(cache),
            config: Arc::new(config),
            started_at: Utc::now(),
        }
    }
}
