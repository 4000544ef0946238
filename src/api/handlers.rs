use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::cache::CacheKey;
use crate::error::{AppError, AppResult};
use crate::models::RecommendationResponse;
use crate::services::Recommender;

use super::AppState;

const API_NAME: &str = "MultiSkill Academy Recommendation API";
const API_VERSION: &str = env!("CARGO_PKG_VERSION");

// Request types

#[derive(Debug, Deserialize)]
pub struct RecommendationParams {
    pub user_id: Option<String>,
    pub count: Option<usize>,
    pub mine_only: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsersParams {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct CoursesParams {
    pub source: Option<String>,
    pub limit: Option<usize>,
}

// Handlers

/// Service identity endpoint
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": API_NAME,
        "version": API_VERSION,
        "status": "running",
        "startup_time": state.started_at.to_rfc3339(),
    }))
}

/// Status endpoint: model, catalog and cache counters
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    let cache = state.cache.stats();
    let model_info = state.recommender.as_ref().map(|r| r.model().info());

    Json(json!({
        "status": "running",
        "api_version": API_VERSION,
        "model_loaded": model_info.is_some(),
        "users_count": model_info.as_ref().map_or(0, |info| info.user_count),
        "courses_count": model_info.as_ref().map_or(0, |info| info.item_count),
        "mine_courses_count": model_info.as_ref().map_or(0, |info| info.mine_count),
        "cache": {
            "size": cache.size,
            "hits": cache.hits,
            "misses": cache.misses,
        },
        "model_info": model_info.map_or_else(|| json!({}), |info| info.metadata),
    }))
}

/// Course recommendation endpoint
///
/// Checks the response cache first; on a miss runs the full pipeline and
/// stores the payload. Identical requests inside the TTL window return the
/// cached payload without touching the model.
pub async fn recommendations(
    State(state): State<AppState>,
    Query(params): Query<RecommendationParams>,
) -> AppResult<Json<RecommendationResponse>> {
    let recommender = loaded_recommender(&state)?;

    let user_id = params
        .user_id
        .ok_or_else(|| AppError::InvalidInput("Missing user_id parameter".to_string()))?;
    let count = params
        .count
        .unwrap_or(state.config.default_rec_count)
        .min(state.config.max_rec_count);
    let mine_only = params.mine_only.as_deref().map_or(true, parse_flag);

    let key = CacheKey {
        user_id: user_id.clone(),
        count,
        mine_only,
    };
    if let Some(cached) = state.cache.get(&key) {
        tracing::debug!(user_id = %user_id, "Recommendation cache hit");
        return Ok(Json(cached));
    }

    let payload = recommender
        .recommend(&user_id, count, mine_only)
        .map_err(|error| {
            tracing::error!(user_id = %user_id, error = %error, "Recommendation pipeline failed");
            AppError::from(error)
        })?;

    state.cache.insert(key, payload.clone());
    Ok(Json(payload))
}

/// Known user ids, paginated
pub async fn users(
    State(state): State<AppState>,
    Query(params): Query<UsersParams>,
) -> AppResult<Json<Value>> {
    let recommender = loaded_recommender(&state)?;
    let limit = params.limit.unwrap_or(100);
    let offset = params.offset.unwrap_or(0);

    let users = recommender.model().users();
    let total = users.len();
    let page: Vec<Value> = users.into_iter().skip(offset).take(limit).collect();

    Ok(Json(json!({
        "total": total,
        "offset": offset,
        "limit": limit,
        "users": page,
    })))
}

/// Course catalog listing, optionally filtered by data source
pub async fn courses(
    State(state): State<AppState>,
    Query(params): Query<CoursesParams>,
) -> AppResult<Json<Value>> {
    let recommender = loaded_recommender(&state)?;
    let limit = params.limit.unwrap_or(100);

    let courses = recommender.model().courses(params.source.as_deref());
    let total = courses.len();
    let page: Vec<_> = courses.into_iter().take(limit).collect();

    Ok(Json(json!({
        "total": total,
        "source": params.source,
        "limit": limit,
        "courses": page,
    })))
}

fn loaded_recommender(state: &AppState) -> AppResult<&Recommender> {
    state.recommender.as_ref().ok_or_else(|| {
        AppError::ModelUnavailable(
            "Model is not loaded, recommendations are unavailable".to_string(),
        )
    })
}

/// Accepts the flag spellings deployed clients actually send.
fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag("TRUE"));
        assert!(parse_flag("1"));
        assert!(parse_flag("yes"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("no"));
        assert!(!parse_flag(""));
    }
}
