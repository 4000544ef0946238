use std::sync::Arc;
use std::time::Duration;

use academy_rec_api::api::{create_router, AppState};
use academy_rec_api::cache::RecommendationCache;
use academy_rec_api::config::Config;
use academy_rec_api::model::RecommenderModel;
use academy_rec_api::services::Recommender;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "academy_rec_api=info,tower_http=info".into()),
        )
        .init();

    // A missing model is a degraded start, not a fatal one: status keeps
    // working and model-backed endpoints answer 503 until a restart with a
    // valid artifact.
    let recommender = match RecommenderModel::load(&config.model_path) {
        Ok(model) => {
            let info = model.info();
            tracing::info!(
                users = info.user_count,
                courses = info.item_count,
                mine_courses = info.mine_count,
                "Model loaded"
            );
            Some(Recommender::new(Arc::new(model)))
        }
        Err(error) => {
            tracing::warn!(
                error = %error,
                path = %config.model_path,
                "Could not load model - API will serve degraded"
            );
            None
        }
    };

    let cache = RecommendationCache::new(
        Duration::from_secs(config.cache_ttl),
        config.max_cache_size,
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(recommender, cache, config);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Server running");
    axum::serve(listener, app).await?;

    Ok(())
}
