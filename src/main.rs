use std::sync::Arc;

use eta_predictor::config::Config;
use eta_predictor::feedback::FeedbackStore;
use eta_predictor::model::Pipeline;
use eta_predictor::server::{router, AppState};
use eta_predictor::types::FeatureRecord;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::from_env();

    // A failed load is not fatal: the server still serves the feedback
    // table and export, and /predict answers "model unavailable".
    let pipeline = match Pipeline::load(&cfg.pipeline_path) {
        Ok(p) => {
            tracing::info!(
                "loaded pipeline from '{}' ({} inputs)",
                cfg.pipeline_path.display(),
                p.in_dim()
            );
            Some(Arc::new(p))
        }
        Err(e) => {
            tracing::error!("pipeline load failed: {e}");
            None
        }
    };

    // Warmup with the stock form defaults so a bad artifact shows up in
    // the logs before the first request does.
    if let Some(p) = &pipeline {
        match p.predict(&FeatureRecord::default()) {
            Ok(minutes) => tracing::info!("warmup predict ok ({minutes} min)"),
            Err(e) => tracing::warn!("warmup predict failed: {e}"),
        }
    }

    if !cfg.logo_path.exists() {
        tracing::warn!(
            "logo file '{}' not found; /logo will answer 404",
            cfg.logo_path.display()
        );
    }

    let state = AppState {
        pipeline,
        store: Arc::new(FeedbackStore::new(&cfg.feedback_path)),
        logo_path: Arc::new(cfg.logo_path.clone()),
    };
    let app = router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
