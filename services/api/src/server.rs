use crate::cli::ServeArgs;
use crate::infra::{
    demo_job, seed_candidates, AppState, InMemoryCandidateStore, InMemorySavedFilterStore,
};
use crate::routes::with_pipeline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use talent_pipeline::config::AppConfig;
use talent_pipeline::error::AppError;
use talent_pipeline::telemetry;
use talent_pipeline::workflows::candidates::{
    CandidateStore, NotificationSink, PipelineSession, PipelineState, SavedFilterRegistry,
    SavedFilterStore, TracingNotificationSink,
};
use tracing::{debug, info};

const TICK_INTERVAL: Duration = Duration::from_millis(100);

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let candidates: Arc<dyn CandidateStore> =
        Arc::new(InMemoryCandidateStore::seeded(seed_candidates(Utc::now())));
    let notifications: Arc<dyn NotificationSink> = Arc::new(TracingNotificationSink);
    let mut session = PipelineSession::new(candidates, notifications, &config.pipeline);
    session.load(Some(demo_job()))?;

    let saved: Arc<dyn SavedFilterStore> = Arc::new(InMemorySavedFilterStore::default());
    let registry = SavedFilterRegistry::new(saved, config.pipeline.share_base_url.clone());
    let pipeline = PipelineState::new(session, registry);

    spawn_ticker(pipeline.clone());

    let app = with_pipeline_routes(pipeline)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "candidate pipeline service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Drives the search debounce and undo expiry deadlines.
fn spawn_ticker(pipeline: PipelineState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            let report = pipeline.lock().tick(Utc::now());
            if report.filter_applied || report.undo_expired {
                debug!(
                    filter_applied = report.filter_applied,
                    pruned = report.pruned,
                    undo_expired = report.undo_expired,
                    "pipeline timers fired"
                );
            }
        }
    });
}
