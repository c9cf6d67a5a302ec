use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryAssignmentSubmitter, InMemoryNotifier};
use crate::routes::with_autofix_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use lesson_autofix::config::AppConfig;
use lesson_autofix::error::AppError;
use lesson_autofix::telemetry;
use lesson_autofix::workflows::autofix::{AutoFixService, Collaborators};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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

    let submitter = Arc::new(InMemoryAssignmentSubmitter::default());
    let notifier = Arc::new(InMemoryNotifier::default());
    let autofix_service = Arc::new(AutoFixService::new(
        Collaborators::standard(),
        config.autofix,
        submitter,
        notifier,
    ));

    let app = with_autofix_routes(autofix_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        threshold_minutes = config.autofix.threshold_minutes,
        "lesson auto-fix service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
