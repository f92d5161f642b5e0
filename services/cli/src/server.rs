use crate::cli::SandboxArgs;
use crate::infra::AppState;
use crate::routes::sandbox_app;
use admissions_wizard::config::AppConfig;
use admissions_wizard::error::AppError;
use admissions_wizard::telemetry;
use admissions_wizard::workflows::registration::SandboxState;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) fn run(args: SandboxArgs) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(args))
}

async fn serve(mut args: SandboxArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.sandbox.host = host;
    }
    if let Some(port) = args.port.take() {
        config.sandbox.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let mut sandbox = SandboxState::seeded();
    if let Some(token) = config.api.token.clone() {
        sandbox = sandbox.with_token(token);
    }

    let app = sandbox_app(sandbox)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.sandbox.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "admissions sandbox ready");

    axum::serve(listener, app).await?;
    Ok(())
}
