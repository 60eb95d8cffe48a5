use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_broker_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use broker_ai::agents::OpenAiModel;
use broker_ai::channels::whatsapp::InfobipClient;
use broker_ai::config::AppConfig;
use broker_ai::conversation::BrokerService;
use broker_ai::error::AppError;
use broker_ai::storage::S3ArtifactStore;
use broker_ai::store::InMemoryStore;
use broker_ai::telemetry;
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

    telemetry::init(&config.telemetry, config.environment)?;
    config.require_credentials()?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = Arc::new(BrokerService::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(InfobipClient::new(&config.whatsapp)?),
        Arc::new(S3ArtifactStore::new(&config.storage)?),
        Arc::new(OpenAiModel::new(&config.llm)?),
        config.broker.clone(),
        config.llm.max_tool_rounds,
    ));

    let app = with_broker_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, model = %config.llm.model, "whatsapp broker ready");

    axum::serve(listener, app).await?;
    Ok(())
}
