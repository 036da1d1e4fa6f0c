use std::sync::Arc;

use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use carebook::config::AppConfig;
use carebook::db;
use carebook::models::ChatEvent;
use carebook::services::ai::remote::RemoteAssistant;
use carebook::services::platform::http::HttpConsultationApi;
use carebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env()?;
    let identity = config.identity();
    tracing::info!(
        api = %config.api_base_url,
        user = identity.key(),
        tier = ?identity.tier,
        "loaded configuration"
    );

    let conn = db::init_db(&config.database_url)?;

    let (events_tx, _) = broadcast::channel(256);

    let api = HttpConsultationApi::new(config.api_base_url.clone(), config.api_token())
        .on_session_expired(session_expired_notifier(events_tx.clone()));
    let assistant = RemoteAssistant::new(config.api_base_url.clone(), config.api_token())
        .on_session_expired(session_expired_notifier(events_tx.clone()));

    let state = Arc::new(AppState::new(
        config.clone(),
        conn,
        Arc::new(api),
        Arc::new(assistant),
        events_tx,
    )?);

    let app = carebook::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn session_expired_notifier(
    tx: broadcast::Sender<ChatEvent>,
) -> impl Fn() + Send + Sync + 'static {
    move || {
        let _ = tx.send(ChatEvent::SessionExpired);
    }
}
