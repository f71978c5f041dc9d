//! Engine API server.

use kamchatour_engine::{config::Config, routes, store::Stores, AppState};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting availability engine");

    let stores = match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Connected to Postgres");
            Stores::postgres(pool)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Stores::in_memory()
        }
    };

    let state = AppState::new(stores, &config);
    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kamchatour_engine=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
