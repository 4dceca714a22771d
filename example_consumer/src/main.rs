//! Example consumer: serve the API described by a JSON file over PostgreSQL.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Environment: `DATABASE_URL`, `API_CONFIG` (path to the description), `BIND_ADDR`.

use restcraft::{api_routes, apply_migrations, ensure_database_exists, load_from_file, resolve, AppState, PgStore};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("restcraft=info,example_consumer=info")),
        )
        .init();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/restcraft".into());
    let config_path = std::env::var("API_CONFIG").unwrap_or_else(|_| "api.json".into());
    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());

    ensure_database_exists(&database_url).await?;
    let store = PgStore::connect(&database_url).await?;

    let api = resolve(load_from_file(&config_path).await?)?;
    apply_migrations(store.pool(), &api.description).await?;

    let app = api_routes(api.controllers, AppState::new(store));
    let listener = TcpListener::bind(&bind_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!("Example consumer listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
