// src/main.rs
mod admin;
mod contacts;
mod db;
mod error;
mod events;
mod handlers;
mod identity;
mod models;
mod polls;
mod routes;
mod votes;

use std::env;
use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("livepoll_backend=info,tower_http=info")),
        )
        .init();

    // Default to 3030 for local development
    let port = env::var("PORT").unwrap_or_else(|_| "3030".to_string());
    let port = port.parse::<u16>().expect("PORT must be a valid number");

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:livepoll.db".to_string());
    let pool = db::create_pool(&database_url)
        .await
        .expect("failed to open the database");
    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations");
    polls::seed_defaults(&pool)
        .await
        .expect("failed to seed poll definitions");

    let app = routes::create_routes(pool);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "listening");
    axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
        .expect("server error");
}
