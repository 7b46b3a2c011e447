use std::sync::Arc;

use teloxide::prelude::*;
use tracing_subscriber::EnvFilter;

mod ai;
mod bot;
mod config;
mod db;
mod state;
mod training;
mod web;

use ai::AiEngine;
use config::AppConfig;
use db::Database;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🏥 Starting Al-Habib support assistant...");

    // Load config
    let config = AppConfig::from_env()?;

    // Initialize database
    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    tracing::info!("Database connected and migrations applied.");

    // Build shared application state
    let engine = AiEngine::new(&config);
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        engine,
    });

    // Start the web API
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Web API listening on {}", config.bind_addr);
    tokio::spawn(web::serve(listener, state.clone()));

    // Create the Telegram bot
    let bot = Bot::new(&config.telegram_bot_token);

    // Build the dispatcher
    let handler = bot::build_handler();

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
