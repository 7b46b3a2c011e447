use crate::ai::AiEngine;
use crate::config::AppConfig;
use crate::db::Database;

/// Shared application state, accessible from web handlers and bot handlers.
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub engine: AiEngine,
}
