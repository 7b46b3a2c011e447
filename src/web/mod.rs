pub mod admin;
pub mod auth;
pub mod chat;
pub mod error;
pub mod training;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Uploads are capped at 16 MiB.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/profile", put(auth::update_profile))
        .route("/auth/password", put(auth::change_password))
        // Dashboard
        .route("/dashboard/stats", get(admin::dashboard_stats))
        // Conversations
        .route(
            "/conversations",
            get(chat::list_conversations).post(chat::create_conversation),
        )
        .route("/conversations/{id}/rename", post(chat::rename_conversation))
        .route("/conversations/{id}", delete(chat::delete_conversation))
        .route(
            "/conversations/{id}/messages",
            get(chat::list_messages).post(chat::send_message),
        )
        // Training data
        .route("/training/manual", post(training::add_manual_entry))
        .route("/training/data", get(training::list_entries))
        .route(
            "/training/data/{id}",
            put(training::update_entry).delete(training::delete_entry),
        )
        .route("/training/file", post(training::upload_file))
        .route("/training/files", get(training::list_files))
        // Telegram administration
        .route("/telegram/users", get(admin::list_telegram_users))
        .route(
            "/telegram/users/{id}/messages",
            get(admin::telegram_user_messages),
        )
        // App settings
        .route(
            "/settings",
            get(admin::get_settings).put(admin::update_settings),
        );

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Run the web API until the process exits. Errors are logged rather than
/// propagated so a web failure cannot take the bot down silently mid-await.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) {
    let app = create_router(state);
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("web server error: {e}");
    }
}
