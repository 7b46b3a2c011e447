use serde::Deserialize;

/// Default Gemini endpoints. The primary is the newer 2.5 Flash model; the
/// fallback is the older 1.5 Flash tier, used only after a rate-limit reply.
const DEFAULT_PRIMARY_URL: &str =
    "https://generativelanguage.googleapis.com/v1/models/gemini-2.5-flash:generateContent";
const DEFAULT_FALLBACK_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub database_url: String,

    /// Primary generateContent endpoint (without the key parameter)
    pub gemini_primary_url: String,
    /// Fallback endpoint used once after an HTTP 429 from the primary
    pub gemini_fallback_url: String,

    /// Address the web API binds to
    pub bind_addr: String,
    /// Directory uploaded training files are stored in
    pub upload_dir: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN")?,
            gemini_api_key: std::env::var("GEMINI_API_KEY")?,
            database_url: std::env::var("DATABASE_URL")?,
            gemini_primary_url: std::env::var("GEMINI_PRIMARY_URL")
                .unwrap_or_else(|_| DEFAULT_PRIMARY_URL.to_string()),
            gemini_fallback_url: std::env::var("GEMINI_FALLBACK_URL")
                .unwrap_or_else(|_| DEFAULT_FALLBACK_URL.to_string()),
            bind_addr: std::env::var("BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:5000".to_string()),
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "./uploads".to_string()),
        })
    }
}
