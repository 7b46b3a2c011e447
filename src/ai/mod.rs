pub mod context;
pub mod llm;

use crate::config::AppConfig;
use crate::db::Database;

use context::ChatTurn;
use llm::{GatewayError, GeminiClient};

/// Apology shown when the API could not be reached or replied non-2xx.
pub const APOLOGY_CONNECTION: &str =
    "عذراً، واجهت مشكلة في الاتصال بمحرك الذكاء الاصطناعي. يرجى المحاولة مرة أخرى بعد قليل.";

/// Apology shown when the reply body had an unexpected shape.
pub const APOLOGY_MALFORMED: &str =
    "عذراً، واجهت مشكلة في معالجة الرد. يرجى إعادة صياغة سؤالك.";

/// Apology shown on any other transport or parsing failure.
pub const APOLOGY_UNEXPECTED: &str = "عذراً، حدث خطأ غير متوقع أثناء معالجة طلبك.";

/// The conversational service shared by the web and Telegram surfaces:
/// renders the knowledge base into the prompt context, folds in the history
/// window and calls the Gemini gateway. Gateway failures never escape this
/// layer; they degrade to a fixed apology string.
pub struct AiEngine {
    client: GeminiClient,
}

impl AiEngine {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: GeminiClient::new(config),
        }
    }

    pub async fn reply(&self, db: &Database, user_message: &str, history: &[ChatTurn]) -> String {
        let knowledge_block = match db.list_all_training_data().await {
            Ok(entries) => {
                if entries.is_empty() {
                    tracing::warn!("training database is empty");
                }
                context::render_knowledge_block(&entries)
            }
            Err(e) => {
                tracing::error!("error retrieving knowledge context: {e}");
                context::KNOWLEDGE_READ_ERROR.to_string()
            }
        };

        let contents = context::build_contents(user_message, history, &knowledge_block);

        tracing::info!(
            "generating reply for message: {}...",
            user_message.chars().take(50).collect::<String>()
        );

        match self.client.generate(&contents).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("gateway failure: {e}");
                apology_for(&e).to_string()
            }
        }
    }
}

/// The three failure classes map to three distinct fixed strings so the
/// degraded experience stays uniform while logs stay diagnosable.
pub fn apology_for(error: &GatewayError) -> &'static str {
    match error {
        GatewayError::Connection(_) => APOLOGY_CONNECTION,
        GatewayError::Malformed => APOLOGY_MALFORMED,
        GatewayError::Unexpected(_) => APOLOGY_UNEXPECTED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn each_failure_class_has_its_own_apology() {
        assert_eq!(
            apology_for(&GatewayError::Connection(StatusCode::BAD_GATEWAY)),
            APOLOGY_CONNECTION
        );
        assert_eq!(apology_for(&GatewayError::Malformed), APOLOGY_MALFORMED);
    }
}
