use std::sync::Arc;
use teloxide::macros::BotCommands;
use teloxide::prelude::*;
use teloxide::types::{ButtonRequest, KeyboardButton, KeyboardMarkup};

use crate::bot::handlers;
use crate::state::AppState;

/// Default /start greeting, overridable via the `welcome_msg` app setting.
const DEFAULT_WELCOME: &str = "<b>مرحباً بك في بوت مؤسسة الحبيب الطبية.</b>\n\n\
    أنا مساعدك الذكي، يمكنني الإجابة على استفساراتك حول خدماتنا الطبية، \
    المستلزمات، الوكالات المعتمدة، وغيرها.\n\n\
    يرجى تزويدنا برقم هاتفك للتواصل الأفضل:";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum BotCommand {
    #[command(description = "Start / restart the bot")]
    Start,
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: BotCommand,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let chat_id = msg.chat.id.0;

    let user = state
        .db
        .get_or_create_telegram_user(
            chat_id,
            msg.chat.first_name(),
            msg.chat.last_name(),
            msg.chat.username(),
        )
        .await?;

    match cmd {
        BotCommand::Start => {
            // The /start text is part of the conversation record too.
            if let Some(text) = msg.text() {
                state.db.save_telegram_message(user.id, "user", text).await?;
            }

            let welcome = state
                .db
                .get_setting("welcome_msg")
                .await?
                .unwrap_or_else(|| DEFAULT_WELCOME.to_string());

            let mut keyboard = KeyboardMarkup::new(vec![vec![
                KeyboardButton::new("مشاركة رقم الهاتف").request(ButtonRequest::Contact),
            ]]);
            keyboard.resize_keyboard = true;
            keyboard.one_time_keyboard = true;

            handlers::send_html_with_markup(&bot, msg.chat.id, &welcome, keyboard).await;
        }
    }

    Ok(())
}
