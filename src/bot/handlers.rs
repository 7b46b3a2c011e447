use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, KeyboardMarkup, KeyboardRemove, ParseMode};

use crate::ai::context::ChatTurn;
use crate::db::models::TelegramUser;
use crate::state::AppState;

/// Window of prior Telegram turns folded into the prompt.
const TELEGRAM_HISTORY_LIMIT: i64 = 10;

const PHONE_SAVED_REPLY: &str =
    "شكراً لك، تم حفظ رقم هاتفك بنجاح. كيف يمكنني مساعدتك الآن؟";

const PROCESSING_APOLOGY: &str =
    "عذراً، واجهت مشكلة في معالجة طلبك. يرجى المحاولة لاحقاً.";

/// Main message handler for contact shares and text messages.
pub async fn handle_message(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let chat_id = msg.chat.id;

    let user = state
        .db
        .get_or_create_telegram_user(
            chat_id.0,
            msg.chat.first_name(),
            msg.chat.last_name(),
            msg.chat.username(),
        )
        .await?;

    // ── Contact share (phone number request from /start) ───────────

    if let Some(contact) = msg.contact() {
        let is_own_contact = contact.user_id.map(|id| id.0 as i64) == Some(chat_id.0);
        if is_own_contact {
            state
                .db
                .set_telegram_phone(user.id, &contact.phone_number)
                .await?;
            tracing::info!("saved phone number for telegram user {}", chat_id.0);

            if let Err(e) = bot
                .send_message(chat_id, PHONE_SAVED_REPLY)
                .reply_markup(KeyboardRemove::new())
                .await
            {
                tracing::error!("failed to confirm contact save: {e}");
            }
        }
        return Ok(());
    }

    // ── Text message ───────────────────────────────────────────────

    let Some(text) = msg.text() else {
        // Unsupported message type
        return Ok(());
    };

    tracing::info!("received message from {}: {}", chat_id.0, text);

    // The prompt window holds prior turns only; read it before appending
    // the new user turn.
    let history = state
        .db
        .recent_telegram_messages(user.id, TELEGRAM_HISTORY_LIMIT)
        .await?;

    // The user turn is persisted before the gateway call and kept even if
    // the exchange fails afterwards; this surface is fire-and-forget.
    state.db.save_telegram_message(user.id, "user", text).await?;

    if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
        tracing::warn!("failed to send typing action: {e}");
    }

    let turns: Vec<ChatTurn> = history
        .iter()
        .map(|m| ChatTurn {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();

    let reply = state.engine.reply(&state.db, text, &turns).await;

    match state
        .db
        .save_telegram_message(user.id, "assistant", &reply)
        .await
    {
        Ok(_) => {
            send_html(&bot, chat_id, &reply).await;
            notify_admin(&bot, &state, &user, text).await;
        }
        Err(e) => {
            tracing::error!("failed to persist assistant reply: {e}");
            send_html(&bot, chat_id, PROCESSING_APOLOGY).await;
        }
    }

    Ok(())
}

/// Send a message with HTML formatting, degrading to plain text when
/// Telegram rejects the markup. Failures are logged and swallowed.
pub async fn send_html(bot: &Bot, chat_id: ChatId, text: &str) {
    if let Err(e) = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .await
    {
        tracing::warn!("HTML send failed, retrying as plain text: {e}");
        if let Err(e) = bot.send_message(chat_id, text).await {
            tracing::error!("failed to send message to {}: {e}", chat_id.0);
        }
    }
}

/// Same HTML-then-plain degrade, with a reply keyboard attached.
pub async fn send_html_with_markup(bot: &Bot, chat_id: ChatId, text: &str, markup: KeyboardMarkup) {
    if let Err(e) = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(markup.clone())
        .await
    {
        tracing::warn!("HTML send failed, retrying as plain text: {e}");
        if let Err(e) = bot.send_message(chat_id, text).reply_markup(markup).await {
            tracing::error!("failed to send message to {}: {e}", chat_id.0);
        }
    }
}

/// Forward an inbound-message summary to the configured admin chat.
/// Fire-and-forget: any failure is logged and swallowed.
async fn notify_admin(bot: &Bot, state: &AppState, user: &TelegramUser, text: &str) {
    let admin_id = match state.db.get_setting("admin_telegram_id").await {
        Ok(Some(v)) if !v.trim().is_empty() => v,
        Ok(_) => return,
        Err(e) => {
            tracing::error!("failed to read admin chat setting: {e}");
            return;
        }
    };

    let admin_chat = match admin_id.trim().parse::<i64>() {
        Ok(id) => ChatId(id),
        Err(_) => {
            tracing::warn!("admin_telegram_id setting is not a chat id: {admin_id}");
            return;
        }
    };

    let name = match (&user.first_name, &user.last_name) {
        (Some(first), Some(last)) => format!("{first} {last}"),
        (Some(first), None) => first.clone(),
        _ => user.username.clone().unwrap_or_else(|| "غير معروف".to_string()),
    };
    let phone = user.phone_number.as_deref().unwrap_or("غير متوفر");

    let note = format!(
        "🔔 <b>رسالة جديدة</b>\n👤 العميل: {name}\n📱 الهاتف: {phone}\n💬 الرسالة: {text}"
    );

    send_html(bot, admin_chat, &note).await;
}
