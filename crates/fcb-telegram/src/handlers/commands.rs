use std::sync::Arc;

use teloxide::prelude::*;

use fcb_core::{
    domain::{ChatId, UserId},
    menu,
    utils::AuditEvent,
};

use crate::router::AppState;

use super::{audit_or_log, screens, username_of};

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = UserId(user.id.0 as i64);
    let username = username_of(user);
    let chat_id = ChatId(msg.chat.id.0);

    let text = msg.text().unwrap_or_default();
    let command = text.split_whitespace().next().unwrap_or_default();
    // Strip an optional @BotName suffix.
    let command = command.split('@').next().unwrap_or(command);

    match command {
        "/start" => {
            let _guard = state.user_locks.lock_user(user_id.0).await;
            match state.store.start(user_id).await {
                Ok(created) => {
                    if created {
                        audit_or_log(
                            &state,
                            AuditEvent::action(user_id.0, &username, "start", "session created"),
                        );
                    }
                    let _ = state
                        .messenger
                        .send_keyboard(chat_id, &screens::welcome(), menu::main_menu())
                        .await;
                }
                Err(e) => {
                    tracing::error!("failed to start session for {}: {e}", user_id.0);
                    let _ = state.messenger.send_html(chat_id, &e.user_message()).await;
                }
            }
        }
        "/help" => {
            let _ = state
                .messenger
                .send_keyboard(chat_id, &screens::help(&state.cfg), menu::back_menu())
                .await;
        }
        "/cancel" => {
            let _guard = state.user_locks.lock_user(user_id.0).await;
            state.store.clear_if_active(user_id).await;
            audit_or_log(
                &state,
                AuditEvent::action(user_id.0, &username, "cancel", "session discarded"),
            );
            let _ = state
                .messenger
                .send_html(chat_id, "🗑 Session discarded. Send /start to begin again.")
                .await;
        }
        other => {
            let _ = bot
                .send_message(
                    msg.chat.id,
                    format!("Unknown command: {other}. Try /start, /help or /cancel."),
                )
                .await;
        }
    }

    Ok(())
}
