//! Telegram update handlers.
//!
//! Each handler validates auth and rate limits, then drives the `fcb-core`
//! session store. Button presses and file intake for the same user run under
//! that user's lock so they never interleave.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message},
};

use fcb_core::{domain::UserId, security::is_authorized, utils::AuditEvent};

use crate::router::AppState;

mod callback;
mod commands;
mod intake;
mod screens;

fn username_of(user: &teloxide::types::User) -> String {
    user.username
        .clone()
        .unwrap_or_else(|| "unknown".to_string())
}

fn audit_or_log(state: &AppState, event: AuditEvent) {
    if let Err(e) = state.audit.write(event) {
        tracing::warn!("failed to write audit event: {e}");
    }
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = user.id.0 as i64;
    let username = username_of(user);

    if !is_authorized(Some(UserId(user_id)), &state.cfg.telegram_allowed_users) {
        audit_or_log(&state, AuditEvent::auth(user_id, &username, false));
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            return commands::handle_command(bot, msg, state).await;
        }
    }

    if msg.document().is_some()
        || msg.photo().is_some()
        || msg.video().is_some()
        || msg.audio().is_some()
    {
        let _guard = state.user_locks.lock_user(user_id).await;
        return intake::handle_attachment(bot, msg, state).await;
    }

    let _ = bot
        .send_message(
            msg.chat.id,
            "Send me files to collect, or /start for the menu.",
        )
        .await;

    Ok(())
}
