use std::sync::Arc;

use teloxide::{net::Download, prelude::*};

use fcb_core::{
    domain::{ChatId, UserId},
    formatting::format_file_size,
    menu,
    security::sanitize_filename,
    utils::AuditEvent,
};

use crate::router::AppState;

use super::{audit_or_log, screens, username_of};

struct Attachment {
    file_id: String,
    name: String,
    declared_size: u64,
}

/// Pull the file reference out of whichever attachment kind the message
/// carries. Photos have no filename, so one is synthesized from the
/// session's current file count.
fn classify(msg: &Message, file_count: usize) -> Option<Attachment> {
    if let Some(doc) = msg.document() {
        return Some(Attachment {
            file_id: doc.file.id.clone(),
            name: sanitize_filename(doc.file_name.as_deref().unwrap_or("document")),
            declared_size: doc.file.size as u64,
        });
    }

    if let Some(sizes) = msg.photo() {
        // Largest rendition is last.
        let photo = sizes.last()?;
        return Some(Attachment {
            file_id: photo.file.id.clone(),
            name: format!("photo_{}.jpg", file_count + 1),
            declared_size: photo.file.size as u64,
        });
    }

    if let Some(video) = msg.video() {
        let fallback = format!("video_{}.mp4", file_count + 1);
        return Some(Attachment {
            file_id: video.file.id.clone(),
            name: sanitize_filename(video.file_name.as_deref().unwrap_or(&fallback)),
            declared_size: video.file.size as u64,
        });
    }

    if let Some(audio) = msg.audio() {
        let fallback = format!("audio_{}.mp3", file_count + 1);
        return Some(Attachment {
            file_id: audio.file.id.clone(),
            name: sanitize_filename(audio.file_name.as_deref().unwrap_or(&fallback)),
            declared_size: audio.file.size as u64,
        });
    }

    None
}

pub async fn handle_attachment(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let user_id = UserId(user.id.0 as i64);
    let username = username_of(user);
    let chat_id = ChatId(msg.chat.id.0);

    // Rate limit.
    {
        let mut rl = state.rate_limiter.lock().await;
        let (ok, retry_after) = rl.check(user_id);
        if !ok {
            let retry = retry_after.unwrap_or_default().as_secs_f64();
            audit_or_log(&state, AuditEvent::rate_limit(user_id.0, &username, retry));
            let _ = state
                .messenger
                .send_html(
                    chat_id,
                    &format!("⏳ Rate limited. Please wait {retry:.1} seconds."),
                )
                .await;
            return Ok(());
        }
    }

    // First file creates the session.
    if let Err(e) = state.store.start(user_id).await {
        tracing::error!("failed to start session for {}: {e}", user_id.0);
        let _ = state.messenger.send_html(chat_id, &e.user_message()).await;
        return Ok(());
    }

    let file_count = state.store.file_count(user_id).await.unwrap_or(0);
    if file_count >= state.cfg.max_files_per_user {
        let _ = state
            .messenger
            .send_keyboard(
                chat_id,
                &format!(
                    "❌ Maximum file limit reached ({} files). \
                     Please create an archive or clear some files.",
                    state.cfg.max_files_per_user
                ),
                menu::main_menu(),
            )
            .await;
        return Ok(());
    }

    let Some(attachment) = classify(&msg, file_count) else {
        let _ = state
            .messenger
            .send_keyboard(chat_id, "❌ Unsupported file type.", menu::main_menu())
            .await;
        return Ok(());
    };

    if attachment.declared_size > state.cfg.max_file_size {
        let _ = state
            .messenger
            .send_keyboard(
                chat_id,
                &format!(
                    "❌ File too large. Maximum size is {}",
                    format_file_size(state.cfg.max_file_size)
                ),
                menu::main_menu(),
            )
            .await;
        return Ok(());
    }

    let (path, unique_name) = match state.store.reserve_path(user_id, &attachment.name).await {
        Ok(v) => v,
        Err(e) => {
            let _ = state.messenger.send_html(chat_id, &e.user_message()).await;
            return Ok(());
        }
    };

    let downloaded: anyhow::Result<()> = async {
        let file = bot.get_file(attachment.file_id.clone()).await?;
        let mut dst = tokio::fs::File::create(&path).await?;
        bot.download_file(&file.path, &mut dst).await?;
        Ok(())
    }
    .await;

    if let Err(e) = downloaded {
        tracing::warn!("download failed for {}: {e}", user_id.0);
        let _ = tokio::fs::remove_file(&path).await;
        audit_or_log(
            &state,
            AuditEvent::error(user_id.0, &username, &e.to_string(), Some("download")),
        );
        let _ = state
            .messenger
            .send_keyboard(
                chat_id,
                "❌ Error downloading file. Please try again.",
                menu::main_menu(),
            )
            .await;
        return Ok(());
    }

    // Telegram's declared size is advisory; trust the bytes on disk.
    let actual_size = tokio::fs::metadata(&path)
        .await
        .map(|m| m.len())
        .unwrap_or(attachment.declared_size);
    if actual_size > state.cfg.max_file_size {
        let _ = tokio::fs::remove_file(&path).await;
        let _ = state
            .messenger
            .send_keyboard(
                chat_id,
                &format!(
                    "❌ File too large. Maximum size is {}",
                    format_file_size(state.cfg.max_file_size)
                ),
                menu::main_menu(),
            )
            .await;
        return Ok(());
    }

    let count = match state
        .store
        .add_file(user_id, unique_name.clone(), actual_size, path)
        .await
    {
        Ok(n) => n,
        Err(e) => {
            let _ = state.messenger.send_html(chat_id, &e.user_message()).await;
            return Ok(());
        }
    };

    audit_or_log(
        &state,
        AuditEvent::action(
            user_id.0,
            &username,
            "intake",
            &format!("{unique_name} ({actual_size} bytes)"),
        ),
    );

    let _ = state
        .messenger
        .send_keyboard(
            chat_id,
            &screens::file_received(&unique_name, actual_size, count, &state.cfg),
            menu::main_menu(),
        )
        .await;

    Ok(())
}
