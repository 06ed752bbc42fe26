use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use teloxide::prelude::*;

use fcb_core::{
    archive::{
        self,
        extract::{can_extract, safe_extract_archive, ExtractLimits, ExtractedFile},
        ArchiveFormat,
    },
    domain::{ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    menu::{self, MenuAction},
    messaging::types::ChatAction,
    session::{FileEntry, SessionStore},
    utils::AuditEvent,
};

use crate::router::AppState;

use super::{audit_or_log, screens, username_of};

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let data = q.data.clone().unwrap_or_default();

    let Some(message) = q.message.as_ref() else {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };

    let user_id = UserId(q.from.id.0 as i64);
    let username = username_of(&q.from);

    if !fcb_core::security::is_authorized(Some(user_id), &state.cfg.telegram_allowed_users) {
        audit_or_log(&state, AuditEvent::auth(user_id.0, &username, false));
        let _ = bot
            .answer_callback_query(cb_id)
            .text("Unauthorized".to_string())
            .await;
        return Ok(());
    }

    // Stale or foreign callback data is answered and dropped.
    let Some(action) = MenuAction::parse(&data) else {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };

    let _ = state.messenger.answer_callback_query(&cb_id, None).await;

    let msg_ref = MessageRef {
        chat_id: ChatId(message.chat.id.0),
        message_id: MessageId(message.id.0),
    };

    let _guard = state.user_locks.lock_user(user_id.0).await;

    // A button press on an old menu may arrive after the session ended.
    if let Err(e) = state.store.start(user_id).await {
        tracing::error!("failed to start session for {}: {e}", user_id.0);
        let _ = state
            .messenger
            .send_html(msg_ref.chat_id, &e.user_message())
            .await;
        return Ok(());
    }

    match action {
        MenuAction::ShowFormats => {
            let _ = state
                .messenger
                .edit_keyboard(msg_ref, &screens::format_options(), menu::format_menu())
                .await;
        }
        MenuAction::ListFiles => {
            if let Ok(summary) = state.store.list_files(user_id).await {
                let _ = state
                    .messenger
                    .edit_keyboard(
                        msg_ref,
                        &screens::file_list(&summary, &state.cfg),
                        menu::main_menu(),
                    )
                    .await;
            }
        }
        MenuAction::ClearFiles => {
            state.store.clear_if_active(user_id).await;
            audit_or_log(
                &state,
                AuditEvent::action(user_id.0, &username, "clear", "all files discarded"),
            );
            if let Err(e) = state.store.start(user_id).await {
                tracing::error!("failed to restart session for {}: {e}", user_id.0);
            }
            let _ = state
                .messenger
                .edit_keyboard(msg_ref, "✅ All files cleared!", menu::main_menu())
                .await;
        }
        MenuAction::ExtractArchives => {
            let count = archives_of(&state, user_id).await.len();
            let _ = state
                .messenger
                .edit_keyboard(
                    msg_ref,
                    &screens::extract_overview(count),
                    menu::extract_menu(),
                )
                .await;
        }
        MenuAction::ListExtractable => {
            let archives = archives_of(&state, user_id).await;
            let _ = state
                .messenger
                .edit_keyboard(
                    msg_ref,
                    &screens::extractable_list(&archives, &state.cfg),
                    menu::extract_menu(),
                )
                .await;
        }
        MenuAction::ExtractAll => {
            handle_extract(&state, user_id, &username, msg_ref).await;
        }
        MenuAction::Help => {
            let _ = state
                .messenger
                .edit_keyboard(msg_ref, &screens::help(&state.cfg), menu::back_menu())
                .await;
        }
        MenuAction::BackToMain => {
            let count = state.store.file_count(user_id).await.unwrap_or(0);
            let _ = state
                .messenger
                .edit_keyboard(msg_ref, &screens::status(count), menu::main_menu())
                .await;
        }
        MenuAction::ChooseFormat(format) => {
            handle_choose_format(&state, user_id, msg_ref, format).await;
        }
        MenuAction::ConfirmCompile(format) => {
            handle_confirm_compile(&state, user_id, &username, msg_ref, format).await;
        }
        MenuAction::Cancel => {
            state.store.clear_if_active(user_id).await;
            audit_or_log(
                &state,
                AuditEvent::action(user_id.0, &username, "cancel", "operation cancelled"),
            );
            let _ = state
                .messenger
                .edit_keyboard(
                    msg_ref,
                    "❌ Operation cancelled. All collected files were discarded.",
                    menu::main_menu(),
                )
                .await;
        }
    }

    Ok(())
}

async fn handle_choose_format(
    state: &AppState,
    user_id: UserId,
    msg_ref: MessageRef,
    format: ArchiveFormat,
) {
    let summary = match state.store.list_files(user_id).await {
        Ok(s) => s,
        Err(e) => {
            let _ = state
                .messenger
                .send_html(msg_ref.chat_id, &e.user_message())
                .await;
            return;
        }
    };

    if summary.files.is_empty() {
        let _ = state
            .messenger
            .edit_keyboard(
                msg_ref,
                &Error::EmptyFileSet.user_message(),
                menu::back_menu(),
            )
            .await;
        return;
    }

    if let Err(e) = state.store.set_format(user_id, format).await {
        let _ = state
            .messenger
            .send_html(msg_ref.chat_id, &e.user_message())
            .await;
        return;
    }

    let _ = state
        .messenger
        .edit_keyboard(
            msg_ref,
            &screens::confirm_compile(format, &summary, &state.cfg),
            menu::confirm_menu(format),
        )
        .await;
}

async fn handle_confirm_compile(
    state: &AppState,
    user_id: UserId,
    username: &str,
    msg_ref: MessageRef,
    format: ArchiveFormat,
) {
    let job = match state.store.prepare_job(user_id, format).await {
        Ok(j) => j,
        Err(e) => {
            let _ = state
                .messenger
                .edit_keyboard(msg_ref, &e.user_message(), menu::back_menu())
                .await;
            return;
        }
    };
    let file_count = job.files.len();

    let _ = state
        .messenger
        .edit_html(
            msg_ref,
            &format!(
                "⏳ Creating {} archive... Please wait.",
                format.extension().to_uppercase()
            ),
        )
        .await;

    let compiled = tokio::task::spawn_blocking(move || archive::compile(&job)).await;
    let archive_path = match compiled {
        Ok(Ok(path)) => path,
        Ok(Err(e)) => {
            tracing::error!("archive compilation failed for {}: {e}", user_id.0);
            audit_or_log(
                state,
                AuditEvent::error(user_id.0, username, &e.to_string(), Some("compile")),
            );
            state.store.clear_if_active(user_id).await;
            let _ = state
                .messenger
                .edit_keyboard(msg_ref, &e.user_message(), menu::main_menu())
                .await;
            return;
        }
        Err(e) => {
            tracing::error!("archive compilation task failed: {e}");
            state.store.clear_if_active(user_id).await;
            let _ = state
                .messenger
                .edit_keyboard(
                    msg_ref,
                    &Error::Compilation(e.to_string()).user_message(),
                    menu::main_menu(),
                )
                .await;
            return;
        }
    };

    let _ = state
        .messenger
        .send_chat_action(msg_ref.chat_id, ChatAction::UploadDocument)
        .await;

    let file_name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| format!("compiled_files.{}", format.extension()));
    let caption = format!(
        "✅ Your {} archive is ready!",
        format.extension().to_uppercase()
    );

    let delivered = state
        .messenger
        .send_document(msg_ref.chat_id, &archive_path, &file_name, &caption)
        .await;

    // Delivery or not, the session's scratch space is reclaimed.
    state.store.clear_if_active(user_id).await;

    match delivered {
        Ok(_) => {
            audit_or_log(
                state,
                AuditEvent::action(
                    user_id.0,
                    username,
                    "compile",
                    &format!("{format} archive with {file_count} files delivered"),
                ),
            );
            let _ = state
                .messenger
                .send_keyboard(
                    msg_ref.chat_id,
                    "📦 Session cleared. Send more files to start a new archive!",
                    menu::main_menu(),
                )
                .await;
        }
        Err(e) => {
            tracing::error!("failed to deliver archive to {}: {e}", user_id.0);
            audit_or_log(
                state,
                AuditEvent::error(user_id.0, username, &e.to_string(), Some("delivery")),
            );
            let _ = state
                .messenger
                .send_keyboard(
                    msg_ref.chat_id,
                    "❌ Failed to send the archive. Please try again.",
                    menu::main_menu(),
                )
                .await;
        }
    }
}

async fn archives_of(state: &AppState, user_id: UserId) -> Vec<FileEntry> {
    match state.store.list_files(user_id).await {
        Ok(summary) => summary
            .files
            .iter()
            .filter(|f| can_extract(&f.name))
            .cloned()
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Extraction workspace for one archive, keyed by arrival order so two
/// archives sharing a stem never share a directory.
fn extract_dest(scratch: &Path, entry: &FileEntry) -> PathBuf {
    let stem = entry
        .name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&entry.name);
    scratch.join(format!("extracted_{}_{stem}", entry.order))
}

/// Move extracted files into the session's scratch root under
/// collision-free names and record them, up to the per-user cap. Extracted
/// names go through the same `reserve_path` dedupe as uploads, so a session
/// never holds two entries with the same name.
async fn record_extracted(
    store: &SessionStore,
    user_id: UserId,
    max_files: usize,
    dest: &Path,
    files: Vec<ExtractedFile>,
) -> usize {
    let mut recorded = 0usize;
    for file in files {
        let count = store.file_count(user_id).await.unwrap_or(usize::MAX);
        if count >= max_files {
            break;
        }
        let Some(name) = file.rel_path.file_name() else {
            continue;
        };
        let name = name.to_string_lossy().to_string();
        let src = dest.join(&file.rel_path);

        let Ok((path, unique_name)) = store.reserve_path(user_id, &name).await else {
            break;
        };
        if tokio::fs::rename(&src, &path).await.is_err() {
            continue;
        }
        if store
            .add_file(user_id, unique_name, file.size, path)
            .await
            .is_ok()
        {
            recorded += 1;
        }
    }
    recorded
}

async fn handle_extract(state: &AppState, user_id: UserId, username: &str, msg_ref: MessageRef) {
    let archives = archives_of(state, user_id).await;

    if archives.is_empty() {
        let _ = state
            .messenger
            .edit_keyboard(msg_ref, &screens::no_archives(), menu::back_menu())
            .await;
        return;
    }

    let _ = state
        .messenger
        .edit_html(msg_ref, &screens::extracting(&archives, &state.cfg))
        .await;

    let mut extracted = 0usize;
    for entry in &archives {
        let count = state.store.file_count(user_id).await.unwrap_or(usize::MAX);
        if count >= state.cfg.max_files_per_user {
            break;
        }
        let scratch = match state.store.scratch_path(user_id).await {
            Ok(p) => p,
            Err(_) => break,
        };
        let dest = extract_dest(&scratch, entry);

        let result = tokio::task::spawn_blocking({
            let path = entry.path.clone();
            let name = entry.name.clone();
            let dest = dest.clone();
            move || safe_extract_archive(&path, &name, &dest, ExtractLimits::default())
        })
        .await;

        let report = match result {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                tracing::warn!("failed to extract {}: {e}", entry.name);
                audit_or_log(
                    state,
                    AuditEvent::error(user_id.0, username, &e.to_string(), Some("extract")),
                );
                continue;
            }
            Err(e) => {
                tracing::warn!("extraction task failed for {}: {e}", entry.name);
                continue;
            }
        };

        extracted += record_extracted(
            &state.store,
            user_id,
            state.cfg.max_files_per_user,
            &dest,
            report.files,
        )
        .await;
    }

    let total = state.store.file_count(user_id).await.unwrap_or(0);
    let text = if extracted > 0 {
        audit_or_log(
            state,
            AuditEvent::action(
                user_id.0,
                username,
                "extract",
                &format!("{extracted} files from {} archive(s)", archives.len()),
            ),
        );
        format!(
            "✅ Successfully extracted {extracted} file(s)!\n\n📊 Total files now: {total}"
        )
    } else {
        "❌ No files were extracted. Please check if you have valid archive files.".to_string()
    };

    let _ = state
        .messenger
        .send_keyboard(msg_ref.chat_id, &text, menu::main_menu())
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use fcb_core::config::Config;
    use std::{fs, time::Duration};

    fn test_config() -> Arc<Config> {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let pid = std::process::id();
        let temp_dir = PathBuf::from(format!("/tmp/fcb-callback-test-{pid}-{ts}"));
        fs::create_dir_all(&temp_dir).unwrap();

        Arc::new(Config {
            telegram_bot_token: "x".to_string(),
            telegram_allowed_users: vec![],
            temp_dir,
            scratch_max_age: Duration::from_secs(3600),
            max_file_size: 1024 * 1024,
            max_files_per_user: 20,
            name_display_max_length: 40,
            audit_log_path: PathBuf::from("/tmp/fcb-callback-test-audit.log"),
            audit_log_json: true,
            rate_limit_enabled: false,
            rate_limit_requests: 20,
            rate_limit_window: Duration::from_secs(60),
        })
    }

    #[test]
    fn extraction_dirs_are_unique_per_archive() {
        let zip = FileEntry {
            name: "a.zip".to_string(),
            size: 0,
            path: PathBuf::from("/tmp/a.zip"),
            order: 0,
        };
        let sevenz = FileEntry {
            name: "a.7z".to_string(),
            size: 0,
            path: PathBuf::from("/tmp/a.7z"),
            order: 1,
        };
        let scratch = Path::new("/tmp/scratch");
        assert_ne!(extract_dest(scratch, &zip), extract_dest(scratch, &sevenz));
    }

    #[tokio::test]
    async fn extracted_duplicates_are_renamed_before_recording() {
        let cfg = test_config();
        let store = SessionStore::new(cfg.clone());
        let user = UserId(1);
        store.start(user).await.unwrap();

        // An uploaded a.txt already occupies the name.
        let (path, name) = store.reserve_path(user, "a.txt").await.unwrap();
        fs::write(&path, b"uploaded").unwrap();
        store.add_file(user, name, 8, path).await.unwrap();

        // Extraction output with basenames colliding across directories and
        // with the upload.
        let dest = store
            .scratch_path(user)
            .await
            .unwrap()
            .join("extracted_1_arch");
        fs::create_dir_all(dest.join("dir1")).unwrap();
        fs::create_dir_all(dest.join("dir2")).unwrap();
        fs::write(dest.join("dir1/a.txt"), b"one").unwrap();
        fs::write(dest.join("dir2/a.txt"), b"two").unwrap();
        let files = vec![
            ExtractedFile {
                rel_path: PathBuf::from("dir1/a.txt"),
                size: 3,
            },
            ExtractedFile {
                rel_path: PathBuf::from("dir2/a.txt"),
                size: 3,
            },
        ];

        let recorded = record_extracted(&store, user, 20, &dest, files).await;
        assert_eq!(recorded, 2);

        let names: Vec<String> = store
            .list_files(user)
            .await
            .unwrap()
            .files
            .iter()
            .map(|f| f.name.clone())
            .collect();
        assert_eq!(names, vec!["a.txt", "a_1.txt", "a_2.txt"]);

        // The compiled archive keeps all three entries distinct.
        let job = store.prepare_job(user, ArchiveFormat::Zip).await.unwrap();
        let out = archive::compile(&job).unwrap();
        let mut za = zip::ZipArchive::new(fs::File::open(&out).unwrap()).unwrap();
        let mut entry_names: Vec<String> = (0..za.len())
            .map(|i| za.by_index(i).unwrap().name().to_string())
            .collect();
        entry_names.sort();
        assert_eq!(entry_names, vec!["a.txt", "a_1.txt", "a_2.txt"]);

        store.clear(user).await.unwrap();
        let _ = fs::remove_dir_all(&cfg.temp_dir);
    }

    #[tokio::test]
    async fn extraction_recording_respects_file_cap() {
        let cfg = test_config();
        let store = SessionStore::new(cfg.clone());
        let user = UserId(2);
        store.start(user).await.unwrap();

        let dest = store.scratch_path(user).await.unwrap().join("extracted_0_a");
        fs::create_dir_all(&dest).unwrap();
        let mut files = Vec::new();
        for i in 0..4 {
            let rel = PathBuf::from(format!("f{i}.txt"));
            fs::write(dest.join(&rel), b"x").unwrap();
            files.push(ExtractedFile { rel_path: rel, size: 1 });
        }

        let recorded = record_extracted(&store, user, 3, &dest, files).await;
        assert_eq!(recorded, 3);
        assert_eq!(store.file_count(user).await.unwrap(), 3);

        store.clear(user).await.unwrap();
        let _ = fs::remove_dir_all(&cfg.temp_dir);
    }
}
