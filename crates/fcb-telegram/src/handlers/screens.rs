//! HTML screen texts for menus and replies.

use fcb_core::{
    archive::ArchiveFormat,
    config::Config,
    formatting::{escape_html, format_file_size, truncate_text},
    session::{FileEntry, SessionSummary},
};

fn display_name(entry: &FileEntry, cfg: &Config) -> String {
    escape_html(&truncate_text(&entry.name, cfg.name_display_max_length))
}

fn bullet_list(files: &[FileEntry], cfg: &Config, with_sizes: bool) -> String {
    files
        .iter()
        .map(|f| {
            if with_sizes {
                format!("• {} ({})", display_name(f, cfg), format_file_size(f.size))
            } else {
                format!("• {}", display_name(f, cfg))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn welcome() -> String {
    "🤖 <b>File Compiler Bot</b>\n\n\
     I collect the files you send and bundle them into an archive.\n\n\
     <b>Features:</b>\n\
     • 📦 Create ZIP and 7Z archives\n\
     • 📁 Extract ZIP, 7Z, TAR, TAR.GZ uploads\n\
     • 🖼 Handle documents, images, videos and audio\n\
     • 🔒 Secure temporary file handling\n\n\
     Send me files, then use the buttons below!"
        .to_string()
}

pub fn status(file_count: usize) -> String {
    format!(
        "🤖 <b>File Compiler Bot</b>\n\n\
         📊 <b>Status:</b> {file_count} file(s) stored\n\n\
         Use the buttons below to manage your files!"
    )
}

pub fn help(cfg: &Config) -> String {
    format!(
        "🤖 <b>File Compiler Bot - Help</b>\n\n\
         <b>How to use:</b>\n\
         1. Send me files (documents, images, etc.)\n\
         2. Use the buttons to manage your files\n\
         3. Create a ZIP or 7Z archive\n\
         4. Download your compiled archive!\n\n\
         <b>Archive support:</b>\n\
         • Create: ZIP, 7Z\n\
         • Extract: ZIP, 7Z, TAR, TAR.GZ\n\n\
         <b>Limits:</b>\n\
         • Max file size: {}\n\
         • Max files per user: {}\n\n\
         <b>Commands:</b>\n\
         /start - Restart the bot and show main menu\n\
         /cancel - Discard all collected files",
        format_file_size(cfg.max_file_size),
        cfg.max_files_per_user
    )
}

pub fn format_options() -> String {
    let lines = ArchiveFormat::ALL
        .iter()
        .map(|fmt| {
            format!(
                "• <b>{}</b> - {}",
                fmt.extension().to_uppercase(),
                fmt.label()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "📦 <b>Available Archive Formats</b>\n\n{lines}\n\n\
         Choose a format to create your archive:"
    )
}

pub fn confirm_compile(format: ArchiveFormat, summary: &SessionSummary, cfg: &Config) -> String {
    let upper = format.extension().to_uppercase();
    format!(
        "📦 <b>Create {upper} Archive</b>\n\n\
         <b>Files to include ({}):</b>\n{}\n\n\
         <b>Archive size:</b> {}\n\n\
         Are you sure you want to create the {upper} archive?",
        summary.files.len(),
        bullet_list(&summary.files, cfg, false),
        format_file_size(summary.total_size)
    )
}

pub fn file_list(summary: &SessionSummary, cfg: &Config) -> String {
    if summary.files.is_empty() {
        return "📭 No files received yet.\n\nSend me some files to get started!".to_string();
    }

    format!(
        "📋 <b>Your Files</b> ({} files, {} total)\n\n{}\n\n\
         Ready to create an archive?",
        summary.files.len(),
        format_file_size(summary.total_size),
        bullet_list(&summary.files, cfg, true)
    )
}

pub fn extract_overview(extractable: usize) -> String {
    format!(
        "📁 <b>Archive Extraction</b>\n\n\
         Found <b>{extractable}</b> extractable archive file(s) in your storage.\n\n\
         You can:\n\
         • Extract all supported archives at once\n\
         • View the list of extractable files\n\
         • Extracted files are added to your file list"
    )
}

pub fn extractable_list(archives: &[FileEntry], cfg: &Config) -> String {
    if archives.is_empty() {
        return "📭 No extractable archives found.\n\n\
                Send me ZIP, 7Z, or TAR files to extract them!"
            .to_string();
    }

    format!(
        "📋 <b>Extractable Archives</b> ({} files)\n\n{}\n\n\
         Use \"Extract All Archives\" to extract all of these at once!",
        archives.len(),
        bullet_list(archives, cfg, true)
    )
}

pub fn no_archives() -> String {
    "❌ No extractable archives found!\n\n\
     Supported formats: ZIP, 7Z, TAR, TAR.GZ"
        .to_string()
}

pub fn extracting(archives: &[FileEntry], cfg: &Config) -> String {
    format!(
        "📁 <b>Extract All Archives</b>\n\n\
         <b>Archives to extract ({}):</b>\n{}\n\n\
         ⏳ Extracting... Please wait.",
        archives.len(),
        bullet_list(archives, cfg, true)
    )
}

pub fn file_received(name: &str, size: u64, count: usize, cfg: &Config) -> String {
    let icon = if fcb_core::archive::extract::can_extract(name) {
        "📦"
    } else {
        "📁"
    };
    let mut msg = format!(
        "{icon} File '{}' received! ({})\n\n📊 Total files: {count}/{}",
        escape_html(name),
        format_file_size(size),
        cfg.max_files_per_user
    );
    if fcb_core::archive::extract::can_extract(name) {
        msg.push_str(
            "\n\n🔓 This appears to be an archive file! \
             You can extract it using the extraction menu.",
        );
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn cfg() -> Config {
        Config {
            telegram_bot_token: "x".to_string(),
            telegram_allowed_users: vec![],
            temp_dir: PathBuf::from("/tmp"),
            scratch_max_age: Duration::from_secs(3600),
            max_file_size: 50 * 1024 * 1024,
            max_files_per_user: 20,
            name_display_max_length: 10,
            audit_log_path: PathBuf::from("/tmp/a.log"),
            audit_log_json: true,
            rate_limit_enabled: false,
            rate_limit_requests: 20,
            rate_limit_window: Duration::from_secs(60),
        }
    }

    fn entry(name: &str, size: u64) -> FileEntry {
        FileEntry {
            name: name.to_string(),
            size,
            path: PathBuf::from("/tmp/x"),
            order: 0,
        }
    }

    #[test]
    fn file_list_escapes_and_truncates_names() {
        let summary = SessionSummary {
            files: vec![entry("<b>very_long_name</b>.txt", 2048)],
            total_size: 2048,
            ui_state: fcb_core::session::UiState::Collecting,
        };
        let text = file_list(&summary, &cfg());
        assert!(text.contains("&lt;b&gt;very_lo..."));
        assert!(!text.contains("<b>very"));
        assert!(text.contains("2.00 KB"));
    }

    #[test]
    fn received_message_flags_archives() {
        let c = cfg();
        assert!(file_received("data.zip", 10, 1, &c).contains("🔓"));
        assert!(!file_received("notes.txt", 10, 1, &c).contains("🔓"));
    }

    #[test]
    fn help_shows_configured_limits() {
        let text = help(&cfg());
        assert!(text.contains("50.00 MB"));
        assert!(text.contains("Max files per user: 20"));
    }
}
