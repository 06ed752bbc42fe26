use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, loaded from the environment (with an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    /// Empty means the bot is open to everyone.
    pub telegram_allowed_users: Vec<i64>,

    // Storage
    pub temp_dir: PathBuf,
    pub scratch_max_age: Duration,

    // Intake limits
    pub max_file_size: u64,
    pub max_files_per_user: usize,

    // UI
    /// File names longer than this are truncated in list screens.
    pub name_display_max_length: usize,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        // Optional allow-list; an open bot is the original's default behavior.
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        let temp_dir =
            PathBuf::from(env_str("TEMP_DIR").unwrap_or("/tmp/file-compiler-bot".to_string()));
        fs::create_dir_all(&temp_dir)?;

        let scratch_max_age =
            Duration::from_secs(env_u64("SCRATCH_MAX_AGE_HOURS").unwrap_or(24) * 3600);

        let max_file_size = env_u64("MAX_FILE_SIZE").unwrap_or(50 * 1024 * 1024);
        let max_files_per_user = env_usize("MAX_FILES_PER_USER").unwrap_or(20).max(1);

        let name_display_max_length = env_usize("NAME_DISPLAY_MAX_LENGTH").unwrap_or(40);

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/file-compiler-bot-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        let rate_limit_enabled = env_bool("RATE_LIMIT_ENABLED").unwrap_or(true);
        let rate_limit_requests = env_u32("RATE_LIMIT_REQUESTS").unwrap_or(20);
        let rate_limit_window = Duration::from_secs(env_u64("RATE_LIMIT_WINDOW").unwrap_or(60));

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            temp_dir,
            scratch_max_age,
            max_file_size,
            max_files_per_user,
            name_display_max_length,
            audit_log_path,
            audit_log_json,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_user_list_skips_garbage() {
        let parsed = parse_csv_i64(Some(" 1, 2 ,x,, -3 ".to_string()));
        assert_eq!(parsed, vec![1, 2, -3]);
        assert!(parse_csv_i64(None).is_empty());
    }

    #[test]
    fn env_bool_accepts_common_truthy_values() {
        env::set_var("FCB_TEST_BOOL", "Yes");
        assert_eq!(env_bool("FCB_TEST_BOOL"), Some(true));
        env::set_var("FCB_TEST_BOOL", "0");
        assert_eq!(env_bool("FCB_TEST_BOOL"), Some(false));
        env::remove_var("FCB_TEST_BOOL");
    }
}
