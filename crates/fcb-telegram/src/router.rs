use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use fcb_core::{
    config::Config, messaging::port::MessagingPort, security::RateLimiter, session::SessionStore,
    storage, utils::AuditLogger,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<SessionStore>,
    pub messenger: Arc<dyn MessagingPort>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub user_locks: Arc<UserLocks>,
    pub audit: Arc<AuditLogger>,
}

/// One in-flight action per user: intake and button presses for the same
/// user are serialized so add-file and compile never interleave.
#[derive(Default)]
pub struct UserLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub async fn lock_user(&self, user_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        tracing::info!("file compiler bot started: @{}", me.username());
    }
    tracing::info!("temp dir: {}", cfg.temp_dir.display());
    if cfg.telegram_allowed_users.is_empty() {
        tracing::info!("open bot: no user allow-list configured");
    } else {
        tracing::info!("allowed users: {}", cfg.telegram_allowed_users.len());
    }

    // Sessions do not survive restarts; reap orphaned scratch dirs.
    match storage::sweep_stale(&cfg.temp_dir, cfg.scratch_max_age) {
        Ok(0) => {}
        Ok(n) => tracing::info!("swept {n} stale scratch dir(s)"),
        Err(e) => tracing::warn!("scratch sweep failed: {e}"),
    }

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let store = Arc::new(SessionStore::new(cfg.clone()));

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        store,
        messenger,
        rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        ))),
        user_locks: Arc::new(UserLocks::default()),
        audit: Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        )),
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
