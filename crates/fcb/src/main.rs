use std::sync::Arc;

use fcb_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), fcb_core::Error> {
    fcb_core::logging::init("fcb");

    let cfg = Arc::new(Config::load()?);

    fcb_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| fcb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
