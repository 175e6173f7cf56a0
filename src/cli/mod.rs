//! CLI subcommand implementations for the sitemind binary.

pub mod explore_cmd;
pub mod memory_cmd;
pub mod repl;
pub mod run_cmd;

use crate::agent::WebAgent;
use crate::browser::chromium::ChromiumBrowser;
use crate::config::Config;
use crate::memory::open_store;
use crate::model::openai::OpenAiClient;
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Build a fully wired agent: browser, model client, optional store,
/// and a cancellation token hooked to Ctrl-C. Cancellation takes effect
/// at the next step boundary, never mid-call.
pub async fn build_agent(config: Config, with_memory: bool) -> Result<WebAgent> {
    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling at the next step");
            watcher.cancel();
        }
    });

    let browser = Arc::new(ChromiumBrowser::launch(&config.browser).await?);
    let model = Arc::new(OpenAiClient::new(&config.llm));

    let store = if with_memory {
        Some(Arc::from(open_store(&config.store).await?))
    } else {
        None
    };

    Ok(WebAgent::new(config, browser, model, store, cancel))
}
