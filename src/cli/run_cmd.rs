//! `sitemind run <url> <instruction>` — execute a natural-language task.

use crate::config::Config;
use anyhow::Result;

/// Run the task command. `no_memory` forces live execution without the
/// store.
pub async fn run(config: Config, url: &str, instruction: &str, no_memory: bool) -> Result<()> {
    let mut agent = super::build_agent(config, !no_memory).await?;

    agent.goto(url).await?;
    let outcome = agent.execute_task(instruction).await?;

    println!();
    println!("{outcome}");
    Ok(())
}
