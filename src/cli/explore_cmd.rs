//! `sitemind explore <url>` — explore a site and learn its structure.

use crate::config::Config;
use anyhow::Result;

/// Run the explore command.
pub async fn run(config: Config, url: &str, name: &str) -> Result<()> {
    let mut agent = super::build_agent(config, true).await?;
    let report = agent.explore(url, name).await?;

    println!();
    println!("site:     {} ({})", report.site.domain, report.site.name);
    println!("session:  {}", report.session_id);
    println!("pages:    {}", report.pages_visited);
    println!("items:    {}", report.items_explored);
    Ok(())
}
