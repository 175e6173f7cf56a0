//! `sitemind memory <domain>` — show what the store knows about a site.

use crate::config::Config;
use crate::memory::{open_store, MemoryStore};
use anyhow::Result;

/// Run the memory command. Reads the store directly, no browser needed.
pub async fn run(config: Config, domain: &str) -> Result<()> {
    let store = open_store(&config.store).await?;

    let Some(site) = store.get_site_by_domain(domain).await? else {
        println!("no memory for '{domain}' — run: sitemind explore https://{domain}");
        return Ok(());
    };
    let site_id = site.id.unwrap_or_default();

    let pages = store.get_pages_by_site(site_id).await?;
    let task_paths = store.get_task_paths_by_site(site_id).await?;

    println!("memory for {domain}");
    println!("  pages:      {}", pages.len());
    println!("  recipes:    {}", task_paths.len());

    if !pages.is_empty() {
        println!();
        println!("  known pages:");
        for page in pages.iter().take(10) {
            println!(
                "  - [{}] {} ({})",
                page.page_type.as_str(),
                page.semantic_description,
                page.url_pattern
            );
        }
    }

    if !task_paths.is_empty() {
        println!();
        println!("  learned tasks:");
        for path in task_paths.iter().take(5) {
            println!(
                "  - {} ({} ok / {} failed)",
                path.task_description, path.success_count, path.fail_count
            );
        }
    }
    Ok(())
}
