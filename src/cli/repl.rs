//! Interactive mode — a small REPL over the agent.

use crate::config::Config;
use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const HELP: &str = "\
commands:
  goto <url>        navigate to a site
  explore [name]    explore the current site and learn it
  do <instruction>  execute a natural-language task (uses memory)
  memory            show memory for the current site
  screenshot        save the current page to screenshot.png
  wait              pause for manual browser work (login, captcha)
  help              show this help
  quit              exit";

/// Run the interactive loop.
pub async fn run(config: Config) -> Result<()> {
    let mut agent = super::build_agent(config, true).await?;
    let mut editor = DefaultEditor::new()?;

    println!("sitemind interactive mode — type 'help' for commands");

    loop {
        let line = match editor.readline("sitemind> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        let (command, rest) = match line.split_once(' ') {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };

        let result = match command.to_ascii_lowercase().as_str() {
            "quit" | "exit" => break,
            "help" => {
                println!("{HELP}");
                Ok(())
            }
            "goto" if !rest.is_empty() => agent.goto(rest).await,
            "goto" => {
                println!("usage: goto <url>");
                Ok(())
            }
            "explore" => {
                let current = agent.browser().current_url().await.unwrap_or_default();
                if current.is_empty() || current == "about:blank" {
                    println!("open a site first: goto <url>");
                    Ok(())
                } else {
                    agent.explore(&current, rest).await.map(|_| ())
                }
            }
            "do" if !rest.is_empty() => match agent.execute_task(rest).await {
                Ok(outcome) => {
                    println!("{outcome}");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            "do" => {
                println!("usage: do <instruction>");
                Ok(())
            }
            "memory" => match agent.memory_stats().await? {
                Some(stats) => {
                    println!("memory for {}", stats.domain);
                    println!("  pages:   {}", stats.pages.len());
                    println!("  recipes: {}", stats.task_paths.len());
                    for page in stats.pages.iter().take(10) {
                        println!(
                            "  - [{}] {}",
                            page.page_type.as_str(),
                            page.semantic_description
                        );
                    }
                    for path in stats.task_paths.iter().take(5) {
                        println!("  - learned: {}", path.task_description);
                    }
                    Ok(())
                }
                None => {
                    println!("no site selected — goto a url first");
                    Ok(())
                }
            },
            "screenshot" => match agent.browser().screenshot().await {
                Ok(bytes) => {
                    std::fs::write("screenshot.png", bytes)?;
                    println!("saved screenshot.png");
                    Ok(())
                }
                Err(e) => Err(e),
            },
            "wait" => {
                println!("finish the manual step in the browser, then press Enter...");
                let _ = editor.readline("");
                println!("continuing");
                Ok(())
            }
            _ => {
                println!("unknown command — type 'help'");
                Ok(())
            }
        };

        if let Err(e) = result {
            eprintln!("error: {e:#}");
        }
    }

    println!("bye");
    Ok(())
}
