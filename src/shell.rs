//! Interactive command shell.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::error;

use crate::agent::Agent;
use crate::brain::LanguageModel;
use crate::browser::Browser;

const HELP: &str = "Commands:
  task <description>   Run a task
  screenshot [path]    Save a screenshot (default screenshot.png)
  url                  Print the current URL
  help                 Show this help
  exit                 Quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Task(String),
    Screenshot(PathBuf),
    Url,
    Help,
    Exit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };
        match head.to_lowercase().as_str() {
            "task" => Command::Task(rest.to_string()),
            "screenshot" if rest.is_empty() => Command::Screenshot(PathBuf::from("screenshot.png")),
            "screenshot" => Command::Screenshot(PathBuf::from(rest)),
            "url" => Command::Url,
            "help" => Command::Help,
            "exit" | "quit" => Command::Exit,
            _ => Command::Unknown(line.to_string()),
        }
    }
}

/// Read commands from stdin until `exit` or end of input.
pub async fn run_interactive<B: Browser, M: LanguageModel>(agent: &mut Agent<B, M>) -> Result<()> {
    println!("{}", "=".repeat(60));
    println!("AI Browser Agent - interactive mode");
    println!("{}", "=".repeat(60));
    println!("{HELP}");

    loop {
        let Some(line) = read_line("\n> ").await? else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => continue,
            Command::Exit => {
                println!("Exiting...");
                break;
            }
            Command::Help => println!("{HELP}"),
            Command::Url => match agent.browser().get_current_url().await {
                Ok(url) => println!("Current URL: {url}"),
                Err(e) => report(&e),
            },
            Command::Screenshot(path) => match agent.browser().take_screenshot(&path).await {
                Ok(()) => println!("Screenshot saved to {}", path.display()),
                Err(e) => report(&e),
            },
            Command::Task(task) if task.is_empty() => {
                println!("Please provide a task description, e.g. `task open example.com`");
            }
            Command::Task(task) => {
                println!("\nRunning task: {task}");
                println!("{}", "-".repeat(60));
                let outcome = agent.execute_task(&task).await;
                println!("{}", "-".repeat(60));
                println!("\nResult:\n{outcome}\n");
                if !agent.errors().is_empty() {
                    println!("{}", agent.error_summary());
                }
            }
            Command::Unknown(_) => println!("Unknown command. Type 'help' for the list."),
        }
    }

    Ok(())
}

fn report(e: &anyhow::Error) {
    error!(error = %e, "command failed");
    println!("Error: {e:#}");
}

/// Prompt and read one line; `None` at end of input.
async fn read_line(prompt: &str) -> Result<Option<String>> {
    let prompt = prompt.to_string();
    tokio::task::spawn_blocking(move || -> Result<Option<String>> {
        print!("{prompt}");
        std::io::stdout().flush()?;
        let mut line = String::new();
        let read = std::io::stdin().read_line(&mut line)?;
        Ok(if read == 0 { None } else { Some(line) })
    })
    .await
    .map_err(|e| anyhow!("stdin reader panicked: {e}"))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(
            Command::parse("task  find the pricing page "),
            Command::Task("find the pricing page".into())
        );
        assert_eq!(Command::parse("task"), Command::Task(String::new()));
        assert_eq!(
            Command::parse("screenshot"),
            Command::Screenshot(PathBuf::from("screenshot.png"))
        );
        assert_eq!(
            Command::parse("screenshot out/page.png"),
            Command::Screenshot(PathBuf::from("out/page.png"))
        );
        assert_eq!(Command::parse("URL"), Command::Url);
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("dance"), Command::Unknown("dance".into()));
    }
}
