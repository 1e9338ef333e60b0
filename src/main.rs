use std::path::PathBuf;

use anyhow::{Context, Result};
use browser_agent::agent::Agent;
use browser_agent::brain::ChatClient;
use browser_agent::browser::Browser;
use browser_agent::config::{AgentConfig, resolve_config};
use browser_agent::gate::{AutoApprove, Confirm, StdinPrompt};
use browser_agent::hands::ChromeBrowser;
use browser_agent::{logging, shell};
use clap::Parser;
use dotenvy::dotenv;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "browser-agent",
    version,
    about = "Drive a browser toward a goal with a language model in the loop"
)]
struct Cli {
    /// Task to run once. Starts the interactive shell when omitted.
    task: Vec<String>,

    /// Config file (defaults to ./agent.toml, then the user config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    max_iterations: Option<usize>,

    /// Run Chrome without a window.
    #[arg(long)]
    headless: bool,

    /// Model name to request.
    #[arg(long)]
    model: Option<String>,

    /// Approve destructive clicks without asking.
    #[arg(short = 'y', long)]
    yes: bool,
}

impl Cli {
    fn apply(&self, config: &mut AgentConfig) {
        if let Some(max) = self.max_iterations {
            config.agent.max_iterations = max;
        }
        if self.headless {
            config.browser.headless = true;
        }
        if let Some(model) = &self.model {
            config.model.model = model.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    logging::init();
    let cli = Cli::parse();

    let mut config = resolve_config(cli.config.as_deref())?;
    cli.apply(&mut config);
    config.validate()?;
    let api_key = config.api_key()?;

    info!("launching Chrome");
    let mut browser = ChromeBrowser::new(config.browser.clone());
    browser.launch().await.context("browser launch failed")?;

    let confirm: Box<dyn Confirm> = if cli.yes {
        Box::new(AutoApprove)
    } else {
        Box::new(StdinPrompt)
    };
    let model = ChatClient::new(api_key, config.model.clone());
    let mut agent = Agent::new(&config, browser, model, confirm);

    let result = if cli.task.is_empty() {
        shell::run_interactive(&mut agent).await
    } else {
        let task = cli.task.join(" ");
        println!("\n{}", "=".repeat(60));
        println!("Task: {task}");
        println!("{}\n", "=".repeat(60));
        let outcome = agent.execute_task(&task).await;
        println!("\n{}", "=".repeat(60));
        println!("Result:\n{outcome}");
        println!("{}\n", "=".repeat(60));
        Ok(())
    };

    if let Err(e) = agent.browser_mut().close().await {
        warn!(error = %e, "failed to close browser");
    }
    result
}
