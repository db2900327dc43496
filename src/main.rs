//! Otto CLI entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use otto::agent::{AgentLoop, ChatClient, LoopOutcome, Message, ProviderRegistry, UsageTracker};
use otto::config::Config;
use otto::tools::ToolRegistry;
use otto::ui;

#[derive(Parser)]
#[command(name = "otto")]
#[command(about = "Otto - personal AI assistant with a budget-enforced tool loop")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Otto configuration
    Onboard,

    /// Chat with the assistant
    Chat {
        /// Message to send; omit for interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run the morning briefing
    Briefing,

    /// Show Otto status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Double Ctrl+C to exit
    let exit_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let r = exit_flag.clone();
    ctrlc::set_handler(move || {
        if r.load(std::sync::atomic::Ordering::SeqCst) {
            println!("\nBye!");
            std::process::exit(0);
        } else {
            println!("\nPress Ctrl+C again to exit");
            r.store(true, std::sync::atomic::Ordering::SeqCst);

            let r2 = r.clone();
            std::thread::spawn(move || {
                std::thread::sleep(std::time::Duration::from_secs(3));
                r2.store(false, std::sync::atomic::Ordering::SeqCst);
            });
        }
    })
    .ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            println!("Initializing Otto...");
            otto::config::onboard()?;
        }

        Commands::Chat { message } => {
            let config = otto::config::load()?;
            let agent = build_agent(&config)?;
            ui::print_header(&config.model.name, &config.model.provider);

            if let Some(msg) = message {
                run_session(&agent, &config, &msg).await?;
            } else {
                run_interactive(&agent, &config).await?;
            }
        }

        Commands::Briefing => {
            let config = otto::config::load()?;
            let agent = build_agent(&config)?;
            let today = chrono::Local::now().format("%A, %B %-d, %Y");
            let prompt = format!(
                "Good morning! Today is {today}. Give me a morning briefing: \
                 check my recent emails and messages for anything that needs \
                 attention, then summarize."
            );
            run_session(&agent, &config, &prompt).await?;
        }

        Commands::Status => {
            let config = otto::config::load()?;
            println!("Otto Status\n");
            println!("Provider: {}", config.model.provider);
            println!("Model: {}", config.model.name);
            println!(
                "Budget: {} tokens/session (warn at {:.0}%)",
                config.budget.max_tokens_per_session, config.budget.warn_at_percent
            );
            println!(
                "Web search: {}",
                if config.tavily_api_key.is_empty() { "not set" } else { "✓" }
            );
            println!(
                "Email: {}",
                if config.email.resolved_address().is_some() { "✓" } else { "not set" }
            );
        }
    }

    Ok(())
}

fn build_agent(config: &Config) -> Result<AgentLoop<Box<dyn ChatClient>>> {
    let client = ProviderRegistry::create(config)?;
    let registry = ToolRegistry::new_with_defaults(config);
    let system = otto::config::load_system_prompt(config);
    Ok(AgentLoop::new(client, registry, system))
}

/// Run one conversation to completion and report usage.
async fn run_session(
    agent: &AgentLoop<Box<dyn ChatClient>>,
    config: &Config,
    message: &str,
) -> Result<()> {
    let mut tracker = UsageTracker::new(config.budget.clone());
    let mut conversation = vec![Message::user(message)];

    let outcome = agent.run(&mut conversation, &mut tracker).await?;

    if outcome == LoopOutcome::Halted {
        ui::print_warning("Session halted: token budget exhausted");
    }
    for line in tracker.summary(agent.model()).lines() {
        ui::print_step(line);
    }

    Ok(())
}

/// Interactive mode: one usage tracker for the whole sitting, a fresh
/// conversation per input.
async fn run_interactive(agent: &AgentLoop<Box<dyn ChatClient>>, config: &Config) -> Result<()> {
    use std::io::{self, Write};

    println!("Interactive mode (type 'quit' to exit)\n");
    let mut tracker = UsageTracker::new(config.budget.clone());

    loop {
        print!("\x1b[1;34mYou\x1b[0m: ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.eq_ignore_ascii_case("quit")
            || input.eq_ignore_ascii_case("exit")
            || input.eq_ignore_ascii_case("q")
        {
            break;
        }
        if input.is_empty() {
            continue;
        }

        let mut conversation = vec![Message::user(input)];
        match agent.run(&mut conversation, &mut tracker).await {
            Ok(LoopOutcome::Done) => println!(),
            Ok(LoopOutcome::Halted) => {
                ui::print_warning("Session halted: token budget exhausted");
                break;
            }
            Err(e) => {
                // Transport errors end the session; no automatic retry.
                ui::print_error(&e.to_string());
                return Err(e.into());
            }
        }
    }

    println!();
    for line in tracker.summary(agent.model()).lines() {
        ui::print_step(line);
    }
    Ok(())
}
