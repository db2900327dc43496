//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Error;
use crate::Result;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model selection and sampling parameters
    #[serde(default)]
    pub model: ModelConfig,

    /// Per-session token budget
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Anthropic API key (falls back to ANTHROPIC_API_KEY)
    #[serde(default)]
    pub anthropic_api_key: String,

    /// OpenAI API key (falls back to OPENAI_API_KEY)
    #[serde(default)]
    pub openai_api_key: String,

    /// Tavily API key for the search_web tool
    #[serde(default)]
    pub tavily_api_key: String,

    /// Email account settings for the read_email/send_email tools
    #[serde(default)]
    pub email: EmailConfig,

    /// Operator identity, appended to the system prompt as plain metadata
    #[serde(default)]
    pub operator: OperatorConfig,
}

/// Model provider, identifier, and sampling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// LLM provider to use ("anthropic" or "openai")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier string
    #[serde(default = "default_model")]
    pub name: String,

    /// Max output tokens per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Session token budget. Immutable for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Ceiling on cumulative input + output tokens per session
    #[serde(default = "default_max_tokens_per_session")]
    pub max_tokens_per_session: u64,

    /// Percentage of the budget at which a one-shot warning fires
    #[serde(default = "default_warn_at_percent")]
    pub warn_at_percent: f64,
}

/// Email account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub app_password: String,

    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default = "default_imap_host")]
    pub imap_host: String,

    #[serde(default = "default_imap_port")]
    pub imap_port: u16,
}

impl EmailConfig {
    /// Account address, falling back to the EMAIL_ADDRESS env var.
    pub fn resolved_address(&self) -> Option<String> {
        non_empty(&self.address).or_else(|| std::env::var("EMAIL_ADDRESS").ok())
    }

    /// App password, falling back to the EMAIL_APP_PASSWORD env var.
    pub fn resolved_password(&self) -> Option<String> {
        non_empty(&self.app_password).or_else(|| std::env::var("EMAIL_APP_PASSWORD").ok())
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Operator identity metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub phone: String,

    #[serde(default)]
    pub email: String,
}

fn default_provider() -> String {
    "anthropic".to_string()
}

fn default_model() -> String {
    "claude-opus-4-6".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    1.0
}

fn default_max_tokens_per_session() -> u64 {
    200_000
}

fn default_warn_at_percent() -> f64 {
    80.0
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_imap_host() -> String {
    "imap.gmail.com".to_string()
}

fn default_imap_port() -> u16 {
    993
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            name: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            app_password: String::new(),
            smtp_host: default_smtp_host(),
            smtp_port: default_smtp_port(),
            imap_host: default_imap_host(),
            imap_port: default_imap_port(),
        }
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_session: default_max_tokens_per_session(),
            warn_at_percent: default_warn_at_percent(),
        }
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".otto")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Get the system prompt override file path
pub fn system_prompt_path() -> PathBuf {
    config_dir().join("SYSTEM.md")
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools. Use them as needed to accomplish tasks. Work step by step.";

/// Load the system prompt, appending operator identity metadata when set.
///
/// The prompt itself comes from `~/.otto/SYSTEM.md` when present, else a
/// built-in default. Nothing else is added.
pub fn load_system_prompt(config: &Config) -> String {
    let mut system = std::fs::read_to_string(system_prompt_path())
        .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string());

    if !config.operator.name.is_empty() {
        system.push_str(&format!("\n\nOperator name: {}", config.operator.name));
    }
    if !config.operator.phone.is_empty() {
        system.push_str(&format!("\n\nOperator phone number: {}", config.operator.phone));
    }
    if !config.operator.email.is_empty() {
        system.push_str(&format!("\n\nOperator email address: {}", config.operator.email));
    }

    system
}

/// Load configuration from file
pub fn load() -> Result<Config> {
    let path = config_path();

    if !path.exists() {
        return Err(Error::Config(format!(
            "Config not found at {:?}. Run 'otto onboard' first.",
            path
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save(config: &Config) -> Result<()> {
    let path = config_path();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}

/// Initialize configuration interactively
pub fn onboard() -> Result<()> {
    use crate::ui;
    use inquire::{Confirm, Select, Text};

    println!("  Welcome! Let's get Otto configured.\n");

    let mut config = Config::default();

    // 1. Provider
    let providers = vec!["Anthropic (Claude)", "OpenAI (GPT)"];
    let provider_choice = Select::new("Choose your AI provider:", providers)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {e}")))?;

    if provider_choice.contains("Anthropic") {
        config.model.provider = "anthropic".to_string();
        config.anthropic_api_key = Text::new("Anthropic API key (blank to use ANTHROPIC_API_KEY):")
            .prompt()
            .map_err(|e| Error::Config(format!("Prompt failed: {e}")))?;
    } else {
        config.model.provider = "openai".to_string();
        config.model.name = "gpt-4o".to_string();
        config.openai_api_key = Text::new("OpenAI API key (blank to use OPENAI_API_KEY):")
            .prompt()
            .map_err(|e| Error::Config(format!("Prompt failed: {e}")))?;
    }

    // 2. Operator identity
    let default_name = whoami::realname();
    config.operator.name = Text::new("Your name:")
        .with_default(&default_name)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {e}")))?;

    // 3. Optional tool credentials
    let setup_search = Confirm::new("Configure web search (Tavily API key)?")
        .with_default(false)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {e}")))?;
    if setup_search {
        config.tavily_api_key = Text::new("Tavily API key:")
            .prompt()
            .map_err(|e| Error::Config(format!("Prompt failed: {e}")))?;
    }

    let setup_email = Confirm::new("Configure email (IMAP/SMTP)?")
        .with_default(false)
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {e}")))?;
    if setup_email {
        config.email.address = Text::new("Email address:")
            .prompt()
            .map_err(|e| Error::Config(format!("Prompt failed: {e}")))?;
        config.email.app_password = Text::new("App password:")
            .prompt()
            .map_err(|e| Error::Config(format!("Prompt failed: {e}")))?;
        config.operator.email = config.email.address.clone();
    }

    save(&config)?;

    println!();
    ui::print_success("Setup complete!");
    ui::print_step("Chat: otto chat -m \"Hello!\"");

    Ok(())
}
