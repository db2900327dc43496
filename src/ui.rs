use colored::*;
use terminal_size::{terminal_size, Height, Width};

pub fn print_header(model: &str, provider: &str) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = width.0 as usize;

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "Otto".yellow().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}", name, version);

    let info = format!("  {}  •  {}", model, provider).cyan();
    println!("{}", info);

    println!("{}", line.black().bold());
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red().bold(), msg.red());
}

/// Model-authored text, shown before any tool in the same turn runs.
pub fn print_agent(text: &str) {
    println!("{}: {}", "Otto".green().bold(), text);
}

/// Trace line for an outgoing tool call.
pub fn print_tool_call(name: &str, input: &serde_json::Value) {
    let args = serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string());
    println!("  {} {}({})", "->".cyan(), name.cyan().bold(), args.dimmed());
}

/// Trace line for a tool result, truncated to a short preview.
pub fn print_tool_result(result: &str) {
    const PREVIEW: usize = 200;
    let mut end = PREVIEW.min(result.len());
    while end > 0 && !result.is_char_boundary(end) {
        end -= 1;
    }
    let suffix = if result.len() > end { "..." } else { "" };
    println!("  {} {}{}\n", "<-".cyan(), &result[..end].dimmed(), suffix);
}
