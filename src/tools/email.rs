//! Email tools — read via IMAP, send via SMTP.
//!
//! Reading talks to the operator's mailbox over IMAP and renders each
//! message as sender/date/subject plus a truncated plain-text body, without
//! marking anything as read. Sending always shows the full draft and asks
//! for confirmation before anything leaves the machine.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use mail_parser::MimeHeaders;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde_json::{json, Value};

use crate::config::EmailConfig;
use crate::error::Error;
use crate::Result;

use super::Tool;

const BODY_TRUNCATE: usize = 2000;
const DEFAULT_COUNT: usize = 5;
const MAX_COUNT: usize = 25;
const IMAP_TIMEOUT: Duration = Duration::from_secs(60);

const CREDENTIALS_HINT: &str =
    "Error: email address and app password must be set (config or EMAIL_ADDRESS / EMAIL_APP_PASSWORD)";

/// Read recent emails from the operator's mailbox.
pub struct ReadEmailTool {
    config: EmailConfig,
}

impl ReadEmailTool {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for ReadEmailTool {
    fn name(&self) -> &str {
        "read_email"
    }
    fn description(&self) -> &str {
        "Read recent emails from the operator's mailbox via IMAP. Returns sender, date, subject, and a truncated plain-text body for each message. Does NOT mark emails as read. Attachment filenames are listed but not downloaded."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "folder": {
                    "type": "string",
                    "description": "Mailbox folder to read (default: INBOX). Examples: INBOX, [Gmail]/Sent Mail, [Gmail]/Drafts"
                },
                "count": {
                    "type": "integer",
                    "description": "Number of recent emails to fetch (default: 5, max: 25)"
                },
                "search": {
                    "type": "string",
                    "description": "Optional IMAP search filter. Examples: ALL, UNSEEN, FROM \"alice@example.com\", SUBJECT \"invoice\""
                }
            },
            "required": []
        })
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let (Some(address), Some(password)) = (
            self.config.resolved_address(),
            self.config.resolved_password(),
        ) else {
            return Ok(CREDENTIALS_HINT.to_string());
        };

        let folder = input
            .get("folder")
            .and_then(|v| v.as_str())
            .unwrap_or("INBOX")
            .to_string();
        let count = input
            .get("count")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_COUNT as u64)
            .min(MAX_COUNT as u64) as usize;
        let search = input
            .get("search")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let host = self.config.imap_host.clone();
        let port = self.config.imap_port;

        // The imap crate is synchronous; run the whole exchange on a
        // blocking thread with a hard cap on the wait.
        let fetch = tokio::task::spawn_blocking(move || {
            fetch_messages(&host, port, &address, &password, &folder, count, search)
        });

        match tokio::time::timeout(IMAP_TIMEOUT, fetch).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(Error::Tool(format!("IMAP task failed: {e}"))),
            Err(_) => Err(Error::Tool(format!(
                "IMAP fetch timed out after {}s",
                IMAP_TIMEOUT.as_secs()
            ))),
        }
    }
}

fn fetch_messages(
    host: &str,
    port: u16,
    address: &str,
    password: &str,
    folder: &str,
    count: usize,
    search: Option<String>,
) -> Result<String> {
    let client = imap::ClientBuilder::new(host, port)
        .connect()
        .map_err(|e| Error::Tool(format!("IMAP connect failed: {e}")))?;

    let mut session = client
        .login(address, password)
        .map_err(|(e, _)| Error::Tool(format!("IMAP login failed: {e}")))?;

    let mailbox = session
        .select(folder)
        .map_err(|e| Error::Tool(format!("Failed to select folder {folder}: {e}")))?;

    let sequence = match search {
        Some(query) => {
            let mut ids: Vec<u32> = session
                .search(&query)
                .map_err(|e| Error::Tool(format!("IMAP search failed: {e}")))?
                .into_iter()
                .collect();
            ids.sort_unstable();
            let start = ids.len().saturating_sub(count);
            ids[start..]
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",")
        }
        None => {
            let total = mailbox.exists;
            if total == 0 {
                let _ = session.logout();
                return Ok("No messages found.".to_string());
            }
            let first = total.saturating_sub(count as u32).saturating_add(1);
            format!("{first}:{total}")
        }
    };

    if sequence.is_empty() {
        let _ = session.logout();
        return Ok("No messages found.".to_string());
    }

    // BODY.PEEK keeps the unread flags untouched.
    let fetches = session
        .fetch(&sequence, "BODY.PEEK[]")
        .map_err(|e| Error::Tool(format!("IMAP fetch failed: {e}")))?;

    let mut rendered: Vec<String> = fetches
        .iter()
        .filter_map(|f| f.body().map(render_message))
        .collect();
    rendered.reverse();

    let _ = session.logout();

    if rendered.is_empty() {
        Ok("No messages found.".to_string())
    } else {
        Ok(rendered.join("\n\n---\n\n"))
    }
}

fn render_message(raw: &[u8]) -> String {
    let Some(parsed) = mail_parser::MessageParser::default().parse(raw) else {
        return "(unparseable message)".to_string();
    };

    let sender = parsed
        .from()
        .and_then(|a| a.first())
        .map(|addr| {
            let email = addr.address().unwrap_or_default();
            match addr.name() {
                Some(name) => format!("{name} <{email}>"),
                None => email.to_string(),
            }
        })
        .unwrap_or_else(|| "(unknown sender)".to_string());

    let date = parsed
        .date()
        .map(|d| d.to_rfc3339())
        .unwrap_or_else(|| "(no date)".to_string());
    let subject = parsed.subject().unwrap_or("(no subject)");

    let mut body: String = parsed
        .body_text(0)
        .map(|b| b.to_string())
        .unwrap_or_else(|| "(no text body)".to_string());
    if body.len() > BODY_TRUNCATE {
        let mut end = BODY_TRUNCATE;
        while end > 0 && !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
        body.push_str("...");
    }

    let attachments: Vec<&str> = parsed
        .attachments()
        .filter_map(|a| a.attachment_name())
        .collect();

    let mut out = format!("From: {sender}\nDate: {date}\nSubject: {subject}\n\n{}", body.trim());
    if !attachments.is_empty() {
        out.push_str(&format!("\n\nAttachments: {}", attachments.join(", ")));
    }
    out
}

/// Send an email from the operator's account.
pub struct SendEmailTool {
    config: EmailConfig,
}

impl SendEmailTool {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }
    fn description(&self) -> &str {
        "Send an email from the operator's account. Always show the full draft (to, subject, body) to the user and get explicit confirmation before calling this tool."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {
                    "type": "string",
                    "description": "Recipient email address"
                },
                "subject": {
                    "type": "string",
                    "description": "Email subject line"
                },
                "body": {
                    "type": "string",
                    "description": "Plain text email body"
                },
                "cc": {
                    "type": "string",
                    "description": "CC email address (optional)"
                }
            },
            "required": ["to", "subject", "body"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let to = required_str(&input, "to")?;
        let subject = required_str(&input, "subject")?;
        let body = required_str(&input, "body")?;
        let cc = input
            .get("cc")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let (Some(address), Some(password)) = (
            self.config.resolved_address(),
            self.config.resolved_password(),
        ) else {
            return Ok(CREDENTIALS_HINT.to_string());
        };

        if !confirm_send(&to, &cc, &subject, &body).await? {
            return Ok("Email cancelled by user.".to_string());
        }

        let mut builder = lettre::Message::builder()
            .from(parse_mailbox(&address)?)
            .to(parse_mailbox(&to)?)
            .subject(subject.clone());
        if !cc.is_empty() {
            builder = builder.cc(parse_mailbox(&cc)?);
        }
        let message = builder
            .body(body.clone())
            .map_err(|e| Error::Tool(format!("Failed to build email: {e}")))?;

        let transport: AsyncSmtpTransport<Tokio1Executor> =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
                .map_err(|e| Error::Tool(format!("SMTP setup failed: {e}")))?
                .port(self.config.smtp_port)
                .credentials(Credentials::new(address, password))
                .build();

        match transport.send(message).await {
            Ok(_) => {
                let suffix = if cc.is_empty() {
                    String::new()
                } else {
                    format!(" (cc: {cc})")
                };
                Ok(format!("Email sent to {to}{suffix}"))
            }
            Err(e) => Ok(format!("Failed to send email: {e}")),
        }
    }
}

fn required_str(input: &Value, key: &str) -> Result<String> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Tool(format!("Missing '{key}' parameter")))
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address
        .parse()
        .map_err(|e| Error::Tool(format!("Invalid email address {address}: {e}")))
}

/// Show the draft and ask the operator before sending anything.
async fn confirm_send(to: &str, cc: &str, subject: &str, body: &str) -> Result<bool> {
    println!("\n{}", "=".repeat(50));
    println!("  TO:      {to}");
    if !cc.is_empty() {
        println!("  CC:      {cc}");
    }
    println!("  SUBJECT: {subject}");
    println!("  BODY:\n{body}");
    println!("{}", "=".repeat(50));

    tokio::task::spawn_blocking(|| {
        inquire::Confirm::new("Send this email?")
            .with_default(false)
            .prompt()
            .unwrap_or(false)
    })
    .await
    .map_err(|e| Error::Tool(format!("Confirmation prompt failed: {e}")))
}
