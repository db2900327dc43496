//! Messaging tools — read and send iMessages.
//!
//! Reading queries the local Messages database directly (read-only); sending
//! goes through the Messages app via `osascript`. Phone numbers are resolved
//! to contact names in both directions where possible.

use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde_json::{json, Value};
use tokio::process::Command;

use crate::error::Error;
use crate::Result;

use super::contacts::{self, ContactMatch};
use super::Tool;

/// Seconds between 1970-01-01 and 2001-01-01 (Apple's cocoa epoch).
const COCOA_EPOCH: i64 = 978_307_200;

const DEFAULT_LIMIT: usize = 20;
const SEND_TIMEOUT: Duration = Duration::from_secs(15);

fn messages_db_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("Library/Messages/chat.db")
}

/// Read iMessages from the local Messages database.
pub struct ReadMessagesTool;

#[async_trait]
impl Tool for ReadMessagesTool {
    fn name(&self) -> &str {
        "read_messages"
    }
    fn description(&self) -> &str {
        "Read iMessages from the local Messages database. Can filter by contact name or phone number and limit results. Returns messages with timestamps, contact names, and text content. Phone numbers are automatically resolved to contact names when possible."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "contact": {
                    "type": "string",
                    "description": "Contact name to filter by (e.g. 'Noah', 'Mom'). Looked up in local contacts."
                },
                "phone_number": {
                    "type": "string",
                    "description": "Phone number to filter by (e.g. '+15551234567'). Use contact name instead when possible."
                },
                "limit": {
                    "type": "integer",
                    "description": "Max number of messages to return. Defaults to 20."
                },
                "search": {
                    "type": "string",
                    "description": "Optional text to search for in message bodies."
                }
            },
            "required": []
        })
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let contact = input
            .get("contact")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let phone_number = input
            .get("phone_number")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let limit = input
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LIMIT as u64) as i64;
        let search = input
            .get("search")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        tokio::task::spawn_blocking(move || read_messages(contact, phone_number, limit, search))
            .await
            .map_err(|e| Error::Tool(format!("Messages task failed: {e}")))?
    }
}

fn read_messages(
    contact: Option<String>,
    phone_number: Option<String>,
    limit: i64,
    search: Option<String>,
) -> Result<String> {
    // Resolve a contact name to its phone number(s) first.
    let mut phone_filter: Vec<String> = Vec::new();
    let mut contact_label: Option<String> = None;

    if let Some(name) = &contact {
        let matches = contacts::resolve_contact(name)?;
        if matches.is_empty() {
            return Ok(format!("No contact found matching '{name}'."));
        }
        let names: std::collections::HashSet<&str> =
            matches.iter().map(|m| m.name.as_str()).collect();
        if names.len() == 1 {
            contact_label = Some(matches[0].name.clone());
        }
        phone_filter = matches.into_iter().map(|m| m.phone).collect();
    } else if let Some(number) = &phone_number {
        phone_filter = vec![contacts::normalize_phone(number)];
    }

    let conn = Connection::open(messages_db_path())?;

    let mut query = String::from(
        "SELECT
            datetime(m.date / 1000000000 + ?, 'unixepoch', 'localtime') AS timestamp,
            m.is_from_me,
            h.id AS phone,
            m.text
        FROM message m
        LEFT JOIN handle h ON m.handle_id = h.ROWID
        WHERE m.text IS NOT NULL",
    );
    let mut params: Vec<SqlValue> = vec![SqlValue::Integer(COCOA_EPOCH)];

    if !phone_filter.is_empty() {
        let placeholders = vec!["?"; phone_filter.len()].join(",");
        query.push_str(&format!(" AND h.id IN ({placeholders})"));
        params.extend(phone_filter.iter().map(|p| SqlValue::Text(p.clone())));
    }

    if let Some(text) = &search {
        query.push_str(" AND m.text LIKE ?");
        params.push(SqlValue::Text(format!("%{text}%")));
    }

    query.push_str(" ORDER BY m.date DESC LIMIT ?");
    params.push(SqlValue::Integer(limit));

    let mut stmt = conn.prepare(&query)?;
    let rows: Vec<(String, bool, Option<String>, String)> = stmt
        .query_map(rusqlite::params_from_iter(params), |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
            ))
        })?
        .collect::<std::result::Result<_, _>>()?;

    if rows.is_empty() {
        return Ok("No messages found.".to_string());
    }

    // Resolve the remaining phone numbers to names in one pass.
    let phone_to_name = if contact_label.is_none() {
        let unique: Vec<String> = rows
            .iter()
            .filter(|(_, from_me, phone, _)| !from_me && phone.is_some())
            .filter_map(|(_, _, phone, _)| phone.clone())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        contacts::reverse_lookup(&unique)
    } else {
        Default::default()
    };

    let mut lines: Vec<String> = rows
        .iter()
        .map(|(timestamp, from_me, phone, text)| {
            let sender = if *from_me {
                "me".to_string()
            } else if let Some(label) = &contact_label {
                label.clone()
            } else {
                let phone = phone.as_deref().unwrap_or("unknown");
                phone_to_name.get(phone).cloned().unwrap_or_else(|| phone.to_string())
            };
            format!("[{timestamp}] {sender}: {text}")
        })
        .collect();

    lines.reverse();
    Ok(lines.join("\n"))
}

/// Send an iMessage through the Messages app.
pub struct SendMessageTool;

#[async_trait]
impl Tool for SendMessageTool {
    fn name(&self) -> &str {
        "send_message"
    }
    fn description(&self) -> &str {
        "Send an iMessage using the Messages app. Accepts a contact name (looked up in local contacts) or a phone number."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "contact": {
                    "type": "string",
                    "description": "Contact name to send to (e.g. 'Mom', 'Noah King'). Looked up in local contacts."
                },
                "phone_number": {
                    "type": "string",
                    "description": "Recipient phone number (e.g. '+15551234567'). Use contact name instead when possible."
                },
                "message": {
                    "type": "string",
                    "description": "The message text to send."
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let message = input
            .get("message")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("Missing 'message' parameter".to_string()))?
            .to_string();
        let contact = input
            .get("contact")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        let phone_number = input
            .get("phone_number")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        if contact.is_none() && phone_number.is_none() {
            return Ok("Error: provide either 'contact' or 'phone_number'.".to_string());
        }

        // Work out who we're sending to.
        let (recipient, display) = match contact {
            Some(name) => {
                let matches =
                    tokio::task::spawn_blocking(move || contacts::resolve_contact(&name))
                        .await
                        .map_err(|e| Error::Tool(format!("Contact lookup failed: {e}")))??;
                match disambiguate(&matches, &input) {
                    Ok(target) => {
                        let display = format!("{} ({})", target.name, target.phone);
                        (target.phone.clone(), display)
                    }
                    Err(listing) => return Ok(listing),
                }
            }
            None => {
                let number = contacts::normalize_phone(&phone_number.unwrap_or_default());
                (number.clone(), number)
            }
        };

        let script = applescript_send(&recipient, &message);
        let output = tokio::time::timeout(
            SEND_TIMEOUT,
            Command::new("osascript").arg("-e").arg(&script).output(),
        )
        .await
        .map_err(|_| Error::Tool(format!("Send timed out after {}s", SEND_TIMEOUT.as_secs())))?
        .map_err(|e| Error::Tool(format!("Failed to run osascript: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(format!("Failed to send: {}", stderr.trim()));
        }

        Ok(format!("Message sent to {display}."))
    }
}

fn disambiguate<'a>(
    matches: &'a [ContactMatch],
    input: &Value,
) -> std::result::Result<&'a ContactMatch, String> {
    let queried = input.get("contact").and_then(|v| v.as_str()).unwrap_or("");

    if matches.is_empty() {
        return Err(format!("No contact found matching '{queried}'."));
    }
    if matches.len() > 1 {
        let names: std::collections::HashSet<&str> =
            matches.iter().map(|m| m.name.as_str()).collect();
        if names.len() > 1 {
            let listing = matches
                .iter()
                .map(|m| format!("  - {}: {}", m.name, m.phone))
                .collect::<Vec<_>>()
                .join("\n");
            return Err(format!(
                "Multiple contacts match '{queried}':\n{listing}\nPlease be more specific or use phone_number."
            ));
        }
    }
    Ok(&matches[0])
}

/// Build the AppleScript send command, escaping backslashes and quotes.
fn applescript_send(recipient: &str, message: &str) -> String {
    let safe_msg = message.replace('\\', "\\\\").replace('"', "\\\"");
    let safe_num = recipient.replace('\\', "\\\\").replace('"', "\\\"");

    format!(
        r#"
        tell application "Messages"
            set targetService to 1st account whose service type = iMessage
            set targetBuddy to participant "{safe_num}" of targetService
            send "{safe_msg}" to targetBuddy
        end tell
    "#
    )
}
