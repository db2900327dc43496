//! Contact resolution against the local AddressBook databases.
//!
//! Read-only sqlite lookups, shared by the messaging tools. Matches are
//! deduplicated by normalized phone number across all AddressBook sources.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use regex::Regex;
use rusqlite::Connection;
use tracing::debug;

use crate::Result;

const CONTACT_QUERY: &str = "
    SELECT
        COALESCE(r.ZFIRSTNAME, '') || ' ' || COALESCE(r.ZLASTNAME, '') AS full_name,
        p.ZFULLNUMBER
    FROM ZABCDRECORD r
    JOIN ZABCDPHONENUMBER p ON p.ZOWNER = r.Z_PK
    WHERE r.ZFIRSTNAME LIKE ?1 OR r.ZLASTNAME LIKE ?1
       OR (COALESCE(r.ZFIRSTNAME, '') || ' ' || COALESCE(r.ZLASTNAME, '')) LIKE ?1
";

const ALL_CONTACTS_QUERY: &str = "
    SELECT
        COALESCE(r.ZFIRSTNAME, '') || ' ' || COALESCE(r.ZLASTNAME, '') AS full_name,
        p.ZFULLNUMBER
    FROM ZABCDRECORD r
    JOIN ZABCDPHONENUMBER p ON p.ZOWNER = r.Z_PK
";

/// One contact match: display name plus normalized phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMatch {
    pub name: String,
    pub phone: String,
}

/// Strip a phone number down to digits (with leading +), defaulting US
/// numbers to a +1 prefix.
pub fn normalize_phone(number: &str) -> String {
    let re = Regex::new(r"[^\d+]").unwrap();
    let digits = re.replace_all(number, "").to_string();

    if !digits.is_empty() && !digits.starts_with('+') {
        if digits.len() == 10 {
            return format!("+1{digits}");
        }
        if digits.len() == 11 && digits.starts_with('1') {
            return format!("+{digits}");
        }
    }
    digits
}

fn addressbook_sources() -> Vec<PathBuf> {
    let Some(home) = dirs::home_dir() else {
        return Vec::new();
    };
    let sources = home.join("Library/Application Support/AddressBook/Sources");

    let Ok(entries) = std::fs::read_dir(&sources) else {
        debug!(path = ?sources, "No AddressBook sources directory");
        return Vec::new();
    };

    entries
        .flatten()
        .map(|entry| entry.path().join("AddressBook-v22.abcddb"))
        .filter(|path| path.exists())
        .collect()
}

/// Search all AddressBook sources for contacts matching `name`.
pub fn resolve_contact(name: &str) -> Result<Vec<ContactMatch>> {
    let pattern = format!("%{name}%");
    let mut seen: HashSet<String> = HashSet::new();
    let mut results = Vec::new();

    for db_path in addressbook_sources() {
        let Ok(conn) = Connection::open(&db_path) else {
            continue;
        };
        let Ok(mut stmt) = conn.prepare(CONTACT_QUERY) else {
            continue;
        };
        let rows = stmt.query_map([&pattern], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        });
        let Ok(rows) = rows else { continue };

        for row in rows.flatten() {
            let (full_name, raw_phone) = row;
            let phone = normalize_phone(&raw_phone);
            if phone.is_empty() || !seen.insert(phone.clone()) {
                continue;
            }
            results.push(ContactMatch {
                name: full_name.trim().to_string(),
                phone,
            });
        }
    }

    Ok(results)
}

/// Map normalized phone numbers back to contact names.
pub fn reverse_lookup(phones: &[String]) -> HashMap<String, String> {
    let targets: HashSet<&str> = phones.iter().map(String::as_str).collect();
    let mut mapping = HashMap::new();

    if targets.is_empty() {
        return mapping;
    }

    for db_path in addressbook_sources() {
        let Ok(conn) = Connection::open(&db_path) else {
            continue;
        };
        let Ok(mut stmt) = conn.prepare(ALL_CONTACTS_QUERY) else {
            continue;
        };
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        });
        let Ok(rows) = rows else { continue };

        for row in rows.flatten() {
            let (full_name, raw_phone) = row;
            let phone = normalize_phone(&raw_phone);
            if targets.contains(phone.as_str()) {
                mapping
                    .entry(phone)
                    .or_insert_with(|| full_name.trim().to_string());
            }
        }
    }

    mapping
}
