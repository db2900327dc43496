//! Otto - Lightweight personal AI assistant
//!
//! This library wires an LLM chat API to a small set of local tools (email,
//! messaging, web, shell, files) through a budget-enforced agentic tool loop.

pub mod agent;
pub mod config;
pub mod error;
pub mod tools;
pub mod ui;

pub use error::{Error, Result};
