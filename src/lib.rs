//! app-intake — application intake and decision-lifecycle engine.
//!
//! Polls spreadsheet-backed application forms, publishes each new row to a
//! Discord review channel as an actionable notification, and tracks the
//! reviewer's accept/reject decision back into the sheet and the
//! applicant's DMs.

pub mod action;
pub mod config;
pub mod decision;
pub mod discord;
pub mod error;
pub mod http;
pub mod parser;
pub mod poller;
pub mod publish;
pub mod registry;
pub mod sheets;
pub mod state;
