//! Jira Agile issue-rank client for proforma-tools.
//!
//! The rank endpoint (`POST /rest/agile/1.0/issue/rank`) returns three
//! different success encodings depending on the Jira deployment; the client
//! normalizes all of them into `proforma_core::RankOutcome`.

mod client;

pub use client::RankClient;
