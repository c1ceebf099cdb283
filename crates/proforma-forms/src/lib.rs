//! Jira Forms clients for proforma-tools.
//!
//! Two clients cover the two Forms API generations:
//!
//! - [`FormsClient`] talks to the new Forms REST API at
//!   `https://api.atlassian.com/jira/forms/cloud/{cloudId}` (UUID form ids,
//!   ADF layouts, template/attachment/export support).
//! - [`LegacyFormsClient`] talks to the deprecated entity-properties API on
//!   the Jira instance itself (`i`-prefixed form ids, flat field lists).
//!
//! Both normalize responses into the canonical `proforma_core::Form` model.

mod client;
mod legacy;
mod types;

pub use client::FormsClient;
pub use legacy::LegacyFormsClient;
pub use types::{Answer, AttachmentMeta};
