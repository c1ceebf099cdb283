//! Core types, form model normalization, and error handling for proforma-tools.
//!
//! This crate provides the foundational pieces shared by the Forms and Rank
//! adapters: the error taxonomy, the canonical `Form` model with its
//! two-generation normalizer, the rank request/outcome types, and the TOML
//! configuration.

pub mod config;
pub mod error;
pub mod form;
pub mod rank;

pub use config::Config;
pub use error::{Error, Result};
pub use form::{
    normalize_form, normalize_forms, ApiGeneration, Form, FormField, FormState, FormStatus,
};
pub use rank::{RankAnchor, RankOutcome, RankRequest};
