// src/notify/mod.rs
//! Outbound notification collaborators. The sync core never calls into
//! here; the page shell does.

pub mod email;

use thiserror::Error;

pub use email::{VerificationMailer, VerificationRequest};

/// Authenticated caller on whose behalf a notification is sent.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub uid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MailOutcome {
    pub ok: bool,
    /// True when the transport was not configured and the send was skipped.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub simulated: bool,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("unauthenticated: authentication required")]
    Unauthenticated,

    #[error("invalid-argument: {0}")]
    InvalidArgument(String),

    #[error("transport error: {0}")]
    Transport(String),
}
