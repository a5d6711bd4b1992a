use std::fmt;

use anyhow::Error;
use serde::Serialize;
use serde_json::Value;

pub const EMPTY_PROMPT: &str = "EMPTY_PROMPT";
pub const INVALID_DURATION: &str = "INVALID_DURATION";
pub const INVALID_RESOLUTION: &str = "INVALID_RESOLUTION";
pub const INVALID_SIZE: &str = "INVALID_SIZE";
pub const INVALID_FORMAT: &str = "INVALID_FORMAT";
pub const INVALID_QUALITY: &str = "INVALID_QUALITY";
pub const SURFACE_UNAVAILABLE: &str = "SURFACE_UNAVAILABLE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedErrorKind {
    Usage,
    Runtime,
}

#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub kind: CodedErrorKind,
}

impl CodedError {
    pub fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind: CodedErrorKind::Usage,
        }
    }

    pub fn runtime(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind: CodedErrorKind::Runtime,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn is_usage(&self) -> bool {
        self.kind == CodedErrorKind::Usage
    }

    /// Process exit status: 2 for bad input, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self.kind {
            CodedErrorKind::Usage => 2,
            CodedErrorKind::Runtime => 1,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code.to_owned(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn find_coded_error(error: &Error) -> Option<&CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
}

pub fn has_code(error: &Error, code: &str) -> bool {
    find_coded_error(error).is_some_and(|coded| coded.code == code)
}

/// Envelope for errors that carry no code of their own.
pub fn internal_envelope(error: &Error) -> ErrorEnvelope {
    ErrorEnvelope {
        ok: false,
        error: ErrorEnvelopeBody {
            code: "INTERNAL".to_owned(),
            message: format!("{error:#}"),
            details: None,
        },
    }
}
