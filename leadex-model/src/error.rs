use std::fmt::{self, Display};

/// Errors produced by model parsing and validation routines.
#[derive(Debug)]
pub enum ModelError {
    UnknownLeadStatus(String),
    UnknownClaimOutcome(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownLeadStatus(raw) => write!(f, "unknown lead status: {raw}"),
            ModelError::UnknownClaimOutcome(raw) => {
                write!(f, "unknown claim outcome: {raw}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
