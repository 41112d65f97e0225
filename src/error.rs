use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("precomputed contact counts unavailable: {reason}")]
    PrimaryUnavailable { reason: String },

    #[error("contact records could not be loaded: {reason}")]
    RecordsUnavailable { reason: String },

    #[error("contact record for counselor {counselor_id} has no occurrence time")]
    MalformedRecord { counselor_id: Uuid },
}

impl SourceError {
    pub fn primary(err: anyhow::Error) -> Self {
        SourceError::PrimaryUnavailable {
            reason: format!("{err:#}"),
        }
    }

    pub fn records(err: anyhow::Error) -> Self {
        SourceError::RecordsUnavailable {
            reason: format!("{err:#}"),
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
