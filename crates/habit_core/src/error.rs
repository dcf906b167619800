use crate::habit::HabitId;
use crate::ports::PortError;

/// Failures surfaced by the habit engine and its controller.
#[derive(Debug, thiserror::Error)]
pub enum HabitError {
    /// Rejected construction or edit input. Nothing was mutated.
    #[error("invalid habit: {0}")]
    Validation(String),

    /// The referenced habit is no longer part of the collection.
    #[error("habit `{0}` not found")]
    NotFound(HabitId),

    /// A collaborator (local store, reminder scheduler, ...) failed.
    #[error(transparent)]
    Port(#[from] PortError),
}

impl HabitError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type HabitResult<T> = Result<T, HabitError>;
