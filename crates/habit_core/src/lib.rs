pub mod collection;
pub mod completion;
pub mod error;
pub mod habit;
pub mod ports;
mod reminders;
pub mod schedule;
pub mod service;
pub mod stats;

pub use crate::collection::HabitCollection;
pub use crate::error::{HabitError, HabitResult};
pub use crate::habit::{
    CompletionEntry, CompletionHistory, HabitDraft, HabitId, HabitKind, HabitPatch, HabitRecord,
    HealthLink, Recurrence, Reminder,
};
pub use crate::service::{local_now, HabitService, HabitServiceBuilder, HealthCompletion};
