use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Lifecycle of an exam attempt row. `Resubmitted` marks attempts the
/// student sent for correction more than once after revising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "attemptstatus", rename_all = "lowercase")]
pub(crate) enum AttemptStatus {
    Generating,
    Ready,
    Submitted,
    Resubmitted,
    Failed,
}

impl AttemptStatus {
    pub(crate) fn is_submitted(self) -> bool {
        matches!(self, Self::Submitted | Self::Resubmitted)
    }
}
