use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Status given to every freshly extracted task.
pub const INITIAL_STATUS: &str = "new";

/// What kind of action a message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Scheduling,
    FollowUp,
    StatusUpdate,
    General,
}

impl Category {
    /// Priority is a pure function of the category.
    pub fn priority(self) -> Priority {
        match self {
            Self::Scheduling => Priority::High,
            Self::FollowUp | Self::StatusUpdate | Self::General => Priority::Medium,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scheduling => "scheduling",
            Self::FollowUp => "follow-up",
            Self::StatusUpdate => "status-update",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
}

/// An action item inferred from an inbound message.
///
/// Everything except `status` is fixed at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub candidate_name: String,
    pub candidate_number: String,
    pub task_description: String,
    pub original_message: String,
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    pub priority: Priority,
    /// Open vocabulary: callers may set any string.
    pub status: String,
}
