//! Keyword heuristics that decide whether a message is an action item.
//!
//! Matching is plain case-insensitive substring search. There are no word
//! boundaries: `"update"` contains `"date"` and so counts as scheduling.

use {chrono::Utc, uuid::Uuid};

use crate::model::{Category, INITIAL_STATUS, Task};

/// Messages longer than this are truncated in `task_description`.
pub const DESCRIPTION_MAX_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

const SCHEDULING_KEYWORDS: &[&str] = &[
    "schedule",
    "interview",
    "meeting",
    "appointment",
    "slot",
    "available",
    "when can",
    "time",
    "date",
    "reschedule",
];

const FOLLOW_UP_KEYWORDS: &[&str] = &[
    "follow up",
    "update",
    "status",
    "any news",
    "heard back",
    "progress",
    "waiting",
    "pending",
    "check",
];

const STATUS_UPDATE_KEYWORDS: &[&str] = &[
    "result",
    "outcome",
    "feedback",
    "decision",
    "next step",
    "what happened",
    "how did",
    "passed",
    "failed",
];

/// Independent signals detected in a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    pub has_question: bool,
    pub is_scheduling: bool,
    pub is_follow_up: bool,
    pub is_status_update: bool,
}

impl Signals {
    pub fn detect(message: &str) -> Self {
        let lower = message.to_lowercase();
        Self {
            has_question: lower.contains('?'),
            is_scheduling: contains_any(&lower, SCHEDULING_KEYWORDS),
            is_follow_up: contains_any(&lower, FOLLOW_UP_KEYWORDS),
            is_status_update: contains_any(&lower, STATUS_UPDATE_KEYWORDS),
        }
    }

    pub fn any(self) -> bool {
        self.has_question || self.is_scheduling || self.is_follow_up || self.is_status_update
    }

    /// First matching category in precedence order.
    pub fn category(self) -> Category {
        if self.is_scheduling {
            Category::Scheduling
        } else if self.is_follow_up {
            Category::FollowUp
        } else if self.is_status_update {
            Category::StatusUpdate
        } else {
            Category::General
        }
    }
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| haystack.contains(k))
}

/// Summary shown for a task: the message itself, or its first
/// [`DESCRIPTION_MAX_CHARS`] characters followed by `...`.
pub fn describe(message: &str) -> String {
    if message.chars().count() <= DESCRIPTION_MAX_CHARS {
        return message.to_string();
    }
    let mut out: String = message.chars().take(DESCRIPTION_MAX_CHARS).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Turn an inbound message into a task, or `None` when nothing in it
/// looks actionable.
pub fn classify(message: &str, sender_name: &str, sender_number: &str) -> Option<Task> {
    let signals = Signals::detect(message);
    if !signals.any() {
        return None;
    }

    let category = signals.category();
    Some(Task {
        id: Uuid::new_v4().to_string(),
        candidate_name: sender_name.to_string(),
        candidate_number: sender_number.to_string(),
        task_description: describe(message),
        original_message: message.to_string(),
        timestamp: Utc::now(),
        category,
        priority: category.priority(),
        status: INITIAL_STATUS.to_string(),
    })
}
