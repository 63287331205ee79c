use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::project::ProjectSummary;
use crate::models::user::UserSummary;

/// The kinds of log entry a project member can post.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ActionType {
    ProgressUpdate,
    MilestoneReached,
    ChallengeFaced,
    HelpNeeded,
}

impl ActionType {
    pub const ALL: [ActionType; 4] = [
        ActionType::ProgressUpdate,
        ActionType::MilestoneReached,
        ActionType::ChallengeFaced,
        ActionType::HelpNeeded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::ProgressUpdate => "progress_update",
            ActionType::MilestoneReached => "milestone_reached",
            ActionType::ChallengeFaced => "challenge_faced",
            ActionType::HelpNeeded => "help_needed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == raw)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Action {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// An action joined with the member who posted it.
#[derive(Debug, Clone, Serialize)]
pub struct ActionWithAuthor {
    #[serde(flatten)]
    pub action: Action,
    pub user: UserSummary,
}

/// An action joined with its author and project, used by the activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct ActionWithDetails {
    #[serde(flatten)]
    pub action: Action,
    pub user: UserSummary,
    pub project: ProjectSummary,
}
