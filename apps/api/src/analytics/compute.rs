use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::action::{Action, ActionType};
use crate::models::project::Project;

const RECENT_WINDOW_DAYS: i64 = 7;
const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectAnalytics {
    pub total_actions: usize,
    pub milestone_reached: usize,
    pub progress_updates: usize,
    pub challenges_faced: usize,
    pub help_requests: usize,
    pub days_since_creation: i64,
    pub avg_actions_per_day: f64,
    pub recent_actions: usize,
    pub current_streak: u32,
    /// Milestones as a percentage of all actions.
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserAnalytics {
    pub total_projects: usize,
    pub projects_with_buddy: usize,
    pub total_actions: usize,
    pub total_milestones: usize,
    pub avg_actions_per_project: f64,
    /// Share of owned projects that have a buddy, as a percentage.
    pub buddy_match_rate: f64,
    pub most_active_day: Option<String>,
}

pub fn compute_project_analytics(
    project: &Project,
    actions: &[Action],
    now: DateTime<Utc>,
) -> ProjectAnalytics {
    let total_actions = actions.len();
    let count = |kind: ActionType| actions.iter().filter(|a| a.action_type == kind).count();
    let milestone_reached = count(ActionType::MilestoneReached);

    let days_since_creation = (now - project.created_at).num_days().max(0);
    let avg_actions_per_day = if days_since_creation > 0 {
        round_to(total_actions as f64 / days_since_creation as f64, 2)
    } else {
        0.0
    };

    let window_start = now - Duration::days(RECENT_WINDOW_DAYS);
    let recent_actions = actions
        .iter()
        .filter(|a| a.created_at > window_start)
        .count();

    ProjectAnalytics {
        total_actions,
        milestone_reached,
        progress_updates: count(ActionType::ProgressUpdate),
        challenges_faced: count(ActionType::ChallengeFaced),
        help_requests: count(ActionType::HelpNeeded),
        days_since_creation,
        avg_actions_per_day,
        recent_actions,
        current_streak: current_streak(actions, now.date_naive()),
        completion_rate: percentage(milestone_reached, total_actions),
    }
}

pub fn compute_user_analytics(projects: &[Project], actions: &[Action]) -> UserAnalytics {
    let total_projects = projects.len();
    let projects_with_buddy = projects.iter().filter(|p| p.buddy_id.is_some()).count();
    let total_actions = actions.len();
    let total_milestones = actions
        .iter()
        .filter(|a| a.action_type == ActionType::MilestoneReached)
        .count();

    let avg_actions_per_project = if total_projects > 0 {
        round_to(total_actions as f64 / total_projects as f64, 2)
    } else {
        0.0
    };

    UserAnalytics {
        total_projects,
        projects_with_buddy,
        total_actions,
        total_milestones,
        avg_actions_per_project,
        buddy_match_rate: percentage(projects_with_buddy, total_projects),
        most_active_day: most_active_day(actions).map(str::to_string),
    }
}

/// Consecutive calendar days (UTC) with at least one action. The run must
/// include today or yesterday, otherwise the streak is broken and counts 0.
pub fn current_streak(actions: &[Action], today: NaiveDate) -> u32 {
    let active: HashSet<NaiveDate> = actions.iter().map(|a| a.created_at.date_naive()).collect();

    let mut day = if active.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if active.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while active.contains(&day) {
        streak += 1;
        day = match day.pred_opt() {
            Some(d) => d,
            None => break,
        };
    }
    streak
}

/// Weekday with the most actions; ties go to the earliest day, Sunday first.
pub fn most_active_day(actions: &[Action]) -> Option<&'static str> {
    if actions.is_empty() {
        return None;
    }
    let mut per_day = [0usize; 7];
    for action in actions {
        per_day[action.created_at.weekday().num_days_from_sunday() as usize] += 1;
    }
    let busiest = per_day.iter().copied().max()?;
    per_day
        .iter()
        .position(|&n| n == busiest)
        .map(|i| WEEKDAY_NAMES[i])
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
