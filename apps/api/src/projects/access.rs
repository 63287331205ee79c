//! Who may see and change a project.
//!
//! Reads by anyone other than the owner or buddy surface as 404 so project ids
//! cannot be enumerated. Writes by a caller without the required role are 403.

use uuid::Uuid;

use crate::errors::AppError;
use crate::models::project::Project;
use crate::models::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectRole {
    Owner,
    Buddy,
}

pub fn role_of(project: &Project, user_id: Uuid) -> Option<ProjectRole> {
    if project.owner_id == user_id {
        Some(ProjectRole::Owner)
    } else if project.buddy_id == Some(user_id) {
        Some(ProjectRole::Buddy)
    } else {
        None
    }
}

/// Read access: owner or buddy.
pub fn require_member(project: &Project, user: &User) -> Result<ProjectRole, AppError> {
    role_of(project, user.id)
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

/// Write access for owner-or-buddy operations such as posting an action.
pub fn require_member_to_write(
    project: &Project,
    user: &User,
    denied: &str,
) -> Result<ProjectRole, AppError> {
    role_of(project, user.id).ok_or_else(|| AppError::Forbidden(denied.to_string()))
}

pub fn require_owner(project: &Project, user: &User, denied: &str) -> Result<(), AppError> {
    match role_of(project, user.id) {
        Some(ProjectRole::Owner) => Ok(()),
        _ => Err(AppError::Forbidden(denied.to_string())),
    }
}

/// Free-tier cap on owned projects. Premium users are never limited.
pub fn check_project_limit(premium: bool, owned: i64, limit: i64) -> Result<(), AppError> {
    if premium || owned < limit {
        return Ok(());
    }
    let noun = if limit == 1 { "project" } else { "projects" };
    Err(AppError::ProjectLimitReached(format!(
        "Free users can only create {limit} {noun}. Upgrade to premium for unlimited projects."
    )))
}

pub fn check_buddy_candidate(project: &Project, buddy_id: Uuid) -> Result<(), AppError> {
    if project.owner_id == buddy_id {
        return Err(AppError::Validation(
            "You cannot be your own accountability buddy".to_string(),
        ));
    }
    Ok(())
}
