use std::collections::HashSet;

use db::{
    DbErr, DbPool,
    models::{
        contact::{Contact, ContactType},
        task::{Task, TaskError},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use super::config::PlaceholderContact;

#[derive(Debug, Error)]
pub enum RoleResolverError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Task(#[from] TaskError),
}

pub type Result<T> = std::result::Result<T, RoleResolverError>;

/// Contacts matched for a set of role labels. `contact_ids` is `None` when
/// nothing matched at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct RoleResolution {
    pub contact_ids: Option<Vec<Uuid>>,
    pub unassigned_roles: Vec<String>,
}

impl RoleResolution {
    pub fn contact_ids(&self) -> &[Uuid] {
        self.contact_ids.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct ResolveRolesRequest {
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, TS)]
pub struct PendingRoleReport {
    pub examined: usize,
    pub updated: usize,
    pub still_pending: Vec<String>,
}

/// Splits a template's `assigned_role` value, which may list several labels
/// separated by commas.
pub fn split_role_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_placeholder(contact: &Contact, placeholders: &[PlaceholderContact]) -> bool {
    let full_name = contact.full_name();
    let role = contact.role.as_deref().unwrap_or_default().trim();
    placeholders.iter().any(|placeholder| {
        placeholder.name.trim().eq_ignore_ascii_case(&full_name)
            && placeholder.role.trim().eq_ignore_ascii_case(role)
    })
}

fn eligible<'a>(
    contacts: &'a [Contact],
    placeholders: &'a [PlaceholderContact],
) -> impl Iterator<Item = &'a Contact> {
    contacts
        .iter()
        .filter(|contact| contact.is_active_team_member())
        .filter(move |contact| !is_placeholder(contact, placeholders))
}

/// Matches role labels against `contacts`. Labels are compared trimmed and
/// case-insensitively; duplicate labels are collapsed first.
pub fn resolve_against(
    contacts: &[Contact],
    roles: &[String],
    placeholders: &[PlaceholderContact],
) -> RoleResolution {
    let mut seen_labels = HashSet::new();
    let mut seen_contacts = HashSet::new();
    let mut contact_ids = Vec::new();
    let mut unassigned_roles = Vec::new();

    for label in roles.iter().map(|role| role.trim()) {
        if label.is_empty() || !seen_labels.insert(label.to_lowercase()) {
            continue;
        }
        let mut matched = false;
        for contact in eligible(contacts, placeholders) {
            let role_matches = contact
                .role
                .as_deref()
                .is_some_and(|role| role.trim().eq_ignore_ascii_case(label));
            if role_matches {
                matched = true;
                if seen_contacts.insert(contact.id) {
                    contact_ids.push(contact.id);
                }
            }
        }
        if !matched {
            unassigned_roles.push(label.to_string());
        }
    }

    RoleResolution {
        contact_ids: (!contact_ids.is_empty()).then_some(contact_ids),
        unassigned_roles,
    }
}

#[derive(Clone, Default)]
pub struct RoleResolver;

impl RoleResolver {
    pub fn new() -> Self {
        Self
    }

    pub async fn team_members(&self, pool: &DbPool) -> std::result::Result<Vec<Contact>, DbErr> {
        Contact::find_by_type(pool, ContactType::TeamMember).await
    }

    pub async fn resolve(
        &self,
        pool: &DbPool,
        roles: &[String],
        placeholders: &[PlaceholderContact],
    ) -> Result<RoleResolution> {
        if roles.iter().all(|role| role.trim().is_empty()) {
            return Ok(RoleResolution::default());
        }
        let contacts = self.team_members(pool).await?;
        Ok(resolve_against(&contacts, roles, placeholders))
    }

    /// Retries every pending role tag in a project against the current team.
    /// Newly matched contacts are merged into the task's assignees; labels
    /// that still match nobody stay pending.
    pub async fn reresolve_pending(
        &self,
        pool: &DbPool,
        project_id: Uuid,
        placeholders: &[PlaceholderContact],
    ) -> Result<PendingRoleReport> {
        let tasks = Task::find_by_project(pool, project_id).await?;
        let contacts = self.team_members(pool).await?;
        let mut report = PendingRoleReport::default();
        let mut still_pending = HashSet::new();

        for task in tasks.iter().filter(|task| task.has_pending_roles()) {
            report.examined += 1;
            let resolution = resolve_against(&contacts, &task.assigned_roles, placeholders);
            if resolution.contact_ids.is_some() {
                let mut merged = task.assigned_contact_ids.clone();
                merged.extend_from_slice(resolution.contact_ids());
                Task::set_assignment(pool, task.id, &merged, &resolution.unassigned_roles)
                    .await?;
                report.updated += 1;
                tracing::debug!(
                    task_id = %task.id,
                    remaining = resolution.unassigned_roles.len(),
                    "Resolved pending roles"
                );
            }
            for role in resolution.unassigned_roles {
                if still_pending.insert(role.to_lowercase()) {
                    report.still_pending.push(role);
                }
            }
        }

        Ok(report)
    }
}
