use std::{
    collections::HashSet,
    sync::LazyLock,
};

use chrono::NaiveDate;
use db::{
    DbErr, DbPool,
    models::{
        contact::{Contact, ContactType},
        notification::{CreateNotification, Notification, NotificationError, NotificationKind},
        task::Task,
    },
};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use utils::dates::add_days;
use uuid::Uuid;

static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^\w@])@([A-Za-z][\w.\-]*)").expect("mention pattern is valid")
});

#[derive(Debug, Error)]
pub enum NotificationServiceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

pub type Result<T> = std::result::Result<T, NotificationServiceError>;

#[derive(Debug, Clone, Default, Serialize, TS)]
pub struct ReminderReport {
    pub created: usize,
    pub already_notified: usize,
    pub tasks_considered: usize,
}

/// Lower-cased `@handle` tokens in `text`, in order of first appearance.
/// Trailing punctuation is not part of a handle.
pub fn extract_mentions(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MENTION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', '-']).to_lowercase())
        .filter(|handle| !handle.is_empty() && seen.insert(handle.clone()))
        .collect()
}

/// A handle names a contact by first name, `first.last` or `firstlast`.
pub fn handle_matches(contact: &Contact, handle: &str) -> bool {
    let first = contact.first_name.trim().to_lowercase();
    let last = contact.last_name.trim().to_lowercase();
    let handle = handle.to_lowercase();
    handle == first || handle == format!("{first}.{last}") || handle == format!("{first}{last}")
}

#[derive(Clone, Default)]
pub struct NotificationService;

impl NotificationService {
    pub fn new() -> Self {
        Self
    }

    async fn mentionable(&self, pool: &DbPool) -> std::result::Result<Vec<Contact>, DbErr> {
        let contacts = Contact::find_by_type(pool, ContactType::TeamMember).await?;
        Ok(contacts
            .into_iter()
            .filter(Contact::is_active_team_member)
            .collect())
    }

    /// Notifies team members mentioned in `task`'s description who were not
    /// already mentioned in `previous_description`.
    pub async fn notify_mentions(
        &self,
        pool: &DbPool,
        task: &Task,
        previous_description: Option<&str>,
    ) -> Result<Vec<Notification>> {
        let Some(description) = task.description.as_deref() else {
            return Ok(Vec::new());
        };
        let before: HashSet<String> = previous_description
            .map(extract_mentions)
            .unwrap_or_default()
            .into_iter()
            .collect();
        let handles: Vec<String> = extract_mentions(description)
            .into_iter()
            .filter(|handle| !before.contains(handle))
            .collect();
        if handles.is_empty() {
            return Ok(Vec::new());
        }

        let contacts = self.mentionable(pool).await?;
        let mut notified = HashSet::new();
        let mut created = Vec::new();
        for handle in &handles {
            let matched = contacts
                .iter()
                .filter(|contact| handle_matches(contact, handle));
            for contact in matched {
                if !notified.insert(contact.id) {
                    continue;
                }
                let notification = Notification::create(
                    pool,
                    &CreateNotification {
                        recipient_id: contact.id,
                        kind: NotificationKind::Mention,
                        title: format!("You were mentioned in \"{}\"", task.title),
                        message: description.to_string(),
                        task_id: Some(task.id),
                        project_id: Some(task.project_id),
                    },
                    Uuid::new_v4(),
                )
                .await?;
                created.push(notification);
            }
        }

        tracing::debug!(
            task_id = %task.id,
            handles = handles.len(),
            notified = created.len(),
            "Processed task mentions"
        );
        Ok(created)
    }

    /// Notifies contacts newly assigned to `task`.
    pub async fn notify_assignment(
        &self,
        pool: &DbPool,
        task: &Task,
        previous_assignees: &[Uuid],
    ) -> Result<Vec<Notification>> {
        let mut created = Vec::new();
        for contact_id in task
            .assigned_contact_ids
            .iter()
            .filter(|id| !previous_assignees.contains(id))
        {
            let result = Notification::create(
                pool,
                &CreateNotification {
                    recipient_id: *contact_id,
                    kind: NotificationKind::TaskAssigned,
                    title: "New task assigned".to_string(),
                    message: format!("You have been assigned \"{}\"", task.title),
                    task_id: Some(task.id),
                    project_id: Some(task.project_id),
                },
                Uuid::new_v4(),
            )
            .await;
            match result {
                Ok(notification) => created.push(notification),
                Err(NotificationError::RecipientNotFound) => {
                    tracing::warn!(
                        task_id = %task.id,
                        contact_id = %contact_id,
                        "Skipping assignment notification for unknown contact"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(created)
    }

    /// Creates one due reminder per assignee of every open task due within
    /// `[today, today + days_ahead]`. Pairs that already have a reminder are
    /// left alone, so running this repeatedly is safe.
    pub async fn generate_due_reminders(
        &self,
        pool: &DbPool,
        today: NaiveDate,
        days_ahead: u32,
    ) -> Result<ReminderReport> {
        let until = add_days(today, i64::from(days_ahead)).unwrap_or(today);
        let tasks = Task::find_open_due_between(pool, today, until).await?;
        let mut report = ReminderReport {
            tasks_considered: tasks.len(),
            ..Default::default()
        };

        for task in &tasks {
            let Some(due_date) = task.due_date else {
                continue;
            };
            for contact_id in &task.assigned_contact_ids {
                let exists = match Notification::exists_for_task(
                    pool,
                    *contact_id,
                    task.id,
                    NotificationKind::DueReminder,
                )
                .await
                {
                    Ok(exists) => exists,
                    Err(NotificationError::RecipientNotFound) => {
                        tracing::warn!(
                            task_id = %task.id,
                            contact_id = %contact_id,
                            "Skipping due reminder for unknown contact"
                        );
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                };
                if exists {
                    report.already_notified += 1;
                    continue;
                }
                Notification::create(
                    pool,
                    &CreateNotification {
                        recipient_id: *contact_id,
                        kind: NotificationKind::DueReminder,
                        title: "Task due soon".to_string(),
                        message: format!("\"{}\" is due on {}", task.title, due_date),
                        task_id: Some(task.id),
                        project_id: Some(task.project_id),
                    },
                    Uuid::new_v4(),
                )
                .await?;
                report.created += 1;
            }
        }

        tracing::info!(
            %today,
            days_ahead,
            created = report.created,
            already_notified = report.already_notified,
            "Generated due reminders"
        );
        Ok(report)
    }
}
