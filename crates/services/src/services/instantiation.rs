//! Turns a project template into a dated project.
//!
//! Creation order comes from [`plan_creation_order`], a topological sort over
//! parent and dependency edges between template tasks. Tasks that can never
//! be created (their parent is missing, or their parent chain loops) are
//! reported back instead of being retried.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use db::{
    DbErr, DbPool,
    models::{
        contact::Contact,
        milestone::{CreateMilestone, Milestone, MilestoneError},
        project::{CreateProject, Project, ProjectError},
        project_template::{ProjectTemplate, TemplateError},
        task::{CreateTask, Task, TaskError},
        template_task::TemplateTask,
    },
};
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use utils::dates::add_days;
use uuid::Uuid;

use super::{
    config::{Config, InstantiationConfig, PlaceholderContact},
    role_resolver::{RoleResolver, RoleResolverError, resolve_against, split_role_labels},
};

#[derive(Debug, Error)]
pub enum InstantiationError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Template not found")]
    TemplateNotFound,
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Milestone(#[from] MilestoneError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Roles(#[from] RoleResolverError),
}

pub type Result<T> = std::result::Result<T, InstantiationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The parent (or an ancestor) is not part of the template.
    MissingParent,
    /// Parent references loop back to the task.
    Cycle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
pub struct UnresolvedTask {
    pub template_task_id: Uuid,
    pub title: String,
    pub reason: UnresolvedReason,
}

/// Order in which template tasks are materialised, as indices into the
/// slice handed to [`plan_creation_order`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreationPlan {
    pub order: Vec<usize>,
    pub skipped_titles: Vec<Uuid>,
    pub unresolved: Vec<UnresolvedTask>,
}

/// Kahn's algorithm over parent->child and dependency->dependent edges.
///
/// Only parent edges can keep a task out of the project: a task whose parent
/// chain ends at a missing task, or loops, is reported as unresolved together
/// with everything below it. Dependency edges only order creation. When the
/// dependency can never be created, or dependencies loop, the waiting task is
/// released and created without a dependency-derived date.
///
/// Among ready tasks, those without a dependency go first, then roots before
/// children, then by template sort order. Dependencies on tasks outside the
/// template add no edge. Tasks with a blank title are skipped, which leaves
/// their children with a missing parent.
pub fn plan_creation_order(tasks: &[TemplateTask]) -> CreationPlan {
    let mut plan = CreationPlan::default();
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        if task.title.trim().is_empty() {
            plan.skipped_titles.push(task.id);
        } else {
            index.insert(task.id, i);
        }
    }

    let n = tasks.len();
    let mut parent_of: Vec<Option<usize>> = vec![None; n];
    let mut dependency_of: Vec<Option<usize>> = vec![None; n];
    let mut missing_parent = vec![false; n];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, task) in tasks.iter().enumerate() {
        if !index.contains_key(&task.id) {
            continue;
        }
        if let Some(parent_id) = task.parent_task_id {
            match index.get(&parent_id) {
                Some(&p) => {
                    parent_of[i] = Some(p);
                    children[p].push(i);
                }
                None => missing_parent[i] = true,
            }
        }
        dependency_of[i] = task
            .depends_on_task_id
            .and_then(|dependency_id| index.get(&dependency_id).copied());
    }

    // A task can be created iff its parent chain reaches a root.
    let mut viable = vec![false; n];
    let mut stack: Vec<usize> = index
        .values()
        .copied()
        .filter(|&i| parent_of[i].is_none() && !missing_parent[i])
        .collect();
    while let Some(i) = stack.pop() {
        viable[i] = true;
        stack.extend(children[i].iter().copied());
    }

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut waits_on_parent = vec![false; n];
    let mut waits_on_dependency = vec![false; n];
    for i in (0..n).filter(|&i| viable[i]) {
        waits_on_parent[i] = parent_of[i].is_some();
        if let Some(d) = dependency_of[i]
            && viable[d]
            && d != i
        {
            waits_on_dependency[i] = true;
            dependents[d].push(i);
        }
    }

    let key = |i: usize| {
        (
            dependency_of[i].is_some(),
            tasks[i].parent_task_id.is_some(),
            tasks[i].sort_order,
            i,
        )
    };
    let mut ready: BTreeSet<(bool, bool, i32, usize)> = (0..n)
        .filter(|&i| viable[i] && !waits_on_parent[i] && !waits_on_dependency[i])
        .map(key)
        .collect();
    let mut placed = vec![false; n];

    loop {
        while let Some((_, _, _, i)) = ready.pop_first() {
            placed[i] = true;
            plan.order.push(i);
            for &child in &children[i] {
                waits_on_parent[child] = false;
                if !waits_on_dependency[child] {
                    ready.insert(key(child));
                }
            }
            for &dependent in &dependents[i] {
                if !placed[dependent] && waits_on_dependency[dependent] {
                    waits_on_dependency[dependent] = false;
                    if !waits_on_parent[dependent] {
                        ready.insert(key(dependent));
                    }
                }
            }
        }

        // Stalled on a dependency loop: free the first task whose parent is
        // already in place.
        let Some(released) = (0..n)
            .filter(|&i| viable[i] && !placed[i] && !waits_on_parent[i])
            .min_by_key(|&i| key(i))
        else {
            break;
        };
        tracing::debug!(
            template_task_id = %tasks[released].id,
            "Releasing template task from a dependency loop"
        );
        waits_on_dependency[released] = false;
        ready.insert(key(released));
    }

    plan.unresolved = tasks
        .iter()
        .enumerate()
        .filter(|(i, task)| !viable[*i] && index.contains_key(&task.id))
        .map(|(i, task)| UnresolvedTask {
            template_task_id: task.id,
            title: task.title.clone(),
            reason: parent_chain_failure(i, &parent_of, &missing_parent),
        })
        .collect();

    plan
}

/// Walks up from a task that never became viable: the chain either ends at
/// a missing parent or runs into a loop.
fn parent_chain_failure(
    start: usize,
    parent_of: &[Option<usize>],
    missing_parent: &[bool],
) -> UnresolvedReason {
    let mut seen = vec![false; parent_of.len()];
    let mut current = start;
    loop {
        if missing_parent[current] {
            return UnresolvedReason::MissingParent;
        }
        if seen[current] {
            return UnresolvedReason::Cycle;
        }
        seen[current] = true;
        match parent_of[current] {
            Some(parent) => current = parent,
            None => return UnresolvedReason::MissingParent,
        }
    }
}

/// What the task's dependency contributes to its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyDue {
    /// The task has no dependency.
    Independent,
    /// The dependency was created with this due date.
    Dated(NaiveDate),
    /// The dependency has no due date or is not part of the template.
    Undated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedDueDate {
    pub due_date: Option<NaiveDate>,
    pub days_from_meeting: Option<i32>,
}

/// Due date of an instantiated task, with the offset to persist alongside.
///
/// Precedence: explicit template date, then dependency, then anchor plus the
/// template offset. Children of checkpoint tasks get no offset-derived date.
pub fn resolve_due_date(
    task: &TemplateTask,
    parent_title: Option<&str>,
    dependency: DependencyDue,
    anchor: NaiveDate,
    rules: &InstantiationConfig,
) -> ResolvedDueDate {
    if let Some(due_date) = task.due_date {
        return ResolvedDueDate {
            due_date: Some(due_date),
            days_from_meeting: None,
        };
    }

    match dependency {
        DependencyDue::Dated(dependency_due) => {
            let due_date = add_days(dependency_due, rules.dependency_offset_for(&task.title));
            ResolvedDueDate {
                due_date,
                days_from_meeting: due_date
                    .and_then(|due| i32::try_from((due - anchor).num_days()).ok()),
            }
        }
        DependencyDue::Undated => ResolvedDueDate::default(),
        DependencyDue::Independent => {
            let Some(offset) = task.days_from_meeting else {
                return ResolvedDueDate::default();
            };
            if parent_title.is_some_and(|title| rules.is_checkpoint_title(title)) {
                return ResolvedDueDate::default();
            }
            ResolvedDueDate {
                due_date: add_days(anchor, i64::from(offset)),
                days_from_meeting: Some(offset),
            }
        }
    }
}

/// Assignees for a template task: role labels win over an explicit contact.
fn template_assignment(
    task: &TemplateTask,
    team: &[Contact],
    placeholders: &[PlaceholderContact],
) -> (Vec<Uuid>, Vec<String>) {
    let labels = task
        .assigned_role
        .as_deref()
        .map(split_role_labels)
        .unwrap_or_default();
    if !labels.is_empty() {
        let resolution = resolve_against(team, &labels, placeholders);
        return (
            resolution.contact_ids.unwrap_or_default(),
            resolution.unassigned_roles,
        );
    }
    (task.assigned_contact_id.into_iter().collect(), Vec::new())
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct InstantiationReport {
    pub project: Project,
    pub milestones: Vec<Milestone>,
    pub tasks: Vec<Task>,
    pub skipped_titles: Vec<Uuid>,
    pub unresolved: Vec<UnresolvedTask>,
    pub pending_roles: Vec<String>,
}

#[derive(Clone, Default)]
pub struct InstantiationService {
    roles: RoleResolver,
}

impl InstantiationService {
    pub fn new(roles: RoleResolver) -> Self {
        Self { roles }
    }

    /// Creates the project, its milestones and its tasks. Each row is its own
    /// write; a failure part-way leaves what was already created in place.
    pub async fn instantiate(
        &self,
        pool: &DbPool,
        config: &Config,
        template_id: Uuid,
        anchor: NaiveDate,
        data: &CreateProject,
    ) -> Result<InstantiationReport> {
        let template = ProjectTemplate::find_by_id(pool, template_id)
            .await?
            .ok_or(InstantiationError::TemplateNotFound)?;
        let rules = &config.instantiation;
        let placeholders = &config.roles.placeholder_contacts;

        let project = Project::create(
            pool,
            &CreateProject {
                due_date: Some(anchor),
                template_id: Some(template.id),
                meeting_type: data
                    .meeting_type
                    .clone()
                    .or_else(|| template.meeting_type.clone()),
                ..data.clone()
            },
            Uuid::new_v4(),
        )
        .await?;
        tracing::info!(
            project_id = %project.id,
            template_id = %template.id,
            %anchor,
            "Instantiating project from template"
        );

        let template_milestones = Milestone::find_by_template(pool, template.id).await?;
        let mut milestone_ids = HashMap::with_capacity(template_milestones.len());
        let mut milestones = Vec::with_capacity(template_milestones.len());
        for blueprint in &template_milestones {
            let created = Milestone::create(
                pool,
                &CreateMilestone {
                    description: blueprint.description.clone(),
                    ..CreateMilestone::for_project(
                        project.id,
                        &blueprint.title,
                        Some(blueprint.sort_order),
                    )
                },
                Uuid::new_v4(),
            )
            .await?;
            milestone_ids.insert(blueprint.id, created.id);
            milestones.push(created);
        }

        let template_tasks = TemplateTask::find_by_template(pool, template.id).await?;
        trace_milestone(rules, &template_milestones, &template_tasks);

        let plan = plan_creation_order(&template_tasks);
        if !plan.skipped_titles.is_empty() {
            tracing::warn!(
                project_id = %project.id,
                count = plan.skipped_titles.len(),
                "Skipped template tasks with empty titles"
            );
        }
        if !plan.unresolved.is_empty() {
            tracing::warn!(
                project_id = %project.id,
                count = plan.unresolved.len(),
                unresolved = ?plan.unresolved,
                "Dropped template tasks whose parent or dependency never resolved"
            );
        }

        let team = self.roles.team_members(pool).await?;
        let titles: HashMap<Uuid, &str> = template_tasks
            .iter()
            .map(|task| (task.id, task.title.as_str()))
            .collect();
        let mut created: HashMap<Uuid, (Uuid, Option<NaiveDate>)> =
            HashMap::with_capacity(plan.order.len());

        for &i in &plan.order {
            let blueprint = &template_tasks[i];
            let parent_title = blueprint
                .parent_task_id
                .and_then(|id| titles.get(&id).copied());
            let dependency = match blueprint.depends_on_task_id {
                None => DependencyDue::Independent,
                Some(id) => match created.get(&id) {
                    Some((_, Some(due))) => DependencyDue::Dated(*due),
                    _ => DependencyDue::Undated,
                },
            };
            let resolved = resolve_due_date(blueprint, parent_title, dependency, anchor, rules);
            let (assigned_contact_ids, assigned_roles) =
                template_assignment(blueprint, &team, placeholders);

            let task = Task::create(
                pool,
                &CreateTask {
                    project_id: project.id,
                    milestone_id: blueprint
                        .milestone_id
                        .and_then(|id| milestone_ids.get(&id).copied()),
                    title: blueprint.title.trim().to_string(),
                    description: blueprint.description.clone(),
                    status: None,
                    priority: Some(blueprint.priority),
                    due_date: resolved.due_date,
                    days_from_meeting: resolved.days_from_meeting,
                    assigned_contact_ids,
                    assigned_roles,
                    parent_task_id: blueprint
                        .parent_task_id
                        .and_then(|id| created.get(&id))
                        .map(|(task_id, _)| *task_id),
                    depends_on_task_id: blueprint
                        .depends_on_task_id
                        .and_then(|id| created.get(&id))
                        .map(|(task_id, _)| *task_id),
                    sort_order: Some(blueprint.sort_order),
                    level: Some(blueprint.level),
                },
                Uuid::new_v4(),
            )
            .await?;
            created.insert(blueprint.id, (task.id, task.due_date));
        }

        let pending = self
            .roles
            .reresolve_pending(pool, project.id, placeholders)
            .await?;
        let tasks = Task::find_by_project(pool, project.id).await?;
        tracing::info!(
            project_id = %project.id,
            milestones = milestones.len(),
            tasks = tasks.len(),
            pending_roles = pending.still_pending.len(),
            "Project instantiated"
        );

        Ok(InstantiationReport {
            project,
            milestones,
            tasks,
            skipped_titles: plan.skipped_titles,
            unresolved: plan.unresolved,
            pending_roles: pending.still_pending,
        })
    }
}

fn trace_milestone(
    rules: &InstantiationConfig,
    milestones: &[Milestone],
    tasks: &[TemplateTask],
) {
    let Some(wanted) = rules.trace_milestone.as_deref() else {
        return;
    };
    for milestone in milestones
        .iter()
        .filter(|milestone| milestone.title.trim().eq_ignore_ascii_case(wanted.trim()))
    {
        let traced: Vec<(&str, Option<i32>, Option<Uuid>)> = tasks
            .iter()
            .filter(|task| task.milestone_id == Some(milestone.id))
            .map(|task| (task.title.as_str(), task.days_from_meeting, task.parent_task_id))
            .collect();
        tracing::debug!(
            milestone = %milestone.title,
            task_count = traced.len(),
            tasks = ?traced,
            "Tracing template milestone"
        );
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::models::{
        contact::CreateContact,
        project_template::CreateProjectTemplate,
        template_task::{CreateTemplateTask, UpdateTemplateTask},
    };
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn blueprint(title: &str, sort_order: i32) -> TemplateTask {
        TemplateTask {
            id: Uuid::new_v4(),
            template_id: Uuid::nil(),
            milestone_id: None,
            title: title.to_string(),
            description: None,
            priority: 25,
            days_from_meeting: None,
            due_date: None,
            depends_on_task_id: None,
            parent_task_id: None,
            assigned_role: None,
            assigned_contact_id: None,
            sort_order,
            level: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ordered_titles<'a>(tasks: &'a [TemplateTask], plan: &CreationPlan) -> Vec<&'a str> {
        plan.order.iter().map(|&i| tasks[i].title.as_str()).collect()
    }

    #[test]
    fn roots_then_children_then_dependents() {
        let root_b = blueprint("root b", 2);
        let root_a = blueprint("root a", 1);
        let child = TemplateTask {
            parent_task_id: Some(root_b.id),
            ..blueprint("child of b", 0)
        };
        let dependent = TemplateTask {
            depends_on_task_id: Some(child.id),
            ..blueprint("after child", 0)
        };
        let tasks = vec![dependent, child, root_b, root_a];

        let plan = plan_creation_order(&tasks);
        assert_eq!(
            ordered_titles(&tasks, &plan),
            vec!["root a", "root b", "child of b", "after child"]
        );
        assert!(plan.unresolved.is_empty());
        assert!(plan.skipped_titles.is_empty());
    }

    #[test]
    fn parents_are_always_created_before_children() {
        let top = blueprint("top", 9);
        let mid = TemplateTask {
            parent_task_id: Some(top.id),
            ..blueprint("mid", 0)
        };
        let leaf = TemplateTask {
            parent_task_id: Some(mid.id),
            ..blueprint("leaf", 0)
        };
        let tasks = vec![leaf, mid, top];

        let plan = plan_creation_order(&tasks);
        assert_eq!(ordered_titles(&tasks, &plan), vec!["top", "mid", "leaf"]);
    }

    #[test]
    fn missing_parents_and_cycles_are_reported_and_siblings_survive() {
        let sibling = blueprint("sibling", 0);
        let orphan = TemplateTask {
            parent_task_id: Some(Uuid::new_v4()),
            ..blueprint("orphan", 1)
        };
        let orphan_child = TemplateTask {
            parent_task_id: Some(orphan.id),
            ..blueprint("orphan child", 2)
        };
        let mut loop_a = blueprint("loop a", 3);
        let loop_b = TemplateTask {
            parent_task_id: Some(loop_a.id),
            ..blueprint("loop b", 4)
        };
        loop_a.parent_task_id = Some(loop_b.id);
        let tasks = vec![
            sibling,
            orphan,
            orphan_child,
            loop_a,
            loop_b,
        ];

        let plan = plan_creation_order(&tasks);
        assert_eq!(ordered_titles(&tasks, &plan), vec!["sibling"]);
        let reasons: Vec<(&str, UnresolvedReason)> = plan
            .unresolved
            .iter()
            .map(|u| (u.title.as_str(), u.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("orphan", UnresolvedReason::MissingParent),
                ("orphan child", UnresolvedReason::MissingParent),
                ("loop a", UnresolvedReason::Cycle),
                ("loop b", UnresolvedReason::Cycle),
            ]
        );
    }

    #[test]
    fn dependents_of_dropped_tasks_are_still_created() {
        let orphan = TemplateTask {
            parent_task_id: Some(Uuid::new_v4()),
            ..blueprint("orphan", 0)
        };
        let after_orphan = TemplateTask {
            depends_on_task_id: Some(orphan.id),
            ..blueprint("after orphan", 1)
        };
        let mut loop_a = blueprint("loop a", 2);
        let loop_b = TemplateTask {
            parent_task_id: Some(loop_a.id),
            ..blueprint("loop b", 3)
        };
        loop_a.parent_task_id = Some(loop_b.id);
        let parent = blueprint("parent", 4);
        let after_loop = TemplateTask {
            parent_task_id: Some(parent.id),
            depends_on_task_id: Some(loop_a.id),
            ..blueprint("after loop", 5)
        };
        let tasks = vec![orphan, after_orphan, loop_a, loop_b, parent, after_loop];

        let plan = plan_creation_order(&tasks);
        assert_eq!(
            ordered_titles(&tasks, &plan),
            vec!["parent", "after orphan", "after loop"]
        );
        let reasons: Vec<(&str, UnresolvedReason)> = plan
            .unresolved
            .iter()
            .map(|u| (u.title.as_str(), u.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("orphan", UnresolvedReason::MissingParent),
                ("loop a", UnresolvedReason::Cycle),
                ("loop b", UnresolvedReason::Cycle),
            ]
        );
    }

    #[test]
    fn dependency_loops_are_broken_not_dropped() {
        let mut first = blueprint("first", 0);
        let second = TemplateTask {
            depends_on_task_id: Some(first.id),
            ..blueprint("second", 1)
        };
        first.depends_on_task_id = Some(second.id);
        let waits_on_itself = blueprint("waits on itself", 2);
        let waits_on_itself = TemplateTask {
            depends_on_task_id: Some(waits_on_itself.id),
            ..waits_on_itself
        };
        let tasks = vec![second, first, waits_on_itself];

        let plan = plan_creation_order(&tasks);
        assert_eq!(
            ordered_titles(&tasks, &plan),
            vec!["waits on itself", "first", "second"]
        );
        assert!(plan.unresolved.is_empty());
    }

    #[test]
    fn blank_titles_are_skipped_and_orphan_their_children() {
        let blank = blueprint("   ", 0);
        let child = TemplateTask {
            parent_task_id: Some(blank.id),
            ..blueprint("child", 1)
        };
        let outside_dependency = TemplateTask {
            depends_on_task_id: Some(Uuid::new_v4()),
            ..blueprint("depends elsewhere", 2)
        };
        let tasks = vec![blank.clone(), child, outside_dependency];

        let plan = plan_creation_order(&tasks);
        assert_eq!(plan.skipped_titles, vec![blank.id]);
        assert_eq!(ordered_titles(&tasks, &plan), vec!["depends elsewhere"]);
        assert_eq!(plan.unresolved.len(), 1);
        assert_eq!(plan.unresolved[0].reason, UnresolvedReason::MissingParent);
    }

    #[test]
    fn offset_is_relative_to_anchor() {
        let rules = InstantiationConfig::default();
        let task = TemplateTask {
            days_from_meeting: Some(-10),
            ..blueprint("Submit Report", 0)
        };

        let resolved =
            resolve_due_date(&task, None, DependencyDue::Independent, ymd(2025, 6, 1), &rules);
        assert_eq!(resolved.due_date, Some(ymd(2025, 5, 22)));
        assert_eq!(resolved.days_from_meeting, Some(-10));
    }

    #[test]
    fn checkpoint_children_get_no_date() {
        let rules = InstantiationConfig::default();
        let task = TemplateTask {
            days_from_meeting: Some(-5),
            ..blueprint("Confirm nominations", 0)
        };

        let resolved = resolve_due_date(
            &task,
            Some("Nominations and Deliverables Checkpoints"),
            DependencyDue::Independent,
            ymd(2025, 6, 1),
            &rules,
        );
        assert_eq!(resolved, ResolvedDueDate::default());
    }

    #[test]
    fn explicit_date_wins_over_everything() {
        let rules = InstantiationConfig::default();
        let task = TemplateTask {
            due_date: Some(ymd(2025, 1, 15)),
            days_from_meeting: Some(-10),
            ..blueprint("Fixed", 0)
        };

        let resolved = resolve_due_date(
            &task,
            None,
            DependencyDue::Dated(ymd(2025, 5, 1)),
            ymd(2025, 6, 1),
            &rules,
        );
        assert_eq!(resolved.due_date, Some(ymd(2025, 1, 15)));
        assert_eq!(resolved.days_from_meeting, None);
    }

    #[test]
    fn dependency_offsets() {
        let rules = InstantiationConfig::default();
        let anchor = ymd(2025, 6, 1);
        let dependency = DependencyDue::Dated(ymd(2025, 5, 20));

        let sealed = resolve_due_date(
            &blueprint("Sealed Packet", 0),
            None,
            dependency,
            anchor,
            &rules,
        );
        assert_eq!(sealed.due_date, Some(ymd(2025, 5, 23)));
        assert_eq!(sealed.days_from_meeting, Some(-9));

        let other = resolve_due_date(&blueprint("Mail copy", 0), None, dependency, anchor, &rules);
        assert_eq!(other.due_date, Some(ymd(2025, 5, 21)));

        let undated = TemplateTask {
            days_from_meeting: Some(-3),
            ..blueprint("Mail copy", 0)
        };
        let resolved = resolve_due_date(&undated, None, DependencyDue::Undated, anchor, &rules);
        assert_eq!(resolved, ResolvedDueDate::default());
    }

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn add_task(
        db: &sea_orm::DatabaseConnection,
        template_id: Uuid,
        data: CreateTemplateTask,
    ) -> TemplateTask {
        TemplateTask::create(db, template_id, &data, Uuid::new_v4())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn instantiates_milestones_tasks_dates_and_roles() {
        let db = setup_db().await;
        let config = Config::default();
        let attorney = Contact::create(
            &db,
            &CreateContact::team_member("Ann", "Lee", "estate_attorney"),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let template = ProjectTemplate::create(
            &db,
            &CreateProjectTemplate {
                name: "Design meeting".to_string(),
                description: None,
                meeting_type: Some("design".to_string()),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let prep = Milestone::create(
            &db,
            &CreateMilestone::for_template(template.id, "Preparation", Some(0)),
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let follow_up = Milestone::create(
            &db,
            &CreateMilestone::for_template(template.id, "Follow-up", Some(1)),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let report_task = add_task(
            &db,
            template.id,
            CreateTemplateTask {
                milestone_id: Some(prep.id),
                days_from_meeting: Some(-10),
                assigned_role: Some("estate_attorney, trustee".to_string()),
                ..CreateTemplateTask::titled("Submit Report")
            },
        )
        .await;
        let checkpoint = add_task(
            &db,
            template.id,
            CreateTemplateTask {
                milestone_id: Some(prep.id),
                days_from_meeting: Some(-7),
                sort_order: Some(1),
                ..CreateTemplateTask::titled("Nominations and Deliverables Checkpoints")
            },
        )
        .await;
        add_task(
            &db,
            template.id,
            CreateTemplateTask {
                milestone_id: Some(prep.id),
                parent_task_id: Some(checkpoint.id),
                days_from_meeting: Some(-5),
                ..CreateTemplateTask::titled("Collect nominations")
            },
        )
        .await;
        add_task(
            &db,
            template.id,
            CreateTemplateTask {
                milestone_id: Some(follow_up.id),
                depends_on_task_id: Some(report_task.id),
                ..CreateTemplateTask::titled("Sealed Packet")
            },
        )
        .await;
        add_task(&db, template.id, CreateTemplateTask::titled("  ")).await;

        let report = InstantiationService::new(RoleResolver::new())
            .instantiate(
                &db,
                &config,
                template.id,
                ymd(2025, 6, 1),
                &CreateProject::named("Lee estate"),
            )
            .await
            .unwrap();

        assert_eq!(report.project.due_date, Some(ymd(2025, 6, 1)));
        assert_eq!(report.project.template_id, Some(template.id));
        assert_eq!(report.project.meeting_type.as_deref(), Some("design"));
        assert_eq!(report.milestones.len(), 2);
        assert_eq!(report.tasks.len(), 4);
        assert_eq!(report.skipped_titles.len(), 1);
        assert!(report.unresolved.is_empty());
        assert_eq!(report.pending_roles, vec!["trustee".to_string()]);

        let by_title = |title: &str| {
            report
                .tasks
                .iter()
                .find(|task| task.title == title)
                .unwrap()
                .clone()
        };
        let submit = by_title("Submit Report");
        assert_eq!(submit.due_date, Some(ymd(2025, 5, 22)));
        assert_eq!(submit.days_from_meeting, Some(-10));
        assert_eq!(submit.assigned_contact_ids, vec![attorney.id]);
        assert_eq!(submit.assigned_roles, vec!["trustee".to_string()]);
        assert_eq!(submit.milestone_id, Some(report.milestones[0].id));

        let checkpoint_task = by_title("Nominations and Deliverables Checkpoints");
        let nominations = by_title("Collect nominations");
        assert_eq!(nominations.parent_task_id, Some(checkpoint_task.id));
        assert_eq!(nominations.due_date, None);
        assert_eq!(nominations.level, 1);

        let sealed = by_title("Sealed Packet");
        assert_eq!(sealed.depends_on_task_id, Some(submit.id));
        assert_eq!(sealed.due_date, Some(ymd(2025, 5, 25)));
        assert_eq!(sealed.days_from_meeting, Some(-7));
        assert_eq!(sealed.milestone_id, Some(report.milestones[1].id));
    }

    #[tokio::test]
    async fn dependency_loop_still_creates_both_tasks_without_dates() {
        let db = setup_db().await;
        let template = ProjectTemplate::create(
            &db,
            &CreateProjectTemplate {
                name: "Looping".to_string(),
                description: None,
                meeting_type: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let deliver = add_task(
            &db,
            template.id,
            CreateTemplateTask {
                days_from_meeting: Some(-5),
                sort_order: Some(0),
                ..CreateTemplateTask::titled("Deliver")
            },
        )
        .await;
        let review = add_task(
            &db,
            template.id,
            CreateTemplateTask {
                depends_on_task_id: Some(deliver.id),
                sort_order: Some(1),
                ..CreateTemplateTask::titled("Review")
            },
        )
        .await;
        TemplateTask::update(
            &db,
            deliver.id,
            &UpdateTemplateTask {
                depends_on_task_id: Some(review.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let report = InstantiationService::default()
            .instantiate(
                &db,
                &Config::default(),
                template.id,
                ymd(2025, 6, 1),
                &CreateProject::named("Loop"),
            )
            .await
            .unwrap();

        assert!(report.unresolved.is_empty());
        let titles: Vec<&str> = report.tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Deliver", "Review"]);
        assert!(report.tasks.iter().all(|t| t.due_date.is_none()));
        assert_eq!(report.tasks[0].depends_on_task_id, None);
        assert_eq!(report.tasks[1].depends_on_task_id, Some(report.tasks[0].id));
    }

    #[tokio::test]
    async fn cyclic_template_tasks_are_dropped_and_the_rest_created() {
        let db = setup_db().await;
        let template = ProjectTemplate::create(
            &db,
            &CreateProjectTemplate {
                name: "Broken".to_string(),
                description: None,
                meeting_type: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let a = add_task(&db, template.id, CreateTemplateTask::titled("A")).await;
        add_task(
            &db,
            template.id,
            CreateTemplateTask {
                parent_task_id: Some(a.id),
                ..CreateTemplateTask::titled("B")
            },
        )
        .await;
        let b = TemplateTask::find_by_template(&db, template.id)
            .await
            .unwrap()
            .into_iter()
            .find(|task| task.title == "B")
            .unwrap();
        TemplateTask::update(
            &db,
            a.id,
            &UpdateTemplateTask {
                parent_task_id: Some(b.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        add_task(&db, template.id, CreateTemplateTask::titled("Standalone")).await;

        let report = InstantiationService::default()
            .instantiate(
                &db,
                &Config::default(),
                template.id,
                ymd(2025, 6, 1),
                &CreateProject::named("Partial"),
            )
            .await
            .unwrap();

        assert_eq!(report.tasks.len(), 1);
        assert_eq!(report.tasks[0].title, "Standalone");
        assert_eq!(report.unresolved.len(), 2);
        assert!(
            report
                .unresolved
                .iter()
                .all(|u| u.reason == UnresolvedReason::Cycle)
        );
    }

    #[tokio::test]
    async fn unknown_template_is_rejected() {
        let db = setup_db().await;
        let err = InstantiationService::default()
            .instantiate(
                &db,
                &Config::default(),
                Uuid::new_v4(),
                ymd(2025, 6, 1),
                &CreateProject::named("Nope"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, InstantiationError::TemplateNotFound));
        assert_eq!(Project::count(&db).await.unwrap(), 0);
    }
}
