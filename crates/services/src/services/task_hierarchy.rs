//! Rebuilds the parent/child tree of a project's tasks from the flat list.
//!
//! Siblings are ordered by a total order over three classes: tasks with a
//! days-from-meeting offset first (by offset), then tasks with only an
//! absolute due date (by date), then undated tasks alphabetically. Ties
//! fall back to the stored sort position and finally the task id.

use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
};

use db::models::task::Task;
use serde::Serialize;
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("Task {0} appears more than once")]
    DuplicateTask(Uuid),
    #[error("Parent chain of task {0} loops back on itself")]
    ParentCycle(Uuid),
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct TaskNode {
    #[serde(flatten)]
    #[ts(flatten)]
    pub task: Task,
    pub children: Vec<TaskNode>,
}

impl TaskNode {
    /// Number of tasks in this subtree, including the node itself.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(TaskNode::len).sum::<usize>()
    }
}

fn date_class(task: &Task) -> u8 {
    if task.days_from_meeting.is_some() {
        0
    } else if task.due_date.is_some() {
        1
    } else {
        2
    }
}

/// Sibling order used at every level of the tree.
pub fn compare_siblings(a: &Task, b: &Task) -> Ordering {
    let by_class = date_class(a).cmp(&date_class(b));
    let by_date = match (a.days_from_meeting, b.days_from_meeting) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => match (a.due_date, b.due_date) {
            (Some(x), Some(y)) if date_class(a) == 1 => x.cmp(&y),
            _ if date_class(a) == 2 => a
                .title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title)),
            _ => Ordering::Equal,
        },
    };

    by_class
        .then(by_date)
        .then_with(|| a.sort_order.cmp(&b.sort_order))
        .then_with(|| a.id.cmp(&b.id))
}

/// Builds the tree, or reports why the input cannot form one.
///
/// When `milestone_scope` is set only that milestone's tasks are considered.
/// A task attaches to its parent only if the parent is present and shares
/// the task's milestone; otherwise it is promoted to a root.
pub fn try_build_task_tree(
    tasks: Vec<Task>,
    milestone_scope: Option<Uuid>,
) -> Result<Vec<TaskNode>, HierarchyError> {
    let tasks: Vec<Task> = match milestone_scope {
        Some(scope) => tasks
            .into_iter()
            .filter(|task| task.milestone_id == Some(scope))
            .collect(),
        None => tasks,
    };

    let mut by_id: HashMap<Uuid, &Task> = HashMap::with_capacity(tasks.len());
    for task in &tasks {
        if by_id.insert(task.id, task).is_some() {
            return Err(HierarchyError::DuplicateTask(task.id));
        }
    }

    let attached_parent = |task: &Task| -> Option<Uuid> {
        let parent_id = task.parent_task_id?;
        let parent = by_id.get(&parent_id)?;
        (parent.milestone_id == task.milestone_id).then_some(parent_id)
    };

    for task in &tasks {
        let mut seen = HashSet::from([task.id]);
        let mut cursor = attached_parent(task);
        while let Some(parent_id) = cursor {
            if !seen.insert(parent_id) {
                return Err(HierarchyError::ParentCycle(task.id));
            }
            cursor = by_id
                .get(&parent_id)
                .copied()
                .and_then(|parent| attached_parent(parent));
        }
    }

    let parents: Vec<Option<Uuid>> = tasks.iter().map(|task| attached_parent(task)).collect();
    drop(by_id);

    let mut roots = Vec::new();
    let mut children: HashMap<Uuid, Vec<Task>> = HashMap::new();
    for (task, parent) in tasks.into_iter().zip(parents) {
        match parent {
            Some(parent_id) => children.entry(parent_id).or_default().push(task),
            None => roots.push(task),
        }
    }

    Ok(assemble(roots, &mut children))
}

fn assemble(mut level: Vec<Task>, children: &mut HashMap<Uuid, Vec<Task>>) -> Vec<TaskNode> {
    level.sort_by(compare_siblings);
    level
        .into_iter()
        .map(|task| {
            let kids = children.remove(&task.id).unwrap_or_default();
            TaskNode {
                children: assemble(kids, children),
                task,
            }
        })
        .collect()
}

/// Never fails: malformed input is logged and yields an empty tree.
pub fn build_task_tree(tasks: Vec<Task>, milestone_scope: Option<Uuid>) -> Vec<TaskNode> {
    match try_build_task_tree(tasks, milestone_scope) {
        Ok(tree) => tree,
        Err(e) => {
            tracing::error!(
                milestone_id = ?milestone_scope,
                "Failed to build task hierarchy: {}",
                e
            );
            Vec::new()
        }
    }
}
