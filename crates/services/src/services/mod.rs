pub mod config;
pub mod due_date_cascade;
pub mod instantiation;
pub mod notification;
pub mod project;
pub mod role_resolver;
pub mod task_hierarchy;
pub mod template;
