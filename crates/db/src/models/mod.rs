pub mod contact;
pub mod ids;
pub mod interaction;
pub mod milestone;
pub mod notification;
pub mod project;
pub mod project_template;
pub mod task;
pub mod template_task;
