pub mod contacts;
pub mod health;
pub mod milestones;
pub mod notifications;
pub mod projects;
pub mod roles;
pub mod tasks;
pub mod templates;
