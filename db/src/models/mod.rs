pub mod class_group;
pub mod class_session;
pub mod connection_status;
pub mod notification_log;
pub mod notification_template;
pub mod parent_contact;
pub mod student;
pub mod workflow;
