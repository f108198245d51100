pub mod m202601120001_create_classes;
pub mod m202601120002_create_class_sessions;
pub mod m202601120003_create_parent_contacts;
pub mod m202601120004_create_notification_templates;
pub mod m202601120005_create_workflows;
pub mod m202601120006_create_notification_logs;
pub mod m202601120007_create_connection_status;
