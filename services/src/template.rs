//! Message template validation and rendering.
//!
//! Templates carry `{variable}` placeholders drawn from a fixed per-event
//! vocabulary. Validation happens when a template is saved; rendering is a
//! single left-to-right scan, so a substituted value containing brace syntax
//! stays literal text.

use std::collections::HashMap;

use db::events::TriggerEvent;
use db::models::notification_template;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z][A-Za-z0-9_]*)\}").expect("placeholder regex"));

/// Placeholders permitted for every event type.
const COMMON_VARIABLES: &[&str] = &[
    "student_name",
    "parent_name",
    "class_name",
    "school_name",
    "session_date",
    "subject",
    "teacher_name",
];

/// The fixed vocabulary for one event type.
pub fn vocabulary(event_type: TriggerEvent) -> Vec<&'static str> {
    let specific: &[&str] = match event_type {
        TriggerEvent::SessionStart => &["start_time"],
        TriggerEvent::SessionBreak => &["break_time", "break_duration"],
        TriggerEvent::SessionResume => &["resume_time"],
        TriggerEvent::SessionFinish => &["end_time", "total_duration"],
        TriggerEvent::SessionCancel => &[],
        TriggerEvent::Manual | TriggerEvent::Scheduled => &["message"],
    };
    COMMON_VARIABLES.iter().chain(specific).copied().collect()
}

/// All placeholder names used in a body, in order of first appearance.
pub fn extract_placeholders(body: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for capture in PLACEHOLDER.captures_iter(body) {
        let name = capture[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Outcome of validating a body against an event vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateValidation {
    pub valid: bool,
    pub variables: Vec<String>,
    pub invalid_variables: Vec<String>,
}

/// Partitions the body's placeholders into known and unknown names.
pub fn validate(body: &str, event_type: TriggerEvent) -> TemplateValidation {
    let vocabulary = vocabulary(event_type);
    let mut variables = Vec::new();
    let mut invalid_variables = Vec::new();

    for name in extract_placeholders(body) {
        if vocabulary.contains(&name.as_str()) {
            variables.push(name);
        } else {
            invalid_variables.push(name);
        }
    }

    TemplateValidation {
        valid: invalid_variables.is_empty(),
        variables,
        invalid_variables,
    }
}

/// Substitutes every `{name}` with its supplied value in one pass.
///
/// Placeholders without a supplied value are left intact; values are inserted
/// as literal text and never re-scanned.
pub fn render(body: &str, variables: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(body.len());
    let mut last = 0;

    for capture in PLACEHOLDER.captures_iter(body) {
        let whole = capture.get(0).expect("capture 0 always present");
        out.push_str(&body[last..whole.start()]);
        match variables.get(&capture[1]) {
            Some(value) => out.push_str(value),
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&body[last..]);
    out
}

fn default_body(event_type: TriggerEvent, language: &str) -> &'static str {
    match (event_type, language) {
        (TriggerEvent::SessionStart, "id") => {
            "Yth. {parent_name}, {student_name} telah memulai pelajaran {subject} di kelas {class_name} pada pukul {start_time}. - {school_name}"
        }
        (TriggerEvent::SessionBreak, "id") => {
            "Yth. {parent_name}, pelajaran {subject} istirahat pukul {break_time} selama {break_duration} menit. - {school_name}"
        }
        (TriggerEvent::SessionResume, "id") => {
            "Yth. {parent_name}, pelajaran {subject} dilanjutkan kembali pukul {resume_time}. - {school_name}"
        }
        (TriggerEvent::SessionFinish, "id") => {
            "Yth. {parent_name}, {student_name} telah menyelesaikan pelajaran {subject} pukul {end_time} (durasi {total_duration}). - {school_name}"
        }
        (TriggerEvent::SessionCancel, "id") => {
            "Yth. {parent_name}, pelajaran {subject} untuk kelas {class_name} pada {session_date} dibatalkan. - {school_name}"
        }
        (TriggerEvent::Manual | TriggerEvent::Scheduled, "id") => {
            "Yth. {parent_name}, {message} - {school_name}"
        }
        (TriggerEvent::SessionStart, _) => {
            "Dear {parent_name}, {student_name} started {subject} in {class_name} at {start_time}. - {school_name}"
        }
        (TriggerEvent::SessionBreak, _) => {
            "Dear {parent_name}, {subject} is on a {break_duration}-minute break since {break_time}. - {school_name}"
        }
        (TriggerEvent::SessionResume, _) => {
            "Dear {parent_name}, {subject} resumed at {resume_time}. - {school_name}"
        }
        (TriggerEvent::SessionFinish, _) => {
            "Dear {parent_name}, {student_name} finished {subject} at {end_time} ({total_duration} total). - {school_name}"
        }
        (TriggerEvent::SessionCancel, _) => {
            "Dear {parent_name}, the {subject} session for {class_name} on {session_date} was cancelled. - {school_name}"
        }
        (TriggerEvent::Manual | TriggerEvent::Scheduled, _) => {
            "Dear {parent_name}, {message} - {school_name}"
        }
    }
}

/// Template lookup with lazy defaults.
#[derive(Clone)]
pub struct TemplateService {
    db: DatabaseConnection,
}

impl TemplateService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Validates and stores a template.
    pub async fn save(
        &self,
        name: &str,
        event_type: TriggerEvent,
        body: &str,
        language: &str,
    ) -> ServiceResult<notification_template::Model> {
        let validation = validate(body, event_type);
        if !validation.valid {
            return Err(ServiceError::UnknownPlaceholders(
                validation.invalid_variables,
            ));
        }

        notification_template::Model::create(
            &self.db,
            name,
            event_type,
            body,
            language,
            &validation.variables,
        )
        .await
        .map_err(ServiceError::from)
    }

    /// The active template for `(event_type, language)`, materializing the
    /// built-in default on first request if none has been configured.
    /// Dispatch never blocks on missing configuration.
    pub async fn resolve(
        &self,
        event_type: TriggerEvent,
        language: &str,
    ) -> ServiceResult<notification_template::Model> {
        if let Some(found) =
            notification_template::Model::find_for_event(&self.db, event_type, language).await?
        {
            return Ok(found);
        }

        info!(
            "No template configured for {} ({}), materializing default",
            event_type, language
        );
        let body = default_body(event_type, language);
        self.save(
            &format!("Default {} ({})", event_type, language),
            event_type,
            body,
            language,
        )
        .await
    }
}
