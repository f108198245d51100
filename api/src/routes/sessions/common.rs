use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use db::models::class_session::Model as SessionModel;
use serde::{Deserialize, Serialize};
use services::workflow::EventReport;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionReq {
    pub class_id: i64,
    #[validate(length(min = 1, message = "subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "teacher_name is required"))]
    pub teacher_name: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_duration_minutes: Option<i32>,
    pub student_count: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSessionReq {
    pub subject: Option<String>,
    pub teacher_name: Option<String>,
    pub session_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub break_duration_minutes: Option<i32>,
    pub student_count: Option<i32>,
}

#[derive(Debug, Default, Serialize)]
pub struct SessionResponse {
    pub id: i64,
    pub class_id: i64,
    pub subject: String,
    pub teacher_name: String,
    pub session_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub break_duration_minutes: i32,
    pub status: String,
    pub actual_start_time: Option<DateTime<Utc>>,
    pub actual_break_time: Option<DateTime<Utc>>,
    pub actual_resume_time: Option<DateTime<Utc>>,
    pub actual_end_time: Option<DateTime<Utc>>,
    pub student_count: i32,
    pub notified_count: i32,
}

impl From<SessionModel> for SessionResponse {
    fn from(m: SessionModel) -> Self {
        Self {
            id: m.id,
            class_id: m.class_id,
            subject: m.subject,
            teacher_name: m.teacher_name,
            session_date: m.session_date,
            start_time: m.start_time,
            end_time: m.end_time,
            break_duration_minutes: m.break_duration_minutes,
            status: m.status.to_string(),
            actual_start_time: m.actual_start_time,
            actual_break_time: m.actual_break_time,
            actual_resume_time: m.actual_resume_time,
            actual_end_time: m.actual_end_time,
            student_count: m.student_count,
            notified_count: m.notified_count,
        }
    }
}

/// A committed transition plus the workflow fan-out it triggered.
#[derive(Debug, Default, Serialize)]
pub struct TransitionResponse {
    pub session: SessionResponse,
    pub workflows: Option<EventReport>,
}
