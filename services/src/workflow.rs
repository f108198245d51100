//! The workflow engine.
//!
//! Reacts to trigger events emitted by the session state machine: loads the
//! active workflows for the trigger in priority order, gates each on its
//! stored conditions, and runs its actions in declared order. One workflow's
//! failure never prevents its siblings from running, and one action's failure
//! never prevents later actions in the same workflow.

use std::sync::Arc;

use db::events::SessionEvent;
use db::models::{class_session, notification_log, student, workflow};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dispatcher::{base_variables, Dispatcher};
use crate::error::ServiceResult;
use crate::mailer::Mailer;
use crate::template;

/// Outcome of one workflow run for a single trigger event.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRunReport {
    pub workflow_id: i64,
    pub workflow_name: String,
    pub conditions_met: bool,
    pub actions_attempted: usize,
    pub actions_succeeded: usize,
    /// A workflow is successful if at least one action succeeded.
    pub success: bool,
    pub errors: Vec<String>,
}

/// Aggregate result of processing one trigger event.
#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    pub trigger: String,
    pub workflows: Vec<WorkflowRunReport>,
}

impl EventReport {
    /// Workflows whose conditions held and whose actions ran.
    pub fn executed(&self) -> usize {
        self.workflows.iter().filter(|w| w.conditions_met).count()
    }
}

pub struct WorkflowEngine {
    db: DatabaseConnection,
    dispatcher: Arc<Dispatcher>,
    mailer: Arc<dyn Mailer>,
    school_name: String,
}

impl WorkflowEngine {
    pub fn new(
        db: DatabaseConnection,
        dispatcher: Arc<Dispatcher>,
        mailer: Arc<dyn Mailer>,
        school_name: &str,
    ) -> Self {
        Self {
            db,
            dispatcher,
            mailer,
            school_name: school_name.to_string(),
        }
    }

    /// Processes one committed trigger event.
    ///
    /// Only failures to load the workflow list surface as errors; everything
    /// downstream is isolated per workflow and per action and shows up in the
    /// report instead.
    pub async fn handle_event(&self, event: &SessionEvent) -> ServiceResult<EventReport> {
        let context = event.to_context()?;
        let workflows = workflow::Model::find_active_for_trigger(&self.db, event.trigger).await?;

        debug!(
            "Processing {} with {} candidate workflow(s)",
            event.event_type(),
            workflows.len()
        );

        let mut reports = Vec::with_capacity(workflows.len());
        for wf in workflows {
            reports.push(self.run_workflow(&wf, event, &context).await);
        }

        Ok(EventReport {
            trigger: event.event_type(),
            workflows: reports,
        })
    }

    async fn run_workflow(
        &self,
        wf: &workflow::Model,
        event: &SessionEvent,
        context: &serde_json::Value,
    ) -> WorkflowRunReport {
        let mut report = WorkflowRunReport {
            workflow_id: wf.id,
            workflow_name: wf.name.clone(),
            conditions_met: false,
            actions_attempted: 0,
            actions_succeeded: 0,
            success: false,
            errors: Vec::new(),
        };

        let met = match wf.conditions_met(context) {
            Ok(met) => met,
            Err(err) => {
                warn!("Workflow {} has undecodable conditions: {}", wf.id, err);
                report.errors.push(format!("conditions: {err}"));
                return report;
            }
        };
        if !met {
            debug!("Workflow {} conditions not met", wf.id);
            return report;
        }
        report.conditions_met = true;

        let actions = match wf.decode_actions() {
            Ok(actions) => actions,
            Err(err) => {
                warn!("Workflow {} has undecodable actions: {}", wf.id, err);
                report.errors.push(format!("actions: {err}"));
                return report;
            }
        };

        for (index, action) in actions.iter().enumerate() {
            report.actions_attempted += 1;
            match self.run_action(action, event).await {
                Ok(()) => report.actions_succeeded += 1,
                Err(err) => {
                    warn!(
                        "Workflow {} action {} failed: {}",
                        wf.id, index, err
                    );
                    report.errors.push(format!("action {index}: {err}"));
                }
            }
        }
        report.success = report.actions_succeeded > 0;

        if let Err(err) = wf.touch_executed(&self.db).await {
            warn!("Failed to stamp workflow {} execution: {}", wf.id, err);
        }

        info!(
            "Workflow '{}' ran {}/{} action(s) for {}",
            wf.name,
            report.actions_succeeded,
            report.actions_attempted,
            event.event_type()
        );
        report
    }

    async fn run_action(
        &self,
        action: &workflow::WorkflowAction,
        event: &SessionEvent,
    ) -> ServiceResult<()> {
        match action {
            workflow::WorkflowAction::SendNotification => {
                let students = student::Entity::find()
                    .filter(student::Column::ClassId.eq(event.class_id))
                    .filter(student::Column::IsActive.eq(true))
                    .all(&self.db)
                    .await?;
                let ids: Vec<i64> = students.iter().map(|s| s.id).collect();

                let variables = base_variables(event, &self.school_name);
                let summary = self
                    .dispatcher
                    .dispatch_bulk(event.session_id, &ids, event.trigger, &variables)
                    .await?;
                debug!(
                    "send_notification: {} sent, {} failed across {} student(s)",
                    summary.sent,
                    summary.failed,
                    ids.len()
                );
                Ok(())
            }
            workflow::WorkflowAction::LogEvent { note } => {
                let note = note.as_deref().unwrap_or("workflow event");
                notification_log::Model::create_audit(
                    &self.db,
                    event.session_id,
                    event.trigger,
                    note,
                )
                .await?;
                Ok(())
            }
            workflow::WorkflowAction::UpdateSession { patch } => {
                let Some(session) = class_session::Entity::find_by_id(event.session_id)
                    .one(&self.db)
                    .await?
                else {
                    return Err(crate::ServiceError::SessionNotFound(event.session_id));
                };
                let mut active: class_session::ActiveModel = session.into();
                if let Some(subject) = &patch.subject {
                    active.subject = Set(subject.clone());
                }
                if let Some(teacher_name) = &patch.teacher_name {
                    active.teacher_name = Set(teacher_name.clone());
                }
                if let Some(student_count) = patch.student_count {
                    active.student_count = Set(student_count);
                }
                active.updated_at = Set(chrono::Utc::now());
                active.update(&self.db).await?;
                Ok(())
            }
            workflow::WorkflowAction::SendEmail { to, subject, body } => {
                let variables = base_variables(event, &self.school_name);
                let subject = template::render(subject, &variables);
                let body = template::render(body, &variables);
                self.mailer.send(to, &subject, &body).await
            }
        }
    }
}
