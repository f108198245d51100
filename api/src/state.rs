//! Application state shared across Axum route handlers.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use services::contacts::ContactDirectory;
use services::dispatcher::{Dispatcher, DispatcherConfig};
use services::gateway::GatewayClient;
use services::mailer::Mailer;
use services::session::SessionService;
use services::template::TemplateService;
use services::webhook::WebhookService;
use services::workflow::WorkflowEngine;

/// Knobs the surrounding application supplies when wiring the core.
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub school_name: String,
    pub default_language: String,
    pub country_code: String,
    pub max_send_retries: u32,
    pub device_id: String,
    pub webhook_token: String,
}

/// Central application state: the database handle plus the notification core
/// with its collaborators injected explicitly.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    sessions: SessionService,
    dispatcher: Arc<Dispatcher>,
    engine: Arc<WorkflowEngine>,
    webhook: WebhookService,
    gateway: Arc<dyn GatewayClient>,
    webhook_token: String,
    device_id: String,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        gateway: Arc<dyn GatewayClient>,
        mailer: Arc<dyn Mailer>,
        options: AppOptions,
    ) -> Self {
        let contacts = ContactDirectory::new(db.clone(), &options.country_code);
        let templates = TemplateService::new(db.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            db.clone(),
            gateway.clone(),
            contacts,
            templates,
            DispatcherConfig {
                school_name: options.school_name.clone(),
                default_language: options.default_language.clone(),
                max_retries: options.max_send_retries,
                device_id: options.device_id.clone(),
            },
        ));
        let engine = Arc::new(WorkflowEngine::new(
            db.clone(),
            dispatcher.clone(),
            mailer,
            &options.school_name,
        ));
        let webhook = WebhookService::new(db.clone(), &options.device_id);

        Self {
            db: db.clone(),
            sessions: SessionService::new(db),
            dispatcher,
            engine,
            webhook,
            gateway,
            webhook_token: options.webhook_token,
            device_id: options.device_id,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn sessions(&self) -> &SessionService {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn webhook(&self) -> &WebhookService {
        &self.webhook
    }

    pub fn gateway(&self) -> &Arc<dyn GatewayClient> {
        &self.gateway
    }

    pub fn webhook_token(&self) -> &str {
        &self.webhook_token
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}
