//! Deterministic doubles for the external collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use db::models::connection_status::DeviceState;

use crate::error::{ServiceError, ServiceResult};
use crate::gateway::{DeviceInfo, GatewayClient, GatewayError, GatewaySend};
use crate::mailer::Mailer;

/// Scripted gateway double. With no scripted outcomes it acknowledges every
/// send with a fresh `mock-N` message id.
pub struct MockGateway {
    scripted: Mutex<VecDeque<Result<GatewaySend, GatewayError>>>,
    sent: Mutex<Vec<(String, String)>>,
    counter: AtomicU64,
    device_state: Mutex<DeviceState>,
    always_fail: Option<String>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
            device_state: Mutex::new(DeviceState::Connected),
            always_fail: None,
        }
    }

    /// A gateway whose every non-scripted send fails with a transport error.
    pub fn failing(reason: &str) -> Self {
        Self {
            always_fail: Some(reason.to_string()),
            ..Self::new()
        }
    }

    /// Queues one outcome for the next send.
    pub fn script(&self, outcome: Result<GatewaySend, GatewayError>) {
        self.scripted.lock().unwrap().push_back(outcome);
    }

    pub fn set_device_state(&self, state: DeviceState) {
        *self.device_state.lock().unwrap() = state;
    }

    /// Every (destination, body) pair handed to `send`, in order.
    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl GatewayClient for MockGateway {
    async fn send(&self, destination: &str, body: &str) -> Result<GatewaySend, GatewayError> {
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), body.to_string()));

        if let Some(outcome) = self.scripted.lock().unwrap().pop_front() {
            return outcome;
        }
        if let Some(reason) = &self.always_fail {
            return Err(GatewayError::Transport(reason.clone()));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(GatewaySend {
            message_id: format!("mock-{n}"),
            raw_response: None,
        })
    }

    async fn test_connection(&self) -> Result<DeviceInfo, GatewayError> {
        Ok(DeviceInfo {
            device_id: "mock-device".into(),
            name: Some("Mock".into()),
            quota_remaining: Some(1000),
        })
    }

    async fn check_device_status(&self) -> Result<DeviceState, GatewayError> {
        Ok(*self.device_state.lock().unwrap())
    }
}

/// Mailer double recording every message instead of sending it.
#[derive(Default)]
pub struct StubMailer {
    sent: Mutex<Vec<(String, String, String)>>,
    fail: bool,
}

impl StubMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent_mail(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for StubMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ServiceResult<()> {
        if self.fail {
            return Err(ServiceError::Mail("stub mailer configured to fail".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}
