//! Client for the external chat-messaging gateway.
//!
//! This is the only point of contact with the outside provider. Everything
//! else in the core talks to the [`GatewayClient`] trait so tests can swap in
//! a scripted double.

use async_trait::async_trait;
use db::models::connection_status::DeviceState;
use serde::Deserialize;

/// Opaque gateway credentials owned by the surrounding application.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub token: String,
    pub secret: String,
    pub device_id: String,
}

/// Successful send acknowledgment from the gateway.
#[derive(Debug, Clone)]
pub struct GatewaySend {
    /// Provider message id used to reconcile webhook callbacks later.
    pub message_id: String,
    pub raw_response: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub quota_remaining: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway transport failure: {0}")]
    Transport(String),

    #[error("gateway rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),
}

/// The minimal contract with the outside messaging provider.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Sends one message and returns the provider's message id.
    async fn send(&self, destination: &str, body: &str) -> Result<GatewaySend, GatewayError>;

    /// Verifies credentials and returns device details.
    async fn test_connection(&self) -> Result<DeviceInfo, GatewayError>;

    /// Polls the provider for the device's connectivity state.
    async fn check_device_status(&self) -> Result<DeviceState, GatewayError>;
}

/// Interprets a provider status string. The provider reports "online" in a
/// few spellings; anything outside the known vocabulary counts as offline.
pub fn interpret_device_status(status: &str) -> DeviceState {
    match status.to_ascii_lowercase().as_str() {
        "connected" | "online" | "ready" => DeviceState::Connected,
        "connecting" => DeviceState::Connecting,
        "error" => DeviceState::Error,
        _ => DeviceState::Disconnected,
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceStatusResponse {
    status: String,
}

/// HTTP implementation of the gateway contract.
pub struct HttpGatewayClient {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpGatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn send(&self, destination: &str, body: &str) -> Result<GatewaySend, GatewayError> {
        let response = self
            .client
            .post(self.url("/api/v1/messages"))
            .bearer_auth(&self.config.token)
            .header("X-Gateway-Secret", &self.config.secret)
            .json(&serde_json::json!({
                "device_id": self.config.device_id,
                "to": destination,
                "message": body,
            }))
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: SendResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        if !parsed.success {
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body: parsed.error.unwrap_or(text),
            });
        }

        let message_id = parsed.message_id.ok_or_else(|| {
            GatewayError::MalformedResponse("acknowledgment carried no message id".into())
        })?;

        Ok(GatewaySend {
            message_id,
            raw_response: Some(text),
        })
    }

    async fn test_connection(&self) -> Result<DeviceInfo, GatewayError> {
        let response = self
            .client
            .get(self.url("/api/v1/device"))
            .bearer_auth(&self.config.token)
            .header("X-Gateway-Secret", &self.config.secret)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<DeviceInfo>()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))
    }

    async fn check_device_status(&self) -> Result<DeviceState, GatewayError> {
        let response = self
            .client
            .get(self.url("/api/v1/device/status"))
            .bearer_auth(&self.config.token)
            .header("X-Gateway-Secret", &self.config.secret)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: DeviceStatusResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::MalformedResponse(e.to_string()))?;

        Ok(interpret_device_status(&parsed.status))
    }
}
