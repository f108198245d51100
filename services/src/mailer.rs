//! SMTP mail delivery for the workflow engine's `send_email` action.

use async_trait::async_trait;
use lettre::{
    message::{header, Message},
    transport::smtp::{authentication::Credentials, AsyncSmtpTransport},
    AsyncTransport, Tokio1Executor,
};
use tracing::warn;

use crate::error::{ServiceError, ServiceResult};

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ServiceResult<()>;
}

/// SMTP-backed mailer.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        username: &str,
        password: &str,
        from_name: &str,
    ) -> ServiceResult<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| ServiceError::Mail(format!("Failed to create SMTP transport: {e}")))?
            .credentials(Credentials::new(username.to_owned(), password.to_owned()))
            .build();

        Ok(Self {
            transport,
            from: format!("{} <{}>", from_name, username),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ServiceResult<()> {
        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| ServiceError::Mail(format!("Invalid sender address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| ServiceError::Mail(format!("Invalid recipient address: {e}")))?)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN)
            .body(body.to_owned())
            .map_err(|e| ServiceError::Mail(format!("Failed to build email: {e}")))?;

        if let Err(e) = self.transport.send(email).await {
            warn!("SMTP send to {} failed: {}", to, e);
            return Err(ServiceError::Mail(e.to_string()));
        }

        Ok(())
    }
}
