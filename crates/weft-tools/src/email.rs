use futures::future::BoxFuture;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::debug;

use weft_core::error::{Result, WeftError};

use crate::{parse_input, Tool, ToolOutcome};

/// SMTP configuration carried by the SEND_EMAIL sub-node. The password is
/// encrypted at rest by the store; by the time it reaches here it is plain.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub from_address: String,
    #[serde(default)]
    pub from_name: Option<String>,
}

fn default_port() -> u16 {
    587
}

impl SmtpConfig {
    /// Parse the sub-node's configuration map, naming any missing field.
    pub fn from_node_data(data: &serde_json::Value) -> Result<Self> {
        for field in ["host", "user", "pass", "fromAddress"] {
            if data.get(field).and_then(|v| v.as_str()).is_none() {
                return Err(WeftError::MissingConfig {
                    kind: "SEND_EMAIL".into(),
                    field: field.into(),
                });
            }
        }
        serde_json::from_value(data.clone()).map_err(|e| WeftError::InvalidConfig {
            kind: "SEND_EMAIL".into(),
            message: e.to_string(),
        })
    }

    fn from_mailbox(&self) -> Result<Mailbox> {
        let spec = match &self.from_name {
            Some(name) => format!("{} <{}>", name, self.from_address),
            None => self.from_address.clone(),
        };
        spec.parse().map_err(|_| WeftError::InvalidConfig {
            kind: "SEND_EMAIL".into(),
            message: format!("invalid fromAddress '{}'", self.from_address),
        })
    }
}

/// Email tool: the model supplies to/subject/body; transport settings come
/// from the sub-node.
pub struct SendEmailTool {
    config: SmtpConfig,
}

impl SendEmailTool {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[derive(Deserialize)]
struct SendEmailInput {
    to: String,
    subject: String,
    body: String,
}

impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email via the configured SMTP account."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "to": { "type": "string", "description": "Recipient email address" },
                "subject": { "type": "string" },
                "body": { "type": "string", "description": "Plain-text message body" }
            },
            "required": ["to", "subject", "body"]
        })
    }

    fn execute<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move {
            let params: SendEmailInput = parse_input(self.name(), input)?;

            let to: Mailbox = match params.to.parse() {
                Ok(mailbox) => mailbox,
                Err(_) => {
                    return Ok(ToolOutcome::error(format!(
                        "Error: invalid recipient address '{}'",
                        params.to
                    )))
                }
            };
            let from = self.config.from_mailbox()?;

            let email = Message::builder()
                .from(from)
                .to(to)
                .subject(params.subject.clone())
                .body(params.body)
                .map_err(|e| WeftError::Email(e.to_string()))?;

            let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| WeftError::Email(e.to_string()))?
                .port(self.config.port)
                .credentials(Credentials::new(
                    self.config.user.clone(),
                    self.config.pass.clone(),
                ))
                .build();

            debug!(to = %params.to, subject = %params.subject, "send_email tool call");
            match mailer.send(email).await {
                Ok(_) => Ok(ToolOutcome::success(format!(
                    "Email sent to {}",
                    params.to
                ))),
                Err(e) => Ok(ToolOutcome::error(format!("Error: send failed: {}", e))),
            }
        })
    }
}
