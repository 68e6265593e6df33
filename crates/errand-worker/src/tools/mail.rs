//! Mail domain tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde_json::{json, Value};

use errand_core::{catalog, Domain, ToolDescriptor};

use crate::provider::ProviderClient;
use crate::tools::{optional_str, require_str, Tool, ToolError};

/// Build the mail toolset.
pub fn tools(provider: ProviderClient) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(SendMessageTool::new(provider.clone())),
        Arc::new(CreateDraftTool::new(provider)),
    ]
}

fn descriptor(name: &str) -> ToolDescriptor {
    catalog::domain_tools(Domain::Mail)
        .into_iter()
        .find(|d| d.name == name)
        .expect("mail tool missing from catalog")
}

/// Encode an RFC 2822 message the way the provider expects: URL-safe
/// base64 over the raw bytes.
fn encode_raw_message(to: &str, sender: Option<&str>, subject: &str, body: &str) -> String {
    let mut message = String::new();
    message.push_str(&format!("To: {to}\r\n"));
    if let Some(sender) = sender {
        message.push_str(&format!("From: {sender}\r\n"));
    }
    message.push_str(&format!("Subject: {subject}\r\n"));
    message.push_str("Content-Type: text/plain; charset=\"UTF-8\"\r\n");
    message.push_str("\r\n");
    message.push_str(body);
    URL_SAFE.encode(message.as_bytes())
}

/// Send an email on the user's behalf.
pub struct SendMessageTool {
    descriptor: ToolDescriptor,
    provider: ProviderClient,
}

impl SendMessageTool {
    pub fn new(provider: ProviderClient) -> Self {
        Self {
            descriptor: descriptor("mail.send_message"),
            provider,
        }
    }
}

#[async_trait]
impl Tool for SendMessageTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, args: BTreeMap<String, Value>) -> Result<Value, ToolError> {
        let to = require_str(&args, "to")?;
        let subject = require_str(&args, "subject")?;
        let body = require_str(&args, "body")?;
        let sender = optional_str(&args, "sender");

        let raw = encode_raw_message(to, sender, subject, body);
        let sent = self
            .provider
            .post_json("/gmail/v1/users/me/messages/send", &json!({ "raw": raw }))
            .await?;

        Ok(json!({
            "message_id": sent.get("id").cloned().unwrap_or(Value::Null),
            "to": to,
            "subject": subject,
        }))
    }
}

/// Create a draft without sending it.
pub struct CreateDraftTool {
    descriptor: ToolDescriptor,
    provider: ProviderClient,
}

impl CreateDraftTool {
    pub fn new(provider: ProviderClient) -> Self {
        Self {
            descriptor: descriptor("mail.create_draft"),
            provider,
        }
    }
}

#[async_trait]
impl Tool for CreateDraftTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn call(&self, args: BTreeMap<String, Value>) -> Result<Value, ToolError> {
        let to = require_str(&args, "to")?;
        let subject = require_str(&args, "subject")?;
        let body = require_str(&args, "body")?;
        let sender = optional_str(&args, "sender");

        let raw = encode_raw_message(to, sender, subject, body);
        let draft = self
            .provider
            .post_json(
                "/gmail/v1/users/me/drafts",
                &json!({ "message": { "raw": raw } }),
            )
            .await?;

        Ok(json!({
            "draft_id": draft.get("id").cloned().unwrap_or(Value::Null),
            "to": to,
            "subject": subject,
        }))
    }
}
