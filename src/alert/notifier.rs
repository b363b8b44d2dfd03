use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Capability interface for delivering one composed alert.
///
/// The signature is message-shaped (recipient, subject, body, attachment) so
/// a different transport (SMTP, chat) can slot in without the pipeline
/// noticing. Implementations must not panic on delivery failure.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment: &Path,
    ) -> Result<(), TransportError>;

    /// Name of the transport (for logging).
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to read attachment {0}: {1}")]
    Attachment(String, std::io::Error),
    #[error("webhook request failed: {0}")]
    Request(reqwest::Error),
    #[error("webhook returned status {0}")]
    Status(u16),
}

/// Webhook transport: one multipart POST per alert, with a JSON metadata
/// part and the JPEG snapshot as a file part.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(TransportError::Request)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        attachment: &Path,
    ) -> Result<(), TransportError> {
        let bytes = tokio::fs::read(attachment)
            .await
            .map_err(|e| TransportError::Attachment(attachment.display().to_string(), e))?;

        let metadata = serde_json::json!({
            "recipient": recipient,
            "subject": subject,
            "body": body,
        });

        let file_name = attachment
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("snapshot.jpg")
            .to_string();
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(TransportError::Request)?;
        let form = reqwest::multipart::Form::new()
            .text("metadata", metadata.to_string())
            .part("snapshot", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::Request)?;
        if !response.status().is_success() {
            return Err(TransportError::Status(response.status().as_u16()));
        }

        debug!(recipient, subject, "webhook alert delivered");
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_attachment_fails_before_any_request() {
        let notifier = WebhookNotifier::new("http://localhost:1/hook").unwrap();
        let err = notifier
            .send("ops", "alert", "body", Path::new("/nonexistent/snap.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Attachment(_, _)));
    }
}
