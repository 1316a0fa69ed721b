use serde_json::{json, Value};

const CONTENT_TYPE: &str = "application/json; charset=UTF-8";

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook url is not configured")]
    MissingUrl,
    #[error("network error or invalid webhook: {0}")]
    Request(String),
    #[error("webhook request failed with status {status}: {message}")]
    Status { status: u16, message: String },
}

/// Posts one reply to the chat webhook. Success is any 2xx response; the
/// webhook body is ignored on success.
pub fn send_text(webhook_url: &str, text: &str) -> Result<(), WebhookError> {
    let url = webhook_url.trim();
    if url.is_empty() {
        return Err(WebhookError::MissingUrl);
    }

    let body = serde_json::to_string(&json!({ "text": text }))
        .map_err(|e| WebhookError::Request(e.to_string()))?;
    match ureq::post(url)
        .set("Content-Type", CONTENT_TYPE)
        .send_string(&body)
    {
        Ok(_) => Ok(()),
        Err(ureq::Error::Status(status, response)) => {
            let raw = response.into_string().unwrap_or_default();
            Err(WebhookError::Status {
                status,
                message: error_message_from_body(&raw),
            })
        }
        Err(other) => Err(WebhookError::Request(other.to_string())),
    }
}

// Failure bodies look like {"error": {"message": "..."}} but nothing
// guarantees that shape.
fn error_message_from_body(raw: &str) -> String {
    serde_json::from_str::<Value>(raw)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown error".to_string())
}
