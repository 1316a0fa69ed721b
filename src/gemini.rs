use serde_json::{json, Value};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";
const API_KEY_ENV: &str = "GEMINI_API_KEY";
const API_BASE_ENV: &str = "SMARTREPLY_GEMINI_API_BASE";

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("missing required env var `GEMINI_API_KEY`")]
    MissingApiKey,
    #[error("gemini api request failed: {0}")]
    Request(String),
    #[error("gemini api responded with status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("gemini returned no reply text")]
    EmptyResponse,
    #[error("gemini reply payload is invalid: {0}")]
    ReplyFormat(String),
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_base: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Reads the credential from `GEMINI_API_KEY`. Blank values count as
    /// absent. `SMARTREPLY_GEMINI_API_BASE` overrides the endpoint base.
    pub fn from_env(model: &str) -> Result<Self, GeminiError> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(GeminiError::MissingApiKey)?;
        let api_base = std::env::var(API_BASE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        Ok(Self {
            api_base,
            api_key,
            model: model.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_base.trim_end_matches('/'),
            self.model,
            urlencoding::encode(&self.api_key)
        )
    }

    /// Returns the generated reply variants in order. The multi-reply path
    /// passes the backend's list through as-is; its length may differ from
    /// `count` and callers must not assume an exact match.
    pub fn generate_replies(
        &self,
        message: &str,
        instructions: &str,
        count: usize,
    ) -> Result<Vec<String>, GeminiError> {
        let body = build_generate_body(message, instructions, count);
        let text = self.call_generate(&body)?;
        if count <= 1 {
            Ok(vec![text])
        } else {
            parse_reply_list(&text)
        }
    }

    fn call_generate(&self, body: &Value) -> Result<String, GeminiError> {
        let response = match ureq::post(&self.endpoint()).send_json(body) {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let raw = response.into_string().unwrap_or_default();
                return Err(GeminiError::Api {
                    status,
                    message: api_error_message(&raw),
                });
            }
            Err(other) => return Err(GeminiError::Request(other.to_string())),
        };
        let payload: Value = response
            .into_json()
            .map_err(|e| GeminiError::Request(e.to_string()))?;
        candidate_text(&payload).ok_or(GeminiError::EmptyResponse)
    }
}

pub fn build_generate_body(message: &str, instructions: &str, count: usize) -> Value {
    let prompt = format!("Here is the message to reply to:\n\n\"\"\"\n{message}\n\"\"\"");
    let mut body = json!({
        "systemInstruction": { "parts": [{ "text": system_instruction(instructions, count) }] },
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
    });
    if count > 1 {
        body["generationConfig"] = json!({
            "responseMimeType": "application/json",
            "responseSchema": reply_list_schema(count),
        });
    }
    body
}

fn system_instruction(instructions: &str, count: usize) -> String {
    let instructions = instructions.trim();
    if count <= 1 {
        return if instructions.is_empty() {
            "You are a helpful assistant in a group chat. \
             Your task is to write a concise and professional reply."
                .to_string()
        } else {
            format!(
                "You are a helpful assistant in a group chat. \
                 Your task is to write a reply. \
                 Follow these instructions for the reply: {instructions}"
            )
        };
    }

    let style_line = if instructions.is_empty() {
        "The replies should be concise and professional.".to_string()
    } else {
        format!("Follow these general instructions for all replies: {instructions}")
    };
    format!(
        "You are a helpful assistant in a group chat. \
         Your task is to write {count} different and varied replies to a message.\n\
         {style_line}\n\
         Return the replies as a JSON object with a single key \"replies\" \
         which is an array of strings. Each string in the array is a distinct reply."
    )
}

fn reply_list_schema(count: usize) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "replies": {
                "type": "ARRAY",
                "items": {
                    "type": "STRING",
                    "description": "A single, distinct reply text.",
                },
                "description": format!("An array of exactly {count} different reply strings."),
            },
        },
        "required": ["replies"],
    })
}

fn api_error_message(raw: &str) -> String {
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

// Candidate text lives at candidates[0].content.parts[*].text; parts are
// concatenated because the backend may split one reply across parts.
fn candidate_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let mut lines = Vec::new();
    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                lines.push(trimmed.to_string());
            }
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

pub fn parse_reply_list(raw: &str) -> Result<Vec<String>, GeminiError> {
    let value: Value = serde_json::from_str(raw.trim())
        .map_err(|e| GeminiError::ReplyFormat(format!("invalid json: {e}")))?;
    let replies = value
        .get("replies")
        .and_then(Value::as_array)
        .ok_or_else(|| GeminiError::ReplyFormat("missing `replies` array".to_string()))?;
    let mut out = Vec::with_capacity(replies.len());
    for entry in replies {
        let text = entry
            .as_str()
            .ok_or_else(|| GeminiError::ReplyFormat("`replies` entries must be strings".to_string()))?;
        out.push(text.to_string());
    }
    Ok(out)
}
