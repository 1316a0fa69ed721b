use crate::config::{Settings, StatePaths, MAX_REPLY_COUNT, MIN_REPLY_COUNT};
use crate::gemini::GeminiClient;
use crate::shared::logging;
use crate::webhook;
use std::thread;
use std::time::Duration;

pub const EMPTY_FIELDS_MESSAGE: &str = "Webhook URL and message cannot be empty.";
pub const NO_REPLIES_MESSAGE: &str = "Gemini returned no replies.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl SubmitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmitStatus::Idle => "idle",
            SubmitStatus::Loading => "loading",
            SubmitStatus::Success => "success",
            SubmitStatus::Error => "error",
        }
    }
}

/// Everything the form surface owns. Mutated only by field edits and the
/// submit flow; nothing here outlives a submit cycle except the field values
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub webhook_url: String,
    pub message: String,
    pub instructions: String,
    pub reply_count: u8,
    pub status: SubmitStatus,
    pub status_message: String,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            message: String::new(),
            instructions: String::new(),
            reply_count: MIN_REPLY_COUNT,
            status: SubmitStatus::Idle,
            status_message: String::new(),
        }
    }
}

impl FormState {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            webhook_url: settings.default_webhook_url.clone().unwrap_or_default(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubmitContext {
    pub settings: Settings,
    pub state_paths: StatePaths,
}

/// Non-numeric input coerces to the minimum; numeric input clamps to the
/// allowed range.
pub fn clamp_reply_count(raw: &str) -> u8 {
    match raw.trim().parse::<i64>() {
        Ok(value) => value.clamp(i64::from(MIN_REPLY_COUNT), i64::from(MAX_REPLY_COUNT)) as u8,
        Err(_) => MIN_REPLY_COUNT,
    }
}

pub fn reply_noun(count: usize) -> &'static str {
    if count == 1 {
        "reply"
    } else {
        "replies"
    }
}

/// Runs one submit cycle: validate, generate, then relay each reply in order
/// with a pacing sleep between non-last sends. `progress` is invoked on
/// every status change so the surface can redraw mid-flow. Re-entry while
/// Loading is a no-op.
pub fn run_submit<F>(state: &mut FormState, context: &SubmitContext, mut progress: F)
where
    F: FnMut(&FormState),
{
    if state.status == SubmitStatus::Loading {
        return;
    }
    if state.webhook_url.trim().is_empty() || state.message.trim().is_empty() {
        state.status = SubmitStatus::Error;
        state.status_message = EMPTY_FIELDS_MESSAGE.to_string();
        progress(state);
        return;
    }

    let count = usize::from(state.reply_count.clamp(MIN_REPLY_COUNT, MAX_REPLY_COUNT));
    state.status = SubmitStatus::Loading;
    state.status_message = format!("Generating {count} {} with Gemini...", reply_noun(count));
    progress(state);

    match submit_cycle(state, context, count, &mut progress) {
        Ok(sent) => {
            state.status = SubmitStatus::Success;
            state.status_message = format!("Successfully sent {sent} {}!", reply_noun(sent));
            state.message.clear();
        }
        Err(message) => {
            state.status = SubmitStatus::Error;
            state.status_message = message;
        }
    }
    log_submit_line(context, state);
    progress(state);
}

fn submit_cycle<F>(
    state: &mut FormState,
    context: &SubmitContext,
    count: usize,
    progress: &mut F,
) -> Result<usize, String>
where
    F: FnMut(&FormState),
{
    let client = GeminiClient::from_env(&context.settings.model).map_err(|e| e.to_string())?;
    let replies = client
        .generate_replies(&state.message, &state.instructions, count)
        .map_err(|e| e.to_string())?;
    if replies.is_empty() {
        return Err(NO_REPLIES_MESSAGE.to_string());
    }

    // The backend may not honor the requested count; every total below comes
    // from the returned list.
    let total = replies.len();
    for (index, reply) in replies.iter().enumerate() {
        state.status_message = format!(
            "Sending reply {} of {total} to the chat webhook...",
            index + 1
        );
        progress(state);
        webhook::send_text(&state.webhook_url, reply).map_err(|e| e.to_string())?;
        if index + 1 < total {
            thread::sleep(Duration::from_millis(context.settings.pacing_delay_ms));
        }
    }
    Ok(total)
}

// One line per completed cycle; a failed write never fails the submit.
fn log_submit_line(context: &SubmitContext, state: &FormState) {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let line = format!(
        "{timestamp} submit status={} message={}",
        state.status.as_str(),
        state.status_message
    );
    let _ = logging::append_app_log_line(&context.state_paths, &line);
}
