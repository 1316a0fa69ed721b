use crate::app::{self, FormState, SubmitContext, SubmitStatus};
use crate::config::{bootstrap_state_root, default_state_root_path, load_settings, StatePaths};
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Padding, Paragraph, Row, Table};
use ratatui::{Frame, Terminal};
use std::io::{self, IsTerminal};
use std::time::Duration;

const SCRIPT_KEYS_ENV: &str = "SMARTREPLY_FORM_SCRIPT_KEYS";

const FIELD_VALUE_PREVIEW_CHARS: usize = 60;
const MASK_DISPLAY_CAP: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    WebhookUrl,
    ReplyCount,
    Instructions,
    Message,
}

pub const ALL_FORM_FIELDS: [FormField; 4] = [
    FormField::WebhookUrl,
    FormField::ReplyCount,
    FormField::Instructions,
    FormField::Message,
];

impl FormField {
    pub fn label(self) -> &'static str {
        match self {
            FormField::WebhookUrl => "Webhook URL",
            FormField::ReplyCount => "Number of Replies (1-5)",
            FormField::Instructions => "Reply Instructions (optional)",
            FormField::Message => "Message to Reply To",
        }
    }

    pub fn is_masked(self) -> bool {
        self == FormField::WebhookUrl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FormAction {
    MovePrev,
    MoveNext,
    Edit,
    Submit,
    Quit,
}

fn form_action_from_key(key: crossterm::event::KeyEvent) -> Option<FormAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(FormAction::Quit);
    }
    match key.code {
        KeyCode::Up => Some(FormAction::MovePrev),
        KeyCode::Down => Some(FormAction::MoveNext),
        KeyCode::Enter | KeyCode::Char('\n') | KeyCode::Char('\r') | KeyCode::Char('e') => {
            Some(FormAction::Edit)
        }
        KeyCode::Char('s') => Some(FormAction::Submit),
        KeyCode::Esc | KeyCode::Char('q') => Some(FormAction::Quit),
        _ => None,
    }
}

pub fn apply_field_edit(state: &mut FormState, field: FormField, raw: &str) {
    match field {
        FormField::WebhookUrl => state.webhook_url = raw.trim().to_string(),
        FormField::ReplyCount => state.reply_count = app::clamp_reply_count(raw),
        FormField::Instructions => state.instructions = raw.to_string(),
        FormField::Message => state.message = raw.to_string(),
    }
}

pub fn field_value_for_edit(state: &FormState, field: FormField) -> String {
    match field {
        FormField::WebhookUrl => state.webhook_url.clone(),
        FormField::ReplyCount => state.reply_count.to_string(),
        FormField::Instructions => state.instructions.clone(),
        FormField::Message => state.message.clone(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormFieldRow {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormViewModel {
    pub rows: Vec<FormFieldRow>,
    pub selected: usize,
    pub status_kind: SubmitStatus,
    pub status_text: String,
    pub hint_text: String,
    pub submit_enabled: bool,
}

pub fn project_form_view_model(state: &FormState, selected: usize) -> FormViewModel {
    let rows = ALL_FORM_FIELDS
        .iter()
        .map(|field| FormFieldRow {
            label: field.label().to_string(),
            value: field_display_value(state, *field),
        })
        .collect::<Vec<_>>();
    let submit_enabled = state.status != SubmitStatus::Loading;
    let count = usize::from(state.reply_count);
    let hint_text = if submit_enabled {
        format!(
            "Up/Down move | Enter edit | s generate & send {count} {} | q quit",
            app::reply_noun(count)
        )
    } else {
        "Sending in progress...".to_string()
    };
    FormViewModel {
        rows,
        selected: selected.min(ALL_FORM_FIELDS.len() - 1),
        status_kind: state.status,
        status_text: state.status_message.clone(),
        hint_text,
        submit_enabled,
    }
}

fn field_display_value(state: &FormState, field: FormField) -> String {
    match field {
        FormField::WebhookUrl => mask_for_display(&state.webhook_url),
        FormField::ReplyCount => state.reply_count.to_string(),
        FormField::Instructions => {
            if state.instructions.trim().is_empty() {
                "<none>".to_string()
            } else {
                single_line_preview(&state.instructions, FIELD_VALUE_PREVIEW_CHARS)
            }
        }
        FormField::Message => single_line_preview(&state.message, FIELD_VALUE_PREVIEW_CHARS),
    }
}

/// The webhook URL embeds a secret token, so the form never renders it.
pub fn mask_for_display(value: &str) -> String {
    "•".repeat(value.chars().count().min(MASK_DISPLAY_CAP))
}

pub fn single_line_preview(value: &str, max_chars: usize) -> String {
    let flat: String = value
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .collect();
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars).collect();
    out.push('…');
    out
}

pub fn tail_for_display(value: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= max_chars {
        return value.to_string();
    }
    chars[chars.len() - max_chars..].iter().collect()
}

fn status_color(status: SubmitStatus) -> Color {
    match status {
        SubmitStatus::Idle => Color::DarkGray,
        SubmitStatus::Loading => Color::Yellow,
        SubmitStatus::Success => Color::Green,
        SubmitStatus::Error => Color::Red,
    }
}

pub fn cmd_form() -> Result<String, String> {
    let root = default_state_root_path().map_err(|e| e.to_string())?;
    let paths = StatePaths::new(root);
    bootstrap_state_root(&paths).map_err(|e| e.to_string())?;
    let settings = load_settings(&paths).map_err(|e| e.to_string())?;
    let mut state = FormState::from_settings(&settings);
    let context = SubmitContext {
        settings,
        state_paths: paths,
    };

    if let Some(scripted_keys) = load_scripted_form_keys()? {
        run_form_scripted(&mut state, &context, scripted_keys)?;
    } else if is_interactive_form() {
        run_form_tui(&mut state, &context)?;
    } else {
        return Err("the smartreply form requires an interactive terminal".to_string());
    }

    Ok(format!(
        "form closed\nlast_status={}\nlast_status_message={}",
        state.status.as_str(),
        state.status_message
    ))
}

fn is_interactive_form() -> bool {
    io::stdin().is_terminal() && io::stdout().is_terminal()
}

fn load_scripted_form_keys() -> Result<Option<Vec<crossterm::event::KeyEvent>>, String> {
    let Ok(raw) = std::env::var(SCRIPT_KEYS_ENV) else {
        return Ok(None);
    };
    let mut keys = Vec::new();
    for token in raw.split(',') {
        let normalized = token.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            continue;
        }
        let key = match normalized.as_str() {
            "up" => crossterm::event::KeyEvent::new(KeyCode::Up, KeyModifiers::NONE),
            "down" => crossterm::event::KeyEvent::new(KeyCode::Down, KeyModifiers::NONE),
            "enter" => crossterm::event::KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE),
            "esc" => crossterm::event::KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE),
            "ctrl-c" => crossterm::event::KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            "e" => crossterm::event::KeyEvent::new(KeyCode::Char('e'), KeyModifiers::NONE),
            "s" => crossterm::event::KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE),
            "q" => crossterm::event::KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE),
            other => {
                return Err(format!(
                    "invalid {SCRIPT_KEYS_ENV} token `{other}`; valid tokens: up,down,enter,esc,ctrl-c,e,s,q"
                ));
            }
        };
        keys.push(key);
    }
    Ok(Some(keys))
}

pub(crate) fn run_form_scripted(
    state: &mut FormState,
    context: &SubmitContext,
    scripted_keys: Vec<crossterm::event::KeyEvent>,
) -> Result<(), String> {
    let mut selected = 0usize;
    for key in scripted_keys {
        let Some(action) = form_action_from_key(key) else {
            continue;
        };
        match action {
            FormAction::MovePrev => selected = selected.saturating_sub(1),
            FormAction::MoveNext => {
                selected = (selected + 1).min(ALL_FORM_FIELDS.len() - 1);
            }
            FormAction::Edit => {
                return Err(
                    "scripted form input does not support field edit prompts".to_string()
                );
            }
            FormAction::Submit => {
                app::run_submit(state, context, |_| {});
            }
            FormAction::Quit => return Ok(()),
        }
    }
    Err("scripted form input did not terminate; include a quit key".to_string())
}

fn run_form_tui(state: &mut FormState, context: &SubmitContext) -> Result<(), String> {
    let mut stdout = io::stdout();
    enable_raw_mode().map_err(|e| format!("failed to enable raw mode: {e}"))?;
    execute!(stdout, EnterAlternateScreen, Hide)
        .map_err(|e| format!("failed to enter form screen: {e}"))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal =
        Terminal::new(backend).map_err(|e| format!("failed to create form terminal: {e}"))?;
    let result = run_form_tui_loop(state, context, &mut terminal);
    disable_raw_mode().map_err(|e| format!("failed to disable raw mode: {e}"))?;
    execute!(terminal.backend_mut(), Show, LeaveAlternateScreen)
        .map_err(|e| format!("failed to leave form screen: {e}"))?;
    result
}

fn run_form_tui_loop(
    state: &mut FormState,
    context: &SubmitContext,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), String> {
    let mut selected = 0usize;
    loop {
        draw_form(terminal, state, selected)?;
        if !event::poll(Duration::from_millis(250))
            .map_err(|e| format!("failed to poll form input: {e}"))?
        {
            continue;
        }
        let ev = event::read().map_err(|e| format!("failed to read form input: {e}"))?;
        let Event::Key(key) = ev else {
            continue;
        };
        let Some(action) = form_action_from_key(key) else {
            continue;
        };
        match action {
            FormAction::MovePrev => selected = selected.saturating_sub(1),
            FormAction::MoveNext => {
                selected = (selected + 1).min(ALL_FORM_FIELDS.len() - 1);
            }
            FormAction::Edit => {
                let field = ALL_FORM_FIELDS[selected];
                let initial = field_value_for_edit(state, field);
                if let Some(value) = prompt_field_tui(terminal, field, &initial)? {
                    apply_field_edit(state, field, &value);
                }
            }
            FormAction::Submit => {
                app::run_submit(state, context, |snapshot| {
                    let _ = draw_form(terminal, snapshot, selected);
                });
            }
            FormAction::Quit => return Ok(()),
        }
    }
}

fn draw_form(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &FormState,
    selected: usize,
) -> Result<(), String> {
    let view_model = project_form_view_model(state, selected);
    terminal
        .draw(|frame| draw_form_ui(frame, &view_model))
        .map_err(|e| format!("failed to render form: {e}"))?;
    Ok(())
}

fn draw_form_ui(frame: &mut Frame<'_>, view_model: &FormViewModel) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let header = Paragraph::new(vec![
        Line::from(Span::styled(
            "SmartReply",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from("Paste a chat message; Gemini writes the replies and relays them to your webhook."),
    ])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, chunks[0]);

    let table_rows = view_model.rows.iter().enumerate().map(|(idx, row)| {
        let style = if idx == view_model.selected {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(row.label.clone()),
            Cell::from(row.value.clone()),
        ])
        .style(style)
    });
    let table = Table::new(
        table_rows,
        [Constraint::Percentage(35), Constraint::Percentage(65)],
    )
    .column_spacing(2)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .padding(Padding::new(1, 1, 0, 0)),
    );
    frame.render_widget(table, chunks[1]);

    let footer = Paragraph::new(vec![
        Line::from(view_model.hint_text.clone()),
        Line::from(Span::styled(
            format!("Status: {}", view_model.status_text),
            Style::default().fg(status_color(view_model.status_kind)),
        )),
    ])
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, chunks[2]);
}

fn prompt_field_tui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    field: FormField,
    initial: &str,
) -> Result<Option<String>, String> {
    let mut value = initial.to_string();
    loop {
        terminal
            .draw(|frame| {
                let area = centered_rect(70, 30, frame.area());
                let block = Block::default()
                    .borders(Borders::ALL)
                    .padding(Padding::new(2, 2, 1, 1));
                frame.render_widget(block.clone(), area);
                let inner = block.inner(area);
                let rows = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(1),
                        Constraint::Length(1),
                        Constraint::Length(1),
                        Constraint::Length(1),
                        Constraint::Min(1),
                    ])
                    .split(inner);
                let max_input_width = rows[2].width.saturating_sub(2) as usize;
                let display_value = if field.is_masked() {
                    mask_for_display(&tail_for_display(&value, max_input_width))
                } else {
                    tail_for_display(&value, max_input_width)
                };

                frame.render_widget(
                    Paragraph::new(Line::from(Span::styled(
                        field.label(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))),
                    rows[0],
                );
                frame.render_widget(
                    Paragraph::new(Line::from(format!("> {display_value}"))),
                    rows[2],
                );
                frame.render_widget(Paragraph::new("Enter apply, Esc cancel"), rows[3]);
                frame.set_cursor_position((
                    rows[2].x + 2 + display_value.chars().count() as u16,
                    rows[2].y,
                ));
            })
            .map_err(|e| format!("failed to render field prompt: {e}"))?;
        let ev = event::read().map_err(|e| format!("failed to read field input: {e}"))?;
        let Event::Key(key) = ev else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match key.code {
            KeyCode::Esc => return Ok(None),
            KeyCode::Enter | KeyCode::Char('\n') | KeyCode::Char('\r') => return Ok(Some(value)),
            KeyCode::Backspace => {
                value.pop();
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => value.push(ch),
            _ => {}
        }
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
