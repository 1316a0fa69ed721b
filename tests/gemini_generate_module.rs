use smartreply::gemini::{GeminiClient, GeminiError};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

static ENV_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone)]
struct RecordedRequest {
    path: String,
    body: String,
}

struct MockGeminiServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockGeminiServer {
    fn start(expected_requests: usize, status: u16, response_body: String) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let requests_for_thread = Arc::clone(&requests);

        let handle = thread::spawn(move || {
            for _ in 0..expected_requests {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

                let mut request_line = String::new();
                reader
                    .read_line(&mut request_line)
                    .expect("read request line");
                let path = request_line
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();

                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).expect("read header");
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    if line.to_ascii_lowercase().starts_with("content-length:") {
                        content_length = line
                            .split_once(':')
                            .map(|(_, v)| v.trim().parse::<usize>().unwrap_or(0))
                            .unwrap_or(0);
                    }
                }

                let mut body = vec![0_u8; content_length];
                if content_length > 0 {
                    reader.read_exact(&mut body).expect("read body");
                }

                requests_for_thread
                    .lock()
                    .expect("lock requests")
                    .push(RecordedRequest {
                        path,
                        body: String::from_utf8_lossy(&body).to_string(),
                    });

                let response = format!(
                    "HTTP/1.1 {} MOCK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    response_body.len(),
                    response_body
                );
                stream
                    .write_all(response.as_bytes())
                    .expect("write response");
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            handle: Some(handle),
        }
    }

    fn finish(mut self) -> Vec<RecordedRequest> {
        if let Some(handle) = self.handle.take() {
            handle.join().expect("join mock server");
        }
        self.requests.lock().expect("lock requests").clone()
    }
}

fn candidate_envelope(text: &str) -> String {
    serde_json::json!({
        "candidates": [{
            "content": { "parts": [{ "text": text }] },
            "finishReason": "STOP",
        }]
    })
    .to_string()
}

fn set_env(base_url: &str) {
    std::env::set_var("GEMINI_API_KEY", "test-key");
    std::env::set_var("SMARTREPLY_GEMINI_API_BASE", base_url);
}

#[test]
fn single_reply_path_returns_the_free_text_candidate() {
    let _env_guard = ENV_LOCK.lock().expect("env lock");
    let server = MockGeminiServer::start(1, 200, candidate_envelope("On it, thanks!"));
    set_env(&server.base_url);

    let client = GeminiClient::from_env("gemini-2.5-flash").expect("client");
    let replies = client
        .generate_replies("can you pick this up?", "", 1)
        .expect("replies");
    assert_eq!(replies, vec!["On it, thanks!".to_string()]);

    let requests = server.finish();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .path
        .starts_with("/v1beta/models/gemini-2.5-flash:generateContent"));
    assert!(requests[0].path.contains("key=test-key"));
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).expect("request json");
    let instruction = body["systemInstruction"]["parts"][0]["text"]
        .as_str()
        .expect("instruction");
    assert!(instruction.contains("concise and professional"));
    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .expect("prompt");
    assert!(prompt.contains("can you pick this up?"));
    assert!(body.get("generationConfig").is_none());
}

#[test]
fn multi_reply_path_requests_structured_json_and_parses_the_array() {
    let _env_guard = ENV_LOCK.lock().expect("env lock");
    let server = MockGeminiServer::start(
        1,
        200,
        candidate_envelope(r#"{"replies":["a","b","c"]}"#),
    );
    set_env(&server.base_url);

    let client = GeminiClient::from_env("gemini-2.5-flash").expect("client");
    let replies = client
        .generate_replies("status?", "use emojis", 3)
        .expect("replies");
    assert_eq!(
        replies,
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );

    let requests = server.finish();
    let body: serde_json::Value = serde_json::from_str(&requests[0].body).expect("request json");
    assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    assert_eq!(
        body["generationConfig"]["responseSchema"]["required"],
        serde_json::json!(["replies"])
    );
    let instruction = body["systemInstruction"]["parts"][0]["text"]
        .as_str()
        .expect("instruction");
    assert!(instruction.contains("3 different and varied replies"));
    assert!(instruction.contains("use emojis"));
}

#[test]
fn multi_reply_length_is_passed_through_as_is() {
    let _env_guard = ENV_LOCK.lock().expect("env lock");
    let server = MockGeminiServer::start(1, 200, candidate_envelope(r#"{"replies":["only one"]}"#));
    set_env(&server.base_url);

    let client = GeminiClient::from_env("gemini-2.5-flash").expect("client");
    let replies = client.generate_replies("status?", "", 4).expect("replies");
    assert_eq!(replies, vec!["only one".to_string()]);
    server.finish();
}

#[test]
fn malformed_multi_reply_json_is_a_reply_format_error() {
    let _env_guard = ENV_LOCK.lock().expect("env lock");
    let server = MockGeminiServer::start(1, 200, candidate_envelope("sorry, no json here"));
    set_env(&server.base_url);

    let client = GeminiClient::from_env("gemini-2.5-flash").expect("client");
    let err = client
        .generate_replies("status?", "", 2)
        .expect_err("format failure");
    assert!(matches!(err, GeminiError::ReplyFormat(_)));
    server.finish();
}

#[test]
fn missing_replies_field_is_a_reply_format_error() {
    let _env_guard = ENV_LOCK.lock().expect("env lock");
    let server = MockGeminiServer::start(1, 200, candidate_envelope(r#"{"answers":["a","b"]}"#));
    set_env(&server.base_url);

    let client = GeminiClient::from_env("gemini-2.5-flash").expect("client");
    let err = client
        .generate_replies("status?", "", 2)
        .expect_err("format failure");
    assert!(matches!(err, GeminiError::ReplyFormat(_)));
    server.finish();
}

#[test]
fn empty_candidate_list_is_an_empty_response_error() {
    let _env_guard = ENV_LOCK.lock().expect("env lock");
    let server = MockGeminiServer::start(1, 200, r#"{"candidates":[]}"#.to_string());
    set_env(&server.base_url);

    let client = GeminiClient::from_env("gemini-2.5-flash").expect("client");
    let err = client
        .generate_replies("status?", "", 1)
        .expect_err("empty response");
    assert!(matches!(err, GeminiError::EmptyResponse));
    server.finish();
}

#[test]
fn api_status_failure_carries_status_and_message() {
    let _env_guard = ENV_LOCK.lock().expect("env lock");
    let server = MockGeminiServer::start(
        1,
        429,
        r#"{"error":{"message":"quota exhausted"}}"#.to_string(),
    );
    set_env(&server.base_url);

    let client = GeminiClient::from_env("gemini-2.5-flash").expect("client");
    let err = client
        .generate_replies("status?", "", 1)
        .expect_err("api failure");
    match err {
        GeminiError::Api { status, message } => {
            assert_eq!(status, 429);
            assert_eq!(message, "quota exhausted");
        }
        other => panic!("expected api error, got {other:?}"),
    }
    server.finish();
}

#[test]
fn missing_api_key_is_a_configuration_error() {
    let _env_guard = ENV_LOCK.lock().expect("env lock");
    std::env::remove_var("GEMINI_API_KEY");

    let err = GeminiClient::from_env("gemini-2.5-flash").expect_err("missing key");
    assert!(matches!(err, GeminiError::MissingApiKey));
    assert!(err.to_string().contains("GEMINI_API_KEY"));
}

#[test]
fn blank_api_key_counts_as_absent() {
    let _env_guard = ENV_LOCK.lock().expect("env lock");
    std::env::set_var("GEMINI_API_KEY", "   ");

    let err = GeminiClient::from_env("gemini-2.5-flash").expect_err("blank key");
    assert!(matches!(err, GeminiError::MissingApiKey));
}
