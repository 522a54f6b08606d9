// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use serde_json::{Value, json};
use std::io::Read;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Method, Request, Response, Server};
use url::Url;

const TOKEN_MIN_LEN: usize = 8;
const TOKEN_MAX_LEN: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: Value,
}

/// Local stand-in for the paper controller, bound to an ephemeral port.
pub struct MockController {
    server: Arc<Server>,
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    recognition_status: Arc<AtomicU16>,
    handle: Option<JoinHandle<()>>,
}

impl MockController {
    pub fn start() -> Result<Self> {
        let server = Arc::new(
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock controller: {error}"))?,
        );
        let base_url = format!("http://{}", server.server_addr());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recognition_status = Arc::new(AtomicU16::new(200));

        let handle = {
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            let recognition_status = Arc::clone(&recognition_status);
            let task_counter = AtomicU64::new(0);
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    let status = recognition_status.load(Ordering::SeqCst);
                    handle_request(request, &requests, status, &task_counter);
                }
            })
        };

        Ok(Self {
            server,
            base_url,
            requests,
            recognition_status,
            handle: Some(handle),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Makes start-recognition answer with `status` and an empty body.
    pub fn fail_recognition(&self, status: u16) {
        self.recognition_status.store(status, Ordering::SeqCst);
    }
}

impl Drop for MockController {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_request(
    mut request: Request,
    requests: &Mutex<Vec<RecordedRequest>>,
    recognition_status: u16,
    task_counter: &AtomicU64,
) {
    let mut raw = String::new();
    let body = match request.as_reader().read_to_string(&mut raw) {
        Ok(_) => serde_json::from_str(&raw).unwrap_or(Value::Null),
        Err(_) => Value::Null,
    };
    let method = request.method().clone();
    let path = request.url().to_owned();
    if let Ok(mut log) = requests.lock() {
        log.push(RecordedRequest {
            method: method.to_string(),
            path: path.clone(),
            body: body.clone(),
        });
    }

    let (status, payload) = match (&method, path.as_str()) {
        (Method::Get, "/") => (
            200,
            json!({"status": "online", "service": "paper controller"}),
        ),
        (Method::Post, "/llm_verify") => match profile_shape_error(&body) {
            Some(detail) => (422, json!({"detail": detail})),
            None => {
                let (code, message) = verify_profile_rules(&body);
                (200, json!({"code": code, "message": message}))
            }
        },
        (Method::Post, "/mineru_verify") => match body.get("token").and_then(Value::as_str) {
            Some(token) => {
                let (code, message) = verify_token_rules(token);
                (200, json!({"code": code, "message": message}))
            }
            None => (422, json!({"detail": "token: field required"})),
        },
        (Method::Post, "/start_recognition") if recognition_status != 200 => {
            let response = Response::from_string("").with_status_code(recognition_status);
            let _ = request.respond(response);
            return;
        }
        (Method::Post, "/start_recognition") => {
            let next = task_counter.fetch_add(1, Ordering::SeqCst) + 1;
            (
                200,
                json!({"task_id": format!("recognition_{next}"), "status": "started"}),
            )
        }
        _ => (404, json!({"detail": "Not Found"})),
    };

    let mut response = Response::from_string(payload.to_string()).with_status_code(status);
    if let Ok(header) = Header::from_bytes("Content-Type", "application/json") {
        response = response.with_header(header);
    }
    let _ = request.respond(response);
}

// Requests whose numeric fields are missing or not numbers never reach the
// rules; the controller's request model rejects them first.
fn profile_shape_error(body: &Value) -> Option<String> {
    if !body.is_object() {
        return Some("body: expected an object".to_owned());
    }
    for field in ["apiType", "apiUrl", "apiKey", "model"] {
        if !body.get(field).is_some_and(Value::is_string) {
            return Some(format!("{field}: expected a string"));
        }
    }
    if !body.get("temperature").is_some_and(Value::is_number) {
        return Some("temperature: expected a number".to_owned());
    }
    for field in ["maxTokens", "relatedNumber"] {
        let integral = body
            .get(field)
            .and_then(Value::as_f64)
            .is_some_and(|value| value.fract() == 0.0);
        if !integral {
            return Some(format!("{field}: expected an integer"));
        }
    }
    None
}

/// Checks an LLM profile the way the controller does. Returns `(code, message)`.
pub fn verify_profile_rules(payload: &Value) -> (i64, &'static str) {
    let text = |field: &str| {
        payload
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_owned()
    };
    let api_type = text("apiType");
    let api_url = text("apiUrl");

    if api_type != "full_url" && api_type != "base_url" {
        return (422, "API type must be full_url or base_url");
    }
    if api_url.is_empty() {
        return (400, "API URL must not be empty");
    }
    let candidate = if api_url.contains("://") {
        api_url.clone()
    } else {
        format!("http://{api_url}")
    };
    let Ok(parsed) = Url::parse(&candidate) else {
        return (422, "API URL is malformed");
    };
    if parsed.host_str().is_none_or(str::is_empty) {
        return (422, "API URL is malformed");
    }
    if api_type == "full_url" && !matches!(parsed.scheme(), "http" | "https") {
        return (422, "Full URL must start with http or https");
    }
    if text("apiKey").is_empty() {
        return (400, "API key must not be empty");
    }
    if text("model").is_empty() {
        return (400, "Model name must not be empty");
    }

    let number = |field: &str| payload.get(field).and_then(Value::as_f64);
    match number("temperature") {
        Some(value) if (0.0..=2.0).contains(&value) => {}
        Some(_) => return (422, "Temperature must be within 0-2"),
        None => return (422, "Temperature must be a number"),
    }
    match number("maxTokens") {
        Some(value) if value > 0.0 => {}
        Some(_) => return (422, "Max tokens must be greater than 0"),
        None => return (422, "Max tokens must be an integer"),
    }
    match number("relatedNumber") {
        Some(value) if value > 0.0 => {}
        Some(_) => return (422, "Related number must be greater than 0"),
        None => return (422, "Related number must be an integer"),
    }
    (200, "OK")
}

/// Checks a MinerU token the way the controller does.
pub fn verify_token_rules(token: &str) -> (i64, &'static str) {
    let raw = token.trim();
    if raw.is_empty() {
        return (400, "Token must not be empty");
    }
    let len = raw.chars().count();
    if len < TOKEN_MIN_LEN {
        return (422, "Token is too short");
    }
    if len > TOKEN_MAX_LEN {
        return (422, "Token is too long");
    }
    if raw.chars().any(char::is_whitespace) {
        return (422, "Token must not contain whitespace");
    }
    let allowed = |ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.');
    if !raw.chars().all(allowed) {
        return (422, "Token contains invalid characters");
    }
    (200, "OK")
}

#[cfg(test)]
mod tests {
    use super::{verify_profile_rules, verify_token_rules};
    use serde_json::json;

    fn valid() -> serde_json::Value {
        json!({
            "apiType": "full_url",
            "apiUrl": "https://api.example/v1/chat/completions",
            "apiKey": "sk-1",
            "model": "qwen3",
            "temperature": 0.7,
            "maxTokens": 4096,
            "relatedNumber": 5,
        })
    }

    #[test]
    fn profile_rules_accept_a_complete_profile() {
        assert_eq!(verify_profile_rules(&valid()), (200, "OK"));
    }

    #[test]
    fn profile_rules_report_the_first_failure() {
        let cases = [
            ("apiType", json!("other"), 422),
            ("apiUrl", json!("  "), 400),
            ("apiUrl", json!("ftp://files.example"), 422),
            ("apiKey", json!(""), 400),
            ("model", json!(""), 400),
            ("temperature", json!(2.5), 422),
            ("maxTokens", json!(0), 422),
            ("relatedNumber", json!(-1), 422),
        ];
        for (field, value, code) in cases {
            let mut payload = valid();
            payload[field] = value;
            assert_eq!(verify_profile_rules(&payload).0, code, "{field}");
        }
    }

    #[test]
    fn base_url_profiles_accept_schemeless_hosts() {
        let mut payload = valid();
        payload["apiType"] = json!("base_url");
        payload["apiUrl"] = json!("api.example:8080");
        assert_eq!(verify_profile_rules(&payload).0, 200);
    }

    #[test]
    fn token_rules() {
        assert_eq!(verify_token_rules("   ").0, 400);
        assert_eq!(verify_token_rules("short").0, 422);
        assert_eq!(verify_token_rules(&"a".repeat(257)).0, 422);
        assert_eq!(verify_token_rules("abc def ghi").0, 422);
        assert_eq!(verify_token_rules("tok$abcdefg").0, 422);
        assert_eq!(verify_token_rules(" tok_abc-def.123 ").0, 200);
    }
}
