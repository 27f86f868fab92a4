//! A stateful fake helpdesk server for driving `hd` as a subprocess.

#![allow(dead_code)]

use assert_cmd::Command;
use serde_json::{Value, json};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

pub const TICKET: &str = "SRIA1";

#[derive(Debug, Clone)]
pub struct Seen {
    pub method: String,
    pub url: String,
    pub body: String,
}

#[derive(Debug)]
pub struct DeskState {
    pub status: String,
    pub assignee: String,
    pub impact: String,
    pub priority: String,
    pub reports: Vec<Value>,
    pub fail_reports: bool,
}

pub struct MockDesk {
    pub base: String,
    pub state: Arc<Mutex<DeskState>>,
    seen: Arc<Mutex<Vec<Seen>>>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

fn ticket_json(state: &DeskState) -> Value {
    json!({
        "ticket_id": TICKET,
        "summary": "Laptop will not boot",
        "description": "<p>Black screen after update</p>",
        "status": state.status,
        "assignee": state.assignee,
        "priority": state.priority,
        "impact": state.impact,
        "support_team": "a",
        "created_by": "requester",
        "created_at": "2024-05-01T09:00:00Z"
    })
}

fn choices_json() -> Value {
    json!({
        "status_choices": [["open", "Open"], ["Working in Progress", "Working in Progress"]],
        "impact_choices": [["A", "High"], ["B", "Medium"], ["C", "Low"]],
        "priority_choices": [
            {"priority_id": 1, "urgency_name": "P1"},
            {"priority_id": 2, "urgency_name": "P2"}
        ],
        "support_team_choices": [["a", "FirstLevel"]]
    })
}

fn resolution_choices_json() -> Value {
    json!({
        "resolution_type_choices": [["fixed", "Fixed"]],
        "incident_based_on_choices": [["user", "User"]],
        "incident_category_choices": [["hardware", "Hardware"]]
    })
}

fn respond_to(state: &Mutex<DeskState>, method: &str, url: &str, body: &str) -> (u16, Value) {
    let mut state = state.lock().unwrap();
    let ticket_path = format!("/ticket/tickets/{TICKET}/");
    match (method, url) {
        ("GET", u) if u == ticket_path => (200, ticket_json(&state)),
        ("PUT", u) if u == ticket_path => {
            let update: Value = serde_json::from_str(body).unwrap_or(Value::Null);
            if let Some(status) = update["status"].as_str() {
                state.status = status.to_string();
            }
            if let Some(assignee) = update["assignee"].as_str() {
                state.assignee = assignee.to_string();
            }
            (200, ticket_json(&state))
        }
        ("GET", "/ticket/ticket/choices/") => (200, choices_json()),
        ("GET", u) if u.starts_with("/ticket/attachments/") => (
            200,
            json!([{"id": 5, "file_url": "http://files/media/boot.log", "ticket": TICKET}]),
        ),
        ("GET", u) if u.starts_with("/ticket/reports/") => (200, Value::Array(state.reports.clone())),
        ("POST", "/ticket/reports/") => {
            if state.fail_reports {
                return (500, json!({"detail": "storage unavailable"}));
            }
            let title = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v["title"].as_str().map(str::to_string))
                .unwrap_or_else(|| "Attachment".to_string());
            let report = json!({
                "report_id": state.reports.len() + 100,
                "title": title,
                "username": "alice",
                "created_at": "2024-05-02T10:00:00Z"
            });
            state.reports.push(report.clone());
            (201, report)
        }
        ("POST", "/ticket/ticket-comments/") => (201, json!({})),
        ("GET", "/resolution/resolution-choices/") => (200, resolution_choices_json()),
        ("POST", "/resolution/resolutions/") => {
            let mut record: Value = serde_json::from_str(body).unwrap_or_else(|_| json!({}));
            record["resolution_id"] = json!(1);
            (201, record)
        }
        ("GET", "/details/personal_details/7/") => (
            200,
            json!([{"id": 7, "username": "alice", "first_name": "Alice", "email": "alice@example.com"}]),
        ),
        _ => (404, json!({"detail": "Not found."})),
    }
}

impl MockDesk {
    pub fn start(status: &str, assignee: &str) -> Self {
        let server = Server::http("127.0.0.1:0").expect("http server");
        let base = format!("http://{}/", server.server_addr());
        let state = Arc::new(Mutex::new(DeskState {
            status: status.to_string(),
            assignee: assignee.to_string(),
            impact: "Medium".to_string(),
            priority: "P2".to_string(),
            reports: vec![json!({
                "report_id": 1,
                "title": "<p>It will not start</p>",
                "username": "requester",
                "created_at": "2024-05-01T09:05:00Z"
            })],
            fail_reports: false,
        }));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let (state_clone, seen_clone, stop_clone) =
            (Arc::clone(&state), Arc::clone(&seen), Arc::clone(&stop));
        let handle = thread::spawn(move || {
            loop {
                let mut req = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) if stop_clone.load(Ordering::SeqCst) => break,
                    Ok(None) => continue,
                    Err(_) => break,
                };
                let mut raw = Vec::new();
                let _ = req.as_reader().read_to_end(&mut raw);
                let body = String::from_utf8_lossy(&raw).into_owned();
                let method = req.method().to_string();
                let url = req.url().to_string();
                let (status, payload) = respond_to(&state_clone, &method, &url, &body);
                seen_clone.lock().unwrap().push(Seen { method, url, body });

                let response = Response::from_string(payload.to_string())
                    .with_status_code(status)
                    .with_header(
                        Header::from_bytes("Content-Type", &b"application/json"[..])
                            .expect("header"),
                    );
                let _ = req.respond(response);
            }
        });

        Self {
            base,
            state,
            seen,
            stop,
            handle: Some(handle),
        }
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn requests(&self, method: &str, url: &str) -> Vec<Seen> {
        self.seen()
            .into_iter()
            .filter(|s| s.method == method && s.url == url)
            .collect()
    }

    pub fn status(&self) -> String {
        self.state.lock().unwrap().status.clone()
    }

    pub fn fail_reports(&self) {
        self.state.lock().unwrap().fail_reports = true;
    }
}

impl Drop for MockDesk {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// `hd` isolated from the user's config and environment.
pub fn hd(config_dir: &Path, api_url: &str) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hd"));
    cmd.env("HELPDESK_CONFIG_DIR", config_dir);
    cmd.env("HELPDESK_API_URL", api_url);
    cmd.env("HELPDESK_TOKEN", "test-token");
    cmd.env("HELPDESK_LOG", "error");
    cmd.env_remove("HELPDESK_USER");
    cmd.env_remove("HELPDESK_TIMEOUT_SECS");
    cmd.env_remove("HELPDESK_TIMING");
    cmd.env_remove("FORMAT");
    cmd.env_remove("RUST_BACKTRACE");
    cmd.env_remove("RUST_LIB_BACKTRACE");
    cmd
}

/// First JSON value on stderr, ignoring anything printed after it.
pub fn stderr_json(stderr: &[u8]) -> Value {
    let text = String::from_utf8_lossy(stderr);
    let start = text.find('{').expect("json error on stderr");
    serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()
        .expect("json value on stderr")
        .expect("well-formed json on stderr")
}

/// Run `hd` and parse its stdout as JSON.
pub fn hd_json(cmd: &mut Command) -> (bool, Value, String) {
    let output = cmd.output().expect("hd should not crash");
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let json = serde_json::from_slice(&output.stdout).unwrap_or(Value::Null);
    (output.status.success(), json, stderr)
}
