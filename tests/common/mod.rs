#![allow(dead_code)]

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use dmarcwatch::analysis::{Analyzer, Judgement};
use dmarcwatch::error::AnalysisError;
use dmarcwatch::pipeline::{MemorySink, Pipeline};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feedback>
  <report_metadata>
    <org_name>google.com</org_name>
    <report_id>1234567890</report_id>
  </report_metadata>
  <policy_published><domain>example.com</domain><p>none</p></policy_published>
  <record>
    <row>
      <source_ip>192.0.2.10</source_ip>
      <count>3</count>
      <policy_evaluated><disposition>none</disposition><dkim>pass</dkim><spf>pass</spf></policy_evaluated>
    </row>
  </record>
</feedback>
"#;

pub const CORRUPT: &str = "<feedback><record><row></feedback>";

/// Isolated inbox plus a config file location, all under one temp dir.
pub struct TestEnv {
    _tmp: TempDir,
    pub home: PathBuf,
    pub inbox: PathBuf,
    pub config: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let home = tmp.path().join("home");
        let inbox = tmp.path().join("inbox");
        fs::create_dir_all(&home).expect("create isolated home");
        fs::create_dir_all(&inbox).expect("create inbox");
        // The watcher compares event paths against this, so resolve symlinks
        // such as a /tmp alias up front.
        let inbox = inbox.canonicalize().expect("canonical inbox");
        let config = home.join("config.json");

        Self {
            _tmp: tmp,
            home,
            inbox,
            config,
        }
    }

    pub fn write_report(&self, name: &str, content: &str) -> PathBuf {
        let path = self.inbox.join(name);
        fs::write(&path, content).expect("write report");
        path
    }

    pub fn write_gz_report(&self, name: &str, content: &str) -> PathBuf {
        let path = self.inbox.join(name);
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(content.as_bytes()).expect("gzip body");
        fs::write(&path, enc.finish().expect("finish gzip")).expect("write gz report");
        path
    }

    pub fn archive(&self) -> PathBuf {
        self.inbox.join("processed")
    }

    pub fn archived_names(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(self.archive()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("dmarcwatch");
        cmd.env("HOME", &self.home)
            .env_remove("DMARCWATCH_OLLAMA_URL")
            .env_remove("DMARCWATCH_DIR")
            .env("DMARCWATCH_CONFIG", &self.config)
            .env("RUST_LOG", "dmarcwatch=debug");
        cmd
    }
}

/// Analyzer that answers from a table keyed on a substring of the document,
/// falling back to "OK".
#[derive(Default)]
pub struct StubAnalyzer {
    rules: Vec<(String, Result<String, ()>)>,
    calls: AtomicUsize,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_when(mut self, needle: &str, answer: &str) -> Self {
        self.rules.push((needle.to_string(), Ok(answer.to_string())));
        self
    }

    pub fn fail_when(mut self, needle: &str) -> Self {
        self.rules.push((needle.to_string(), Err(())));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Analyzer for StubAnalyzer {
    fn analyze(&self, document: &str) -> Result<Judgement, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for (needle, answer) in &self.rules {
            if document.contains(needle.as_str()) {
                return match answer {
                    Ok(text) => Judgement::from_response(text),
                    Err(()) => Err(AnalysisError::EmptyResponse),
                };
            }
        }
        Judgement::from_response("OK")
    }
}

pub fn stub_pipeline(analyzer: StubAnalyzer) -> (Pipeline, Arc<StubAnalyzer>, Arc<MemorySink>) {
    let analyzer = Arc::new(analyzer);
    let sink = Arc::new(MemorySink::default());
    (Pipeline::new(analyzer.clone(), sink.clone()), analyzer, sink)
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(25));
    }
    cond()
}

/// One request seen by [`MockOllama`].
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Tiny HTTP/1.1 server answering `/api/tags` and `/api/generate` the way an
/// Ollama instance does. One request per connection.
pub struct MockOllama {
    pub url: String,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockOllama {
    pub fn start(models: &[&str], generate_answer: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock ollama");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let tags = serde_json::json!({
            "models": models.iter().map(|m| serde_json::json!({ "name": m })).collect::<Vec<_>>()
        })
        .to_string();
        let generate = serde_json::json!({ "response": generate_answer, "done": true }).to_string();

        let seen = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                if let Some(req) = serve_one(stream, &tags, &generate) {
                    seen.lock().unwrap().push(req);
                }
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn generate_calls(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path == "/api/generate")
            .count()
    }
}

fn serve_one(stream: TcpStream, tags: &str, generate: &str) -> Option<Recorded> {
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let path = parts.next()?.to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).ok()?;

    let (status, payload) = match (method.as_str(), path.as_str()) {
        ("GET", "/api/tags") => ("200 OK", tags),
        ("POST", "/api/generate") => ("200 OK", generate),
        _ => ("404 Not Found", "{}"),
    };
    let mut stream = stream;
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    );
    stream.write_all(response.as_bytes()).ok()?;
    stream.flush().ok()?;

    Some(Recorded {
        method,
        path,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
