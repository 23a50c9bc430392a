use crate::error::AnalysisError;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const CONNECT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
const LIST_TIMEOUT: Duration = Duration::from_secs(10);
// Generation on a local model can take minutes for a large report.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Blocking client for the Ollama HTTP API.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    http: HttpClient,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: HttpClient::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn check_connection(&self) -> bool {
        tracing::info!(url = %self.base_url, "Connecting to Ollama service...");
        let ok = self
            .http
            .get(self.url("/api/tags"))
            .timeout(CONNECT_CHECK_TIMEOUT)
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false);
        if ok {
            tracing::info!("Connected to Ollama service");
        }
        ok
    }

    /// Sorted model names; an empty list on any error.
    pub fn list_models(&self) -> Vec<String> {
        match self.fetch_models() {
            Ok(mut models) => {
                models.sort();
                models
            }
            Err(err) => {
                tracing::error!(error = %err, "Error fetching models");
                Vec::new()
            }
        }
    }

    fn fetch_models(&self) -> Result<Vec<String>, AnalysisError> {
        let response = self
            .http
            .get(self.url("/api/tags"))
            .timeout(LIST_TIMEOUT)
            .send()
            .map_err(AnalysisError::Transport)?;
        if !response.status().is_success() {
            return Err(AnalysisError::Status {
                status: response.status(),
            });
        }
        let body: TagsResponse = response.json().map_err(AnalysisError::Decode)?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }

    /// One non-streamed generation. Returns the trimmed response text.
    pub fn generate(&self, model: &str, prompt: &str) -> Result<String, AnalysisError> {
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
        };
        let response = self
            .http
            .post(self.url("/api/generate"))
            .timeout(GENERATE_TIMEOUT)
            .json(&request)
            .send()
            .map_err(AnalysisError::Transport)?;
        if !response.status().is_success() {
            return Err(AnalysisError::Status {
                status: response.status(),
            });
        }
        let body: GenerateResponse = response.json().map_err(AnalysisError::Decode)?;
        Ok(body.response.trim().to_string())
    }
}
