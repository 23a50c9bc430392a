use crate::error::AnalysisError;
use crate::ollama::OllamaClient;
use std::fmt;

const PROMPT_PREAMBLE: &str = "You are a cybersecurity analyst reviewing a DMARC (Domain-based Message Authentication, Reporting & Conformance) report.

Analyze the following DMARC report XML and identify any security concerns, authentication failures, suspicious patterns, or issues that require attention.

Focus on:
";

const FOCUS_AREAS: &[&str] = &[
    "SPF (Sender Policy Framework) authentication failures",
    "DKIM (DomainKeys Identified Mail) authentication failures",
    "Unusual sending patterns or sources",
    "Potential email spoofing attempts",
    "High failure rates",
    "Suspicious IP addresses or domains",
    "Any anomalies in the report data",
];

const PROMPT_INSTRUCTIONS: &str = "
If everything looks normal and there are no concerns, respond with only the word \"ok\" (lowercase).

If there are concerns, list them clearly and concisely, one per line.

DMARC Report XML:
";

/// Literal the backend answers with, and we print, when nothing is wrong.
pub const NO_CONCERNS: &str = "ok";

/// Outcome of one analyzed report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Judgement {
    NoConcerns,
    /// Backend text, verbatim after trimming.
    Concerns(String),
}

impl Judgement {
    pub fn from_response(response: &str) -> Result<Self, AnalysisError> {
        let trimmed = response.trim();
        if trimmed.is_empty() {
            Err(AnalysisError::EmptyResponse)
        } else if trimmed.eq_ignore_ascii_case(NO_CONCERNS) {
            Ok(Judgement::NoConcerns)
        } else {
            Ok(Judgement::Concerns(trimmed.to_string()))
        }
    }
}

impl fmt::Display for Judgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Judgement::NoConcerns => f.write_str(NO_CONCERNS),
            Judgement::Concerns(text) => f.write_str(text),
        }
    }
}

pub fn build_prompt(document: &str) -> String {
    let mut prompt = String::with_capacity(PROMPT_PREAMBLE.len() + document.len() + 512);
    prompt.push_str(PROMPT_PREAMBLE);
    for area in FOCUS_AREAS {
        prompt.push_str("- ");
        prompt.push_str(area);
        prompt.push('\n');
    }
    prompt.push_str(PROMPT_INSTRUCTIONS);
    prompt.push_str(document);
    prompt
}

/// Turns validated report text into a judgement.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, document: &str) -> Result<Judgement, AnalysisError>;
}

/// [`Analyzer`] backed by a model on an Ollama server.
pub struct OllamaAnalyzer {
    client: OllamaClient,
    model: String,
}

impl OllamaAnalyzer {
    pub fn new(client: OllamaClient, model: String) -> Self {
        Self { client, model }
    }
}

impl Analyzer for OllamaAnalyzer {
    fn analyze(&self, document: &str) -> Result<Judgement, AnalysisError> {
        tracing::info!(model = %self.model, "Analyzing report...");
        let response = self.client.generate(&self.model, &build_prompt(document))?;
        let judgement = Judgement::from_response(&response)?;
        tracing::info!("Analysis complete");
        Ok(judgement)
    }
}
