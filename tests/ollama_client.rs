mod common;

use common::{MockOllama, REPORT};
use dmarcwatch::analysis::{Analyzer, Judgement, OllamaAnalyzer};
use dmarcwatch::ollama::OllamaClient;

#[test]
fn lists_models_sorted() {
    let mock = MockOllama::start(&["llama3:8b", "gemma2:9b"], "OK");
    let client = OllamaClient::new(&mock.url);

    assert!(client.check_connection());
    assert_eq!(client.list_models(), vec!["gemma2:9b", "llama3:8b"]);
}

#[test]
fn unreachable_service_fails_the_check_and_lists_nothing() {
    let client = OllamaClient::new("http://127.0.0.1:1");
    assert!(!client.check_connection());
    assert!(client.list_models().is_empty());
}

#[test]
fn generate_sends_the_whole_report_unstreamed() {
    let mock = MockOllama::start(&["gemma2:9b"], "  ok\n");
    let analyzer = OllamaAnalyzer::new(OllamaClient::new(&mock.url), "gemma2:9b".to_string());

    assert_eq!(analyzer.analyze(REPORT).unwrap(), Judgement::NoConcerns);

    let generate: Vec<_> = mock
        .requests()
        .into_iter()
        .filter(|r| r.path == "/api/generate")
        .collect();
    assert_eq!(generate.len(), 1);
    assert_eq!(generate[0].method, "POST");

    let body: serde_json::Value = serde_json::from_str(&generate[0].body).unwrap();
    assert_eq!(body["model"], "gemma2:9b");
    assert_eq!(body["stream"], false);
    let prompt = body["prompt"].as_str().unwrap();
    assert!(prompt.ends_with(REPORT));
    assert!(prompt.contains("DMARC Report XML:"));
}

#[test]
fn concerns_are_passed_through_trimmed() {
    let mock = MockOllama::start(&["m"], "\n1. Source 192.0.2.10 fails DKIM.\n");
    let analyzer = OllamaAnalyzer::new(OllamaClient::new(&mock.url), "m".to_string());

    assert_eq!(
        analyzer.analyze(REPORT).unwrap(),
        Judgement::Concerns("1. Source 192.0.2.10 fails DKIM.".to_string())
    );
}

#[test]
fn blank_response_is_an_analysis_failure() {
    let mock = MockOllama::start(&["m"], "   ");
    let analyzer = OllamaAnalyzer::new(OllamaClient::new(&mock.url), "m".to_string());
    assert!(analyzer.analyze(REPORT).is_err());
}
