//! LLM-backed concept inducer.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint in two phases:
//! - Synthesis: one request over a sample of documents proposes concepts
//! - Scoring: every document is scored against every concept, in batches,
//!   with a bounded number of requests in flight

use crate::error::ExplorerError;
use crate::induction::traits::{ConceptInducer, InductionOutput, InductionRequest};
use crate::models::{Concept, ConceptTable, Document, Score, ScoreRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable holding the engine credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Longest document excerpt placed in the synthesis prompt.
const SYNTHESIS_EXCERPT_CHARS: usize = 600;

/// Configuration for the LLM inducer.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    /// Credential; `None` when the environment does not provide one.
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_seconds: u64,
    /// Maximum scoring requests in flight.
    pub concurrency: usize,
    /// Documents shown to the model during synthesis.
    pub sample_size: usize,
    /// Documents scored per request.
    pub batch_size: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            temperature: 0.0,
            timeout_seconds: 300,
            concurrency: 4,
            sample_size: 40,
            batch_size: 20,
        }
    }
}

/// Chat message for the completions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    fn user(content: String) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Sends one system + user prompt and returns the assistant text.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn complete(&self, system: &str, prompt: String) -> Result<String>;
}

/// Chat-completions over HTTP with bearer auth.
pub struct HttpTransport {
    config: LlmConfig,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }
}

/// Concept inducer backed by a chat-completions model.
pub struct LlmInducer {
    config: LlmConfig,
    transport: Box<dyn ChatTransport>,
}

impl LlmInducer {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.clone())?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    pub fn with_transport(config: LlmConfig, transport: Box<dyn ChatTransport>) -> Self {
        info!("Initializing LLM inducer with model {}", config.model);
        Self { config, transport }
    }

    /// Ask the model for up to `max_concepts` concepts.
    async fn synthesize_concepts(&self, request: &InductionRequest) -> Result<ConceptTable> {
        let prompt = build_synthesis_prompt(
            &request.documents,
            request.seed.as_deref(),
            request.max_concepts,
            self.config.sample_size,
        );

        info!("Requesting up to {} concepts", request.max_concepts);
        let response = self
            .transport
            .complete(SYNTHESIS_SYSTEM_PROMPT, prompt)
            .await?;

        let mut concepts = parse_concepts_from_response(&response);
        concepts.truncate(request.max_concepts);
        info!("Model proposed {} concepts", concepts.len());

        Ok(concepts)
    }

    /// Score one batch of documents against one concept.
    async fn score_batch(
        &self,
        concept: &Concept,
        documents: &[Document],
        seed: Option<&str>,
    ) -> Result<Vec<ScoreRecord>> {
        let prompt = build_scoring_prompt(concept, documents);
        let response = self
            .transport
            .complete(SCORING_SYSTEM_PROMPT, prompt)
            .await?;
        let parsed = parse_scores_from_response(&response);

        debug!(
            "Concept {}: {} of {} documents scored by the model",
            concept.id,
            parsed.len(),
            documents.len()
        );

        Ok(fill_score_records(concept, documents, parsed, seed))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn complete(&self, system: &str, prompt: String) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.api_url.trim_end_matches('/'));
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ExplorerError::MissingCredential(API_KEY_ENV.to_string()))?;

        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(prompt)],
            temperature: self.config.temperature,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow::anyhow!("Request timed out after {}s", self.config.timeout_seconds)
                } else if e.is_connect() {
                    anyhow::anyhow!("Cannot connect to engine at {}", self.config.api_url)
                } else {
                    anyhow::anyhow!("Failed to send request: {}", e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Engine API error {}: {}", status, body));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse engine response")?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Engine returned no choices"))
    }
}

#[async_trait]
impl ConceptInducer for LlmInducer {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn ensure_available(&self) -> Result<(), ExplorerError> {
        if self
            .config
            .api_key
            .as_deref()
            .map_or(true, |k| k.trim().is_empty())
        {
            return Err(ExplorerError::MissingCredential(API_KEY_ENV.to_string()));
        }

        let url = &self.config.api_url;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ExplorerError::EngineUnavailable(format!(
                "API URL must start with 'http://' or 'https://', got '{}'",
                url
            )));
        }

        Ok(())
    }

    async fn induce(&self, request: &InductionRequest) -> Result<InductionOutput> {
        if request.documents.is_empty() || request.max_concepts == 0 {
            warn!("Nothing to induce on");
            return Ok(InductionOutput::default());
        }

        let concepts = self.synthesize_concepts(request).await?;
        if concepts.is_empty() {
            warn!("No concepts proposed");
            return Ok(InductionOutput::new(Vec::new(), concepts));
        }

        let batch_size = self.config.batch_size.max(1);
        let jobs: Vec<(&Concept, &[Document])> = concepts
            .iter()
            .flat_map(|concept| {
                request
                    .documents
                    .chunks(batch_size)
                    .map(move |batch| (concept, batch))
            })
            .collect();

        info!(
            "Scoring {} documents against {} concepts ({} requests)",
            request.documents.len(),
            concepts.len(),
            jobs.len()
        );

        // Futures are built up front; the stream only bounds how many run.
        let seed = request.seed.as_deref();
        let pending: Vec<_> = jobs
            .into_iter()
            .map(|(concept, batch)| self.score_batch(concept, batch, seed))
            .collect();
        let batches: Vec<Vec<ScoreRecord>> = stream::iter(pending)
            .buffered(self.config.concurrency.max(1))
            .try_collect()
            .await?;

        let scores = batches.into_iter().flatten().collect();
        Ok(InductionOutput::new(scores, concepts))
    }
}

fn build_synthesis_prompt(
    documents: &[Document],
    seed: Option<&str>,
    max_concepts: usize,
    sample_size: usize,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!(
        "Read the following interview responses and propose at most {} distinct themes.\n",
        max_concepts
    ));
    if let Some(seed) = seed {
        prompt.push_str(&format!(
            "Focus the themes on the topic: \"{}\".\n",
            seed
        ));
    }
    prompt.push_str("For each theme, output it in this exact JSON format:\n");
    prompt.push_str(r#"{"name": "Short theme name", "prompt": "Does the text ...?", "summary": "One sentence summary"}"#);
    prompt.push_str("\n\nOutput one JSON object per line. Only output JSON, no other text.\n\n");
    prompt.push_str("=== RESPONSES ===\n\n");

    for doc in documents.iter().take(sample_size.max(1)) {
        let excerpt: String = doc.text.chars().take(SYNTHESIS_EXCERPT_CHARS).collect();
        prompt.push_str(&format!("- {}\n", excerpt));
    }

    prompt.push_str("\n=== END OF RESPONSES ===\n");
    prompt
}

fn build_scoring_prompt(concept: &Concept, documents: &[Document]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Theme: {}\n", concept.display_name()));
    prompt.push_str(&format!("Inclusion criteria: {}\n\n", concept.prompt));
    prompt.push_str("Score how well each document below matches the criteria, from 0.0 to 1.0.\n");
    prompt.push_str("For each document, output it in this exact JSON format:\n");
    prompt.push_str(r#"{"doc_id": "id", "score": 0.9, "rationale": "Why", "highlight": "Short verbatim quote"}"#);
    prompt.push_str("\n\nOutput one JSON object per line. Only output JSON, no other text.\n\n");
    prompt.push_str("=== DOCUMENTS ===\n\n");

    for doc in documents {
        prompt.push_str(&format!("### DOC {}\n{}\n\n", doc.doc_id, doc.text));
    }

    prompt.push_str("=== END OF DOCUMENTS ===\n");
    prompt
}

/// Lines of the response that parse as JSON objects.
fn json_lines(response: &str) -> impl Iterator<Item = Value> + '_ {
    response
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| serde_json::from_str::<Value>(line.trim_end_matches(',')).ok())
}

/// Parse concepts from the synthesis response (JSON lines format).
fn parse_concepts_from_response(response: &str) -> ConceptTable {
    json_lines(response)
        .filter_map(|json| {
            let name = json["name"].as_str()?.trim().to_string();
            if name.is_empty() {
                return None;
            }
            Some((name, json))
        })
        .enumerate()
        .map(|(i, (name, json))| Concept {
            id: format!("concept-{}", i + 1),
            prompt: json["prompt"].as_str().unwrap_or("").to_string(),
            summary: json["summary"].as_str().map(String::from),
            name,
        })
        .collect()
}

/// A single score line from the model.
#[derive(Debug, Clone, PartialEq)]
struct ParsedScore {
    score: Option<Score>,
    rationale: String,
    highlight: Value,
}

/// Parse per-document scores from the scoring response, keyed by doc id.
fn parse_scores_from_response(response: &str) -> HashMap<String, ParsedScore> {
    let mut scores = HashMap::new();

    for json in json_lines(response) {
        let doc_id = match &json["doc_id"] {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => continue,
        };
        let score = serde_json::from_value::<Score>(json["score"].clone()).ok();

        scores.entry(doc_id).or_insert_with(|| ParsedScore {
            score,
            rationale: json["rationale"].as_str().unwrap_or("").to_string(),
            highlight: json["highlight"].clone(),
        });
    }

    scores
}

/// One record per document; documents the model skipped score 0.
fn fill_score_records(
    concept: &Concept,
    documents: &[Document],
    mut parsed: HashMap<String, ParsedScore>,
    seed: Option<&str>,
) -> Vec<ScoreRecord> {
    documents
        .iter()
        .map(|doc| {
            let parsed = parsed.remove(&doc.doc_id);
            ScoreRecord {
                doc_id: doc.doc_id.clone(),
                text: doc.text.clone(),
                concept_id: concept.id.clone(),
                concept_name: concept.display_name().to_string(),
                concept_prompt: concept.prompt.clone(),
                score: Some(
                    parsed
                        .as_ref()
                        .and_then(|p| p.score.clone())
                        .unwrap_or(Score::Numeric(0.0)),
                ),
                rationale: parsed.as_ref().map(|p| p.rationale.clone()).unwrap_or_default(),
                highlight: parsed.map(|p| p.highlight.into()).unwrap_or_default(),
                concept_seed: seed.map(String::from),
            }
        })
        .collect()
}

/// System prompt for concept synthesis
const SYNTHESIS_SYSTEM_PROMPT: &str = r#"You are an expert qualitative researcher.
Induce descriptive, non-overlapping themes from interview responses.
Each theme needs a short name and a yes/no inclusion question.
Output each theme as a JSON object on its own line.
Only output valid JSON, no explanations or markdown."#;

/// System prompt for document scoring
const SCORING_SYSTEM_PROMPT: &str = r#"You are an expert qualitative researcher.
Score documents against a theme's inclusion criteria.
Quote highlights verbatim from the document.
Output each score as a JSON object on its own line.
Only output valid JSON, no explanations or markdown."#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::highlights::HighlightValue;
    use crate::models::Demographics;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn doc(id: &str, text: &str) -> Document {
        Document {
            doc_id: id.to_string(),
            text: text.to_string(),
            demographics: Demographics::default(),
        }
    }

    #[test]
    fn test_llm_config_default() {
        let config = LlmConfig::default();
        assert_eq!(config.concurrency, 4);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let inducer = LlmInducer::new(LlmConfig::default()).unwrap();
        assert!(matches!(
            inducer.ensure_available(),
            Err(ExplorerError::MissingCredential(name)) if name == API_KEY_ENV
        ));
    }

    #[test]
    fn test_bad_url_is_unavailable() {
        let inducer = LlmInducer::new(LlmConfig {
            api_key: Some("sk-test".to_string()),
            api_url: "localhost:8080".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(
            inducer.ensure_available(),
            Err(ExplorerError::EngineUnavailable(_))
        ));
    }

    #[test]
    fn test_empty_request_skips_engine() {
        let inducer = LlmInducer::new(LlmConfig::default()).unwrap();
        let request = InductionRequest {
            documents: Vec::new(),
            seed: None,
            max_concepts: 3,
        };
        let output = tokio_test::block_on(inducer.induce(&request)).unwrap();
        assert!(output.scores.is_empty());
        assert!(output.concepts.is_empty());
    }

    /// Answers synthesis with three concepts and scores every document it
    /// is shown, except that "2" is left out of the "Price" batches.
    struct ScriptedTransport {
        fail_scoring: bool,
        synthesis_calls: AtomicUsize,
        scoring_calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(fail_scoring: bool) -> Self {
            Self {
                fail_scoring,
                synthesis_calls: AtomicUsize::new(0),
                scoring_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ChatTransport for Arc<ScriptedTransport> {
        async fn complete(&self, system: &str, prompt: String) -> Result<String> {
            if system == SYNTHESIS_SYSTEM_PROMPT {
                self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
                return Ok([
                    r#"{"name": "Crust", "prompt": "Does the text discuss crust?"}"#,
                    r#"{"name": "Price", "prompt": "Does the text mention cost?"}"#,
                    r#"{"name": "Delivery", "prompt": "Does the text mention delivery?"}"#,
                ]
                .join("\n"));
            }

            self.scoring_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_scoring {
                anyhow::bail!("Engine API error 500: overloaded");
            }

            let theme = prompt
                .lines()
                .find_map(|l| l.strip_prefix("Theme: "))
                .unwrap_or_default();
            let lines: Vec<String> = prompt
                .lines()
                .filter_map(|l| l.strip_prefix("### DOC "))
                .filter(|id| !(theme == "Price" && *id == "2"))
                .map(|id| {
                    let score = if theme == "Crust" && id != "3" { 0.9 } else { 0.1 };
                    format!(
                        r#"{{"doc_id": "{}", "score": {}, "rationale": "ok", "highlight": "quote {}"}}"#,
                        id, score, id
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }
    }

    fn scripted_inducer(transport: &Arc<ScriptedTransport>) -> LlmInducer {
        let config = LlmConfig {
            batch_size: 2,
            concurrency: 2,
            ..Default::default()
        };
        LlmInducer::with_transport(config, Box::new(Arc::clone(transport)))
    }

    fn three_docs() -> InductionRequest {
        InductionRequest {
            documents: vec![doc("1", "crispy"), doc("2", "cheap"), doc("3", "soggy")],
            seed: Some("taste".to_string()),
            max_concepts: 2,
        }
    }

    #[tokio::test]
    async fn test_induce_synthesizes_then_scores_every_batch() {
        let transport = Arc::new(ScriptedTransport::new(false));
        let inducer = scripted_inducer(&transport);

        let output = inducer.induce(&three_docs()).await.unwrap();

        // One synthesis call, then 2 concepts x 2 batches of documents
        assert_eq!(transport.synthesis_calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.scoring_calls.load(Ordering::SeqCst), 4);

        let names: Vec<_> = output.concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Crust", "Price"]);

        let rows: Vec<_> = output
            .scores
            .iter()
            .map(|r| (r.concept_id.as_str(), r.doc_id.as_str(), r.is_match(0.75)))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("concept-1", "1", true),
                ("concept-1", "2", true),
                ("concept-1", "3", false),
                ("concept-2", "1", false),
                ("concept-2", "2", false),
                ("concept-2", "3", false),
            ]
        );

        let skipped = &output.scores[4];
        assert_eq!(skipped.score, Some(Score::Numeric(0.0)));
        assert_eq!(skipped.highlight, HighlightValue::Missing);
        assert_eq!(output.scores[0].highlight, HighlightValue::Text("quote 1".to_string()));
        assert!(output
            .scores
            .iter()
            .all(|r| r.concept_seed.as_deref() == Some("taste")));
    }

    #[tokio::test]
    async fn test_scoring_failure_fails_whole_induction() {
        let transport = Arc::new(ScriptedTransport::new(true));
        let inducer = scripted_inducer(&transport);

        let err = inducer.induce(&three_docs()).await.unwrap_err();

        assert!(err.to_string().contains("overloaded"));
        assert!(transport.scoring_calls.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn test_parse_concepts() {
        let response = r#"Here are the themes:
{"name": "Crust texture", "prompt": "Does the text discuss crust?", "summary": "Crust matters"}
{"name": "", "prompt": "ignored"}
{"name": "Cost", "prompt": "Does the text mention price?"}
not json"#;

        let concepts = parse_concepts_from_response(response);
        let names: Vec<_> = concepts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Crust texture", "Cost"]);
        assert_eq!(concepts.get("concept-2").map(|c| c.summary.is_none()), Some(true));
    }

    #[test]
    fn test_parse_scores_and_fill_missing_docs() {
        let response = r#"{"doc_id": "1", "score": 0.9, "rationale": "Talks about crust", "highlight": "crispy crust"}
{"doc_id": 2, "score": "0.4", "rationale": "Barely"}"#;
        let concept = Concept {
            id: "concept-1".to_string(),
            name: "Crust".to_string(),
            prompt: "Crust?".to_string(),
            summary: None,
        };
        let docs = vec![doc("1", "crispy crust"), doc("2", "fine"), doc("3", "nothing")];

        let parsed = parse_scores_from_response(response);
        let records = fill_score_records(&concept, &docs, parsed, Some("texture"));

        assert_eq!(records.len(), 3);
        assert!(records[0].is_match(0.75));
        assert_eq!(records[0].highlight, HighlightValue::Text("crispy crust".to_string()));
        assert_eq!(records[1].score, Some(Score::Text("0.4".to_string())));
        assert_eq!(records[2].score, Some(Score::Numeric(0.0)));
        assert!(records.iter().all(|r| r.concept_seed.as_deref() == Some("texture")));
    }

    #[test]
    fn test_synthesis_prompt_mentions_seed_and_limit() {
        let docs = vec![doc("1", "Thin crust forever")];
        let prompt = build_synthesis_prompt(&docs, Some("packaging"), 4, 10);
        assert!(prompt.contains("at most 4"));
        assert!(prompt.contains("\"packaging\""));
        assert!(prompt.contains("Thin crust forever"));
    }
}
