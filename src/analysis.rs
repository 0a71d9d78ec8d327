//! Scene and accessibility analysis for imported photos.
//!
//! Import asks a [`SceneAnalyzer`] for alt text, an optional longer
//! description and category tags. The production analyzer talks to an Ollama
//! vision model over HTTP; [`DisabledAnalyzer`] is used for `--no-ai` runs and
//! when `[analysis] enabled = false`.
//!
//! Analysis is best-effort. [`analyze_or_fallback`] turns every failure
//! (network error, timeout, unparseable reply) into the fixed fallback
//! [`Analysis`], so one bad call never aborts an import.
//!
//! Tags are whatever strings the model returns, normalized to lowercase.
//! The pipeline stores and filters them but does not restrict the vocabulary.

use crate::config::AnalysisConfig;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Alt text stored when analysis is disabled or fails.
pub const FALLBACK_ALT_TEXT: &str = "Photograph";

const PROMPT: &str = "You are writing accessibility metadata for a photography portfolio. \
Reply with a JSON object with exactly these keys: \
\"altText\" (one sentence, under 125 characters, describing what is visible), \
\"description\" (two or three sentences about the scene, light and mood), \
\"tags\" (a list of one to three lowercase category words such as \
landscape, portrait, street, architecture, nature, travel, abstract).";

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("analysis disabled")]
    Disabled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("analysis service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unusable analysis reply: {0}")]
    BadReply(String),
}

/// What an analyzer says about one photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub alt_text: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl Analysis {
    pub fn fallback() -> Self {
        Self {
            alt_text: FALLBACK_ALT_TEXT.to_string(),
            description: None,
            tags: Vec::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.alt_text == FALLBACK_ALT_TEXT && self.description.is_none() && self.tags.is_empty()
    }
}

/// A service that describes an image file.
///
/// Implementations must be `Sync`: import calls them from rayon workers.
pub trait SceneAnalyzer: Sync {
    fn analyze(&self, path: &Path) -> Result<Analysis, AnalysisError>;

    /// Short name for progress output.
    fn name(&self) -> &str;
}

/// Analyzer for runs without AI; always declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAnalyzer;

impl SceneAnalyzer for DisabledAnalyzer {
    fn analyze(&self, _path: &Path) -> Result<Analysis, AnalysisError> {
        Err(AnalysisError::Disabled)
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

/// Ollama vision model backend (llava, qwen-vl, ...).
pub struct OllamaAnalyzer {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>, // base64 encoded
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelReply {
    #[serde(default, alias = "alt_text", alias = "alt")]
    alt_text: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

impl OllamaAnalyzer {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        Self::new(&config.endpoint, &config.model, config.timeout())
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

impl SceneAnalyzer for OllamaAnalyzer {
    fn analyze(&self, path: &Path) -> Result<Analysis, AnalysisError> {
        let bytes = std::fs::read(path)?;
        let request = OllamaGenerateRequest {
            model: &self.model,
            prompt: PROMPT,
            images: vec![base64::engine::general_purpose::STANDARD.encode(bytes)],
            stream: false,
            format: "json",
        };

        let response = self.client.post(self.generate_url()).json(&request).send()?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(AnalysisError::Status { status, body });
        }

        let reply: OllamaGenerateResponse = response.json()?;
        parse_reply(&reply.response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Build the analyzer a run should use.
///
/// Falls back to [`DisabledAnalyzer`] when analysis is switched off or the
/// HTTP client cannot be constructed.
pub fn analyzer_for(config: &AnalysisConfig, no_ai: bool) -> Box<dyn SceneAnalyzer + Send> {
    if no_ai || !config.enabled {
        return Box::new(DisabledAnalyzer);
    }
    match OllamaAnalyzer::from_config(config) {
        Ok(analyzer) => Box::new(analyzer),
        Err(e) => {
            warn!(error = %e, "analysis client unavailable, continuing without AI");
            Box::new(DisabledAnalyzer)
        }
    }
}

/// Parse the model's text reply.
///
/// Models often wrap the JSON object in prose or code fences, so the
/// outermost `{...}` is extracted first. A reply that is not JSON at all is
/// used as plain alt text.
pub fn parse_reply(text: &str) -> Result<Analysis, AnalysisError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::BadReply("empty reply".to_string()));
    }

    let json_slice = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&trimmed[start..=end]),
        _ => None,
    };

    if let Some(slice) = json_slice {
        let reply: ModelReply = serde_json::from_str(slice)
            .map_err(|e| AnalysisError::BadReply(format!("invalid JSON: {e}")))?;
        let alt_text = clean_sentence(&reply.alt_text);
        if alt_text.is_empty() {
            return Err(AnalysisError::BadReply("reply has no altText".to_string()));
        }
        return Ok(Analysis {
            alt_text,
            description: reply
                .description
                .map(|d| clean_sentence(&d))
                .filter(|d| !d.is_empty()),
            tags: normalize_tags(reply.tags),
        });
    }

    Ok(Analysis {
        alt_text: clean_sentence(trimmed),
        description: None,
        tags: Vec::new(),
    })
}

fn clean_sentence(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches('"')
        .to_string()
}

/// Lowercase, trim and dedupe tags, keeping first-seen order.
pub fn normalize_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Run the analyzer, substituting the fallback on any failure.
pub fn analyze_or_fallback(analyzer: &(impl SceneAnalyzer + ?Sized), path: &Path) -> Analysis {
    match analyzer.analyze(path) {
        Ok(analysis) => analysis,
        Err(AnalysisError::Disabled) => Analysis::fallback(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "analysis failed, using fallback alt text");
            Analysis::fallback()
        }
    }
}
