use std::time::Duration;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::DEFAULT_PUBMED_BASE_URL;
use crate::error::LoaderError;
use crate::model::Reference;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Citation {
    pub pubmed_id: u32,
    pub authors: Vec<String>,
    pub title: Option<String>,
    pub source: Option<String>,
    pub date: Option<String>,
    pub volume: Option<String>,
    pub issue: Option<String>,
    pub pages: Option<String>,
    pub doi: Option<String>,
}

impl Citation {
    pub fn to_citation_string(&self) -> String {
        let mut parts = Vec::new();
        for field in [&self.title, &self.source, &self.date, &self.volume, &self.issue, &self.pages] {
            if let Some(value) = field.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                parts.push(value);
            }
        }
        let body = parts.join(", ");
        if self.authors.is_empty() {
            body
        } else {
            format!("{}; {body}", self.authors.join(", "))
        }
    }
}

pub trait CitationResolver: Send + Sync {
    fn resolve(&self, pubmed_id: u32) -> Result<Option<Citation>, LoaderError>;
}

#[derive(Debug, Clone)]
pub struct PubmedHttpClient {
    client: Client,
    base_url: String,
}

impl PubmedHttpClient {
    pub fn new() -> Result<Self, LoaderError> {
        Self::with_base_url(DEFAULT_PUBMED_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, LoaderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(format!("prider-loader/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| LoaderError::PubmedHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl CitationResolver for PubmedHttpClient {
    fn resolve(&self, pubmed_id: u32) -> Result<Option<Citation>, LoaderError> {
        let url = format!(
            "{}/esummary.fcgi?db=pubmed&retmode=json&id={pubmed_id}",
            self.base_url
        );
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| LoaderError::PubmedHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "PubMed request failed".to_string());
            return Err(LoaderError::PubmedStatus { status, message });
        }
        let payload: Value = response
            .json()
            .map_err(|err| LoaderError::PubmedHttp(err.to_string()))?;
        Ok(parse_esummary(pubmed_id, &payload))
    }
}

pub fn parse_esummary(pubmed_id: u32, payload: &Value) -> Option<Citation> {
    let record = payload.get("result")?.get(pubmed_id.to_string())?;
    if record.get("error").is_some() {
        return None;
    }
    let text = |key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let authors = record
        .get("authors")
        .and_then(Value::as_array)
        .map(|authors| {
            authors
                .iter()
                .filter_map(|author| author.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let doi = record
        .get("articleids")
        .and_then(Value::as_array)
        .and_then(|ids| {
            ids.iter().find(|id| {
                id.get("idtype").and_then(Value::as_str) == Some("doi")
            })
        })
        .and_then(|id| id.get("value").and_then(Value::as_str))
        .map(str::to_string);

    Some(Citation {
        pubmed_id,
        authors,
        title: text("title"),
        source: text("source"),
        date: text("pubdate"),
        volume: text("volume"),
        issue: text("issue"),
        pages: text("pages"),
        doi,
    })
}

pub fn enrich_references(resolver: &dyn CitationResolver, references: &mut [Reference]) {
    for reference in references.iter_mut() {
        match resolver.resolve(reference.pubmed_id) {
            Ok(Some(citation)) => {
                debug!(pubmed_id = reference.pubmed_id, "citation resolved");
                reference.citation = Some(citation.to_citation_string());
                if reference.doi.is_none() {
                    reference.doi = citation.doi;
                }
            }
            Ok(None) => warn!(pubmed_id = reference.pubmed_id, "no PubMed record found"),
            Err(err) => warn!(pubmed_id = reference.pubmed_id, error = %err, "citation lookup failed"),
        }
    }
}
