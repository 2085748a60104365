//! Knowledge-graph API client
//!
//! Resolves entity IDs and watchlists against the external Bigdata knowledge
//! graph. Entity resolution and watchlist membership are black boxes behind
//! this interface; the service only consumes the resolved records.

use std::env;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const KNOWLEDGE_GRAPH_API_BASE_URL: &str = "https://api.bigdata.com/v1";
const KNOWLEDGE_GRAPH_BASE_URL_ENV: &str = "BIGDATA_KNOWLEDGE_GRAPH_URL";

const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Debug, thiserror::Error)]
pub enum KnowledgeGraphError {
    #[error("Watchlist not found: {0}")]
    WatchlistNotFound(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// A knowledge-graph record: a company, person, place or organization
///
/// Companies carry `entity_type == "COMP"`; the descriptive fields are
/// whatever the graph knows about the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Entity {
    pub const TYPE_COMPANY: &'static str = "COMP";

    pub fn is_company(&self) -> bool {
        self.entity_type == Self::TYPE_COMPANY
    }
}

/// A named, externally stored collection of entity IDs
#[derive(Debug, Clone, Deserialize)]
pub struct Watchlist {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub items: Vec<String>,
}

/// Knowledge-graph operations the resolver depends on
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    /// Resolve entity IDs to entities, in input order; unresolvable IDs come
    /// back as `None`
    async fn get_entities(&self, ids: &[String]) -> Result<Vec<Option<Entity>>, KnowledgeGraphError>;

    /// Look up a watchlist and its member IDs
    async fn get_watchlist(&self, id: &str) -> Result<Watchlist, KnowledgeGraphError>;
}

#[derive(Serialize)]
struct EntityLookupRequest<'a> {
    ids: &'a [String],
}

#[derive(Deserialize)]
struct EntityLookupResponse {
    entities: Vec<Option<Entity>>,
}

/// HTTP client for the Bigdata knowledge-graph API
///
/// The base URL is resolved from `BIGDATA_KNOWLEDGE_GRAPH_URL` if set,
/// falling back to the production endpoint.
pub struct BigdataKnowledgeGraph {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BigdataKnowledgeGraph {
    pub fn new(api_key: String) -> Self {
        let base_url = env::var(KNOWLEDGE_GRAPH_BASE_URL_ENV)
            .ok()
            .unwrap_or_else(|| KNOWLEDGE_GRAPH_API_BASE_URL.to_string());

        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl KnowledgeGraph for BigdataKnowledgeGraph {
    async fn get_entities(&self, ids: &[String]) -> Result<Vec<Option<Entity>>, KnowledgeGraphError> {
        let url = format!("{}/knowledge-graph/entities", self.base_url);

        tracing::debug!(count = ids.len(), url = %url, "Resolving entities");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&EntityLookupRequest { ids })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KnowledgeGraphError::ParseError(format!(
                "Unexpected status {}: {}",
                status, body
            )));
        }

        let parsed: EntityLookupResponse = response.json().await.map_err(|e| {
            KnowledgeGraphError::ParseError(format!("Failed to deserialize entities: {}", e))
        })?;

        tracing::debug!(
            requested = ids.len(),
            resolved = parsed.entities.iter().filter(|e| e.is_some()).count(),
            "Entity resolution completed"
        );

        Ok(parsed.entities)
    }

    async fn get_watchlist(&self, id: &str) -> Result<Watchlist, KnowledgeGraphError> {
        let url = format!("{}/watchlists/{}", self.base_url, id);

        tracing::debug!(watchlist_id = %id, url = %url, "Fetching watchlist");

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(KnowledgeGraphError::WatchlistNotFound(id.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(KnowledgeGraphError::ParseError(format!(
                "Unexpected status {}: {}",
                status, body
            )));
        }

        let watchlist: Watchlist = response.json().await.map_err(|e| {
            KnowledgeGraphError::ParseError(format!("Failed to deserialize watchlist: {}", e))
        })?;

        tracing::debug!(
            watchlist_id = %watchlist.id,
            items = watchlist.items.len(),
            "Fetched watchlist"
        );

        Ok(watchlist)
    }
}
