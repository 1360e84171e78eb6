//! HTTP gateway to the recommendation/indexing backend.
//!
//! Every call is a single attempt with a bounded timeout. Nothing here
//! returns an error to its caller: transport trouble on the chat path
//! resolves to a fixed apology reply, and indexing trouble normalizes to a
//! `success: false` outcome.

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{BookRecord, ChatMessage, Critique};

/// Shown in the transcript when the backend cannot be reached. Stored as a
/// regular assistant message so history stays a plain linear transcript.
pub const APOLOGY: &str = "Sorry, I can't reach the recommendation service right now. \
Please check that it's running and try again.";

const CONVERSE_TIMEOUT: Duration = Duration::from_secs(15);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// One prior conversation turn as the backend expects it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<&ChatMessage> for HistoryEntry {
    fn from(message: &ChatMessage) -> Self {
        Self {
            text: message.text.clone(),
            is_user: message.is_user,
            timestamp: message.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConverseReply {
    pub text: String,
    pub confidence: f64,
}

impl ConverseReply {
    pub fn apology() -> Self {
        Self {
            text: APOLOGY.to_string(),
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl IndexOutcome {
    fn failure(error: String) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BackendStats {
    pub total_books: u64,
    pub total_queries: u64,
}

/// Seam between the controllers and the wire. Controllers hold this as a
/// trait object so tests can substitute a fake transport.
#[async_trait]
pub trait RecommendBackend: Send + Sync {
    /// Never fails: any transport problem resolves to the apology reply
    /// with confidence 0.
    async fn converse(&self, message: String, history: Vec<HistoryEntry>) -> ConverseReply;

    /// Best-effort indexing of a library entry; all failures normalize to
    /// `success: false`.
    async fn index_book(&self, book: BookRecord) -> IndexOutcome;

    /// Single GET with a hard 5 s timeout; any failure reads as unhealthy.
    async fn check_health(&self) -> bool;

    async fn fetch_stats(&self) -> Option<BackendStats>;
}

#[derive(Serialize)]
struct RecommendRequest {
    message: String,
    history: Vec<HistoryEntry>,
}

// The backend may also send `recommendations` and `sources` arrays; only the
// reply text and confidence are consumed here.
#[derive(Deserialize)]
struct RecommendResponse {
    response: String,
    confidence: Option<f64>,
}

#[derive(Serialize)]
struct AddBookRequest<'a> {
    title: &'a str,
    author: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    review: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rating: Option<f64>,
}

#[derive(Deserialize)]
struct AddBookResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn try_converse(&self, request: &RecommendRequest) -> Result<ConverseReply> {
        let url = format!("{}/chat/recommend", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(CONVERSE_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "recommendation request failed with status: {}",
                response.status()
            ));
        }

        let body: RecommendResponse = response.json().await?;
        Ok(ConverseReply {
            text: body.response,
            // Older backend variants omit the field; a reply that arrived
            // at all counts as fully confident.
            confidence: body.confidence.unwrap_or(1.0),
        })
    }

    async fn try_index(&self, request: &AddBookRequest<'_>) -> Result<IndexOutcome> {
        let url = format!("{}/books/add", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .timeout(CONVERSE_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(IndexOutcome::failure(format!(
                "indexing failed with status: {}",
                response.status()
            )));
        }

        let body: AddBookResponse = response.json().await?;
        Ok(IndexOutcome {
            success: body.success,
            message: body.message,
            error: None,
        })
    }
}

#[async_trait]
impl RecommendBackend for HttpGateway {
    async fn converse(&self, message: String, history: Vec<HistoryEntry>) -> ConverseReply {
        let request = RecommendRequest { message, history };
        match self.try_converse(&request).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%err, "recommendation call failed, substituting apology");
                ConverseReply::apology()
            }
        }
    }

    async fn index_book(&self, book: BookRecord) -> IndexOutcome {
        // A bad rating is rejected client-side rather than sent.
        if let Critique::Rating(rating) = book.critique {
            if !rating.is_finite() || !(0.0..=5.0).contains(&rating) {
                return IndexOutcome::failure(format!("invalid rating: {rating}"));
            }
        }

        let (review, rating) = match &book.critique {
            Critique::Review(text) => (Some(text.as_str()), None),
            Critique::Rating(score) => (None, Some(*score)),
        };
        let request = AddBookRequest {
            title: &book.title,
            author: &book.author,
            description: &book.description,
            review,
            rating,
        };

        match self.try_index(&request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(%err, book_id = %book.id, "indexing call failed");
                IndexOutcome::failure(err.to_string())
            }
        }
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                warn!(%err, "health check failed");
                false
            }
        }
    }

    async fn fetch_stats(&self) -> Option<BackendStats> {
        let url = format!("{}/stats", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{new_book_id, IndexStatus};

    // Nothing listens here; every call should fail fast at connect time.
    const DEAD_BACKEND: &str = "http://127.0.0.1:9";

    fn sample_book(critique: Critique) -> BookRecord {
        BookRecord {
            id: new_book_id(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            description: "Desert planet politics and giant sandworms.".to_string(),
            critique,
            date_added: Utc::now(),
            index_status: IndexStatus::Pending,
        }
    }

    #[tokio::test]
    async fn converse_resolves_to_apology_when_unreachable() {
        let gateway = HttpGateway::new(DEAD_BACKEND);
        let reply = gateway.converse("hi".to_string(), Vec::new()).await;
        assert_eq!(reply.text, APOLOGY);
        assert_eq!(reply.confidence, 0.0);
    }

    #[tokio::test]
    async fn index_book_normalizes_transport_failure() {
        let gateway = HttpGateway::new(DEAD_BACKEND);
        let outcome = gateway
            .index_book(sample_book(Critique::Review(
                "Twisty and sharp, kept me up all night.".to_string(),
            )))
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn index_book_rejects_out_of_range_rating_client_side() {
        let gateway = HttpGateway::new(DEAD_BACKEND);
        let outcome = gateway.index_book(sample_book(Critique::Rating(7.0))).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("invalid rating"));
    }

    #[tokio::test]
    async fn check_health_is_false_when_unreachable() {
        let gateway = HttpGateway::new(DEAD_BACKEND);
        assert!(!gateway.check_health().await);
    }

    #[tokio::test]
    async fn fetch_stats_is_none_when_unreachable() {
        let gateway = HttpGateway::new(DEAD_BACKEND);
        assert!(gateway.fetch_stats().await.is_none());
    }
}
