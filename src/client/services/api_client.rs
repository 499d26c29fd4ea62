use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::auth::AuthReader;
use crate::client::error::ApiError;
use crate::common::models::{Candidate, CandidateId, ConversationId, ConversationMessage, LikeKind, LikeResult, Match};

/// Discovery, like and match endpoints.
#[allow(async_fn_in_trait)]
pub trait DiscoveryApi {
    async fn fetch_candidates(&self, filters: &DiscoveryFilters) -> Result<Vec<Candidate>, ApiError>;

    async fn submit_like(&self, candidate_id: &CandidateId, kind: LikeKind) -> Result<LikeResult, ApiError>;

    async fn fetch_matches(&self) -> Result<Vec<Match>, ApiError>;
}

/// One-shot history fetch, oldest to newest.
#[allow(async_fn_in_trait)]
pub trait ChatHistoryApi {
    async fn fetch_history(&self, conversation_id: &ConversationId) -> Result<Vec<ConversationMessage>, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryFilters {
    pub age_min: u32,
    pub age_max: u32,
    pub max_distance: u32,
}

impl Default for DiscoveryFilters {
    fn default() -> Self {
        Self { age_min: 18, age_max: 35, max_distance: 50 }
    }
}

/// `{success, data, error, message}` wrapper used by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "default_success")]
    success: bool,
    data: Option<T>,
    error: Option<String>,
    message: Option<String>,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct DiscoverResponse {
    #[serde(default)]
    users: Vec<Candidate>,
}

/// Lists come back either bare or paginated.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Plain(Vec<T>),
    Page { items: Vec<T> },
}

impl<T> Listing<T> {
    fn into_items(self) -> Vec<T> {
        match self {
            Listing::Plain(items) | Listing::Page { items } => items,
        }
    }
}

#[derive(Debug, Serialize)]
struct LikeRequest<'a> {
    target_user_id: &'a CandidateId,
    like_type: LikeKind,
}

/// REST client for the discovery/match/chat backend.
#[derive(Clone)]
pub struct HttpApiClient {
    base_url: String,
    http: reqwest::Client,
    auth: AuthReader,
}

impl HttpApiClient {
    pub fn new(base_url: impl Into<String>, auth: AuthReader) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            auth,
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = self.auth.session_token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("[API] Session token is not a valid header value, sending without it"),
            }
        }
        headers
    }

    async fn decode<T: DeserializeOwned>(url: &str, resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            let err = status_error(status, &body);
            warn!("[API] {} -> {}", url, err);
            return Err(err);
        }
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        if !envelope.success {
            let message = envelope.error.or(envelope.message).unwrap_or_else(|| "request failed".to_string());
            return Err(ApiError::Status { status: status.as_u16(), message });
        }
        envelope.data.ok_or_else(|| ApiError::Status {
            status: status.as_u16(),
            message: "response carried no data".to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[API] GET {}", url);
        let resp = self.http.get(&url).headers(self.headers()).query(query).send().await?;
        Self::decode(&url, resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("[API] POST {}", url);
        let resp = self.http.post(&url).headers(self.headers()).json(body).send().await?;
        Self::decode(&url, resp).await
    }
}

/// Maps a non-2xx response. 401 means the session token was missing or
/// rejected.
fn status_error(status: StatusCode, body: &str) -> ApiError {
    if status == StatusCode::UNAUTHORIZED {
        return ApiError::Unauthenticated;
    }
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("detail"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    ApiError::Status { status: status.as_u16(), message }
}

impl DiscoveryApi for HttpApiClient {
    async fn fetch_candidates(&self, filters: &DiscoveryFilters) -> Result<Vec<Candidate>, ApiError> {
        let query = [
            ("age_min", filters.age_min.to_string()),
            ("age_max", filters.age_max.to_string()),
            ("max_distance", filters.max_distance.to_string()),
        ];
        let resp: DiscoverResponse = self.get("/discover", &query).await?;
        Ok(resp.users)
    }

    async fn submit_like(&self, candidate_id: &CandidateId, kind: LikeKind) -> Result<LikeResult, ApiError> {
        let body = LikeRequest { target_user_id: candidate_id, like_type: kind };
        self.post("/matches/like", &body).await
    }

    async fn fetch_matches(&self) -> Result<Vec<Match>, ApiError> {
        let listing: Listing<Match> = self.get("/matches", &[]).await?;
        Ok(listing.into_items())
    }
}

impl ChatHistoryApi for HttpApiClient {
    async fn fetch_history(&self, conversation_id: &ConversationId) -> Result<Vec<ConversationMessage>, ApiError> {
        let path = format!("/chat/{}/messages", conversation_id);
        let listing: Listing<ConversationMessage> = self.get(&path, &[]).await?;
        Ok(listing.into_items())
    }
}
