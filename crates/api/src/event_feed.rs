//! GraphQL client for the bridge event indexer.
//!
//! Each chain's bridge contract is indexed by a subgraph-style service that
//! exposes the four bridge event entities. One request fetches all four lists
//! newer than a timestamp, oldest first, at most [`PAGE_SIZE`] per list.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Maximum records per entity list.
pub const PAGE_SIZE: usize = 100;

/// Failures reported by the indexer.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("indexer returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("indexer returned errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),
    #[error("indexer response has no data")]
    MissingData,
}

/// Raw event record as returned by the indexer.
///
/// Numbers and addresses stay strings here; conversion happens where the
/// record is turned into a domain event so a bad record can be skipped alone.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub id: String,
    pub token_address: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub token_id: String,
    /// Present on Locked and Burned.
    #[serde(default)]
    pub owner: Option<String>,
    /// Present on Minted and Unlocked.
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string_or_number")]
    pub target_chain_id: Option<String>,
    #[serde(default)]
    pub target_address: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_string_or_number")]
    pub source_chain_id: Option<String>,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub block_number: String,
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub block_timestamp: String,
    pub transaction_hash: String,
}

/// The four event lists of one query.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvents {
    #[serde(default)]
    pub token_lockeds: Vec<FeedEvent>,
    #[serde(default)]
    pub token_burneds: Vec<FeedEvent>,
    #[serde(default)]
    pub token_minteds: Vec<FeedEvent>,
    #[serde(default)]
    pub token_unlockeds: Vec<FeedEvent>,
}

impl FeedEvents {
    pub fn len(&self) -> usize {
        self.token_lockeds.len()
            + self.token_burneds.len()
            + self.token_minteds.len()
            + self.token_unlockeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<FeedEvents>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest {
    query: String,
}

/// Build the query for all four entity lists newer than `since`.
pub fn build_events_query(since: u64) -> String {
    let outgoing = "id tokenAddress tokenId owner targetChainId targetAddress blockNumber blockTimestamp transactionHash";
    let incoming = "id tokenAddress tokenId recipient sourceChainId blockNumber blockTimestamp transactionHash";
    let args = format!(
        "first: {PAGE_SIZE}, orderBy: blockTimestamp, orderDirection: asc, where: {{ blockTimestamp_gt: \"{since}\" }}"
    );

    format!(
        "{{ tokenLockeds({args}) {{ {outgoing} }} \
         tokenBurneds({args}) {{ {outgoing} }} \
         tokenMinteds({args}) {{ {incoming} }} \
         tokenUnlockeds({args}) {{ {incoming} }} }}"
    )
}

/// Decode a GraphQL response body.
pub fn parse_events_response(body: &str) -> Result<FeedEvents> {
    let response: GraphQlResponse = serde_json::from_str(body)?;
    if let Some(errors) = response.errors {
        if !errors.is_empty() {
            return Err(FeedError::GraphQl(errors.into_iter().map(|e| e.message).collect()).into());
        }
    }
    response.data.ok_or_else(|| FeedError::MissingData.into())
}

/// HTTP client for indexer endpoints.
#[derive(Debug, Clone)]
pub struct EventFeedClient {
    client: reqwest::Client,
}

impl Default for EventFeedClient {
    fn default() -> Self {
        Self::new()
    }
}

impl EventFeedClient {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// Fetch the events newer than `since` from `endpoint`.
    #[instrument(skip(self))]
    pub async fn fetch_events(&self, endpoint: &str, since: u64) -> Result<FeedEvents> {
        let request = GraphQlRequest {
            query: build_events_query(since),
        };

        let response = self.client.post(endpoint).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            }
            .into());
        }

        let events = parse_events_response(&body)?;
        debug!(
            locked = events.token_lockeds.len(),
            burned = events.token_burneds.len(),
            minted = events.token_minteds.len(),
            unlocked = events.token_unlockeds.len(),
            "Fetched events from indexer"
        );
        Ok(events)
    }
}

// Custom deserializers

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }
    }
}

fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(StringOrNumber::deserialize(deserializer)?.into())
}

fn deserialize_optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}
