// src/harvest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::harvest::error::ClientError;

/// One member exactly as the remote client hands it over.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawMember {
    pub id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub bot: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub premium: bool,
    /// Raw presence tag, e.g. "UserStatusOnline".
    #[serde(default)]
    pub presence: Option<String>,
}

/// Coarse last-seen classification of a member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum PresenceStatus {
    Online,
    Recently,
    WithinAWeek,
    WithinAMonth,
    LongAgo,
    #[default]
    Unknown,
}

/// Canonical, immutable snapshot of one harvested member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: String,
    pub username: Option<String>,
    pub display_name: String,
    pub phone: Option<String>,
    pub is_bot: bool,
    pub is_verified: bool,
    pub is_premium: bool,
    pub presence_status: PresenceStatus,
    pub scraped_at: DateTime<Utc>,
}

/// A resolved source, as returned by [`RemoteSourceClient::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHandle {
    pub id: String,
    pub title: String,
}

/// Capability handed to the harvester at harvest start.
///
/// Implementations own connection and session lifecycle; the harvester only
/// resolves identifiers and pulls pages.
#[async_trait]
pub trait RemoteSourceClient: Send + Sync {
    async fn resolve(&self, identifier: &str) -> Result<SourceHandle, ClientError>;

    /// Returns up to `page_size` members starting at `offset`. An empty page
    /// signals that the source is exhausted; page size is a hint only.
    async fn fetch_page(
        &self,
        handle: &SourceHandle,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<RawMember>, ClientError>;

    fn name(&self) -> &'static str;
}

/// One harvest submission, already split into identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HarvestRequest {
    pub source_identifiers: Vec<String>,
    #[serde(default)]
    pub member_limit: Option<usize>,
    #[serde(default)]
    pub exclude_bots: bool,
}

impl HarvestRequest {
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            source_identifiers: sources.into_iter().map(Into::into).collect(),
            member_limit: None,
            exclude_bots: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.member_limit = Some(limit);
        self
    }

    pub fn excluding_bots(mut self) -> Self {
        self.exclude_bots = true;
        self
    }
}
