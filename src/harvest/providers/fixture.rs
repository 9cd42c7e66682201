// src/harvest/providers/fixture.rs
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::harvest::error::ClientError;
use crate::harvest::types::{RawMember, RemoteSourceClient, SourceHandle};

/// Scripted failure attached to a fixture source.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum FixtureFailure {
    /// Resolve fails with `SourceNotFound`.
    NotFound,
    /// Resolve fails with `SourceForbidden`.
    Forbidden,
    /// Fetches at or past `at_offset` are rate limited.
    RateLimited {
        retry_after_secs: u64,
        #[serde(default)]
        at_offset: usize,
    },
    Transient {
        #[serde(default)]
        at_offset: usize,
    },
    /// Fetches at or past `at_offset` fail as if the session died.
    Fatal {
        #[serde(default)]
        at_offset: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureSource {
    pub handle: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub members: Vec<RawMember>,
    #[serde(default)]
    pub failure: Option<FixtureFailure>,
}

impl FixtureSource {
    pub fn new(handle: &str, members: Vec<RawMember>) -> Self {
        Self {
            handle: handle.to_string(),
            title: None,
            members,
            failure: None,
        }
    }

    pub fn failing(mut self, failure: FixtureFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    fn title(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.handle.clone())
    }
}

#[derive(Debug, Deserialize)]
struct FixtureFile {
    sources: Vec<FixtureSource>,
}

/// In-memory client over a fixed set of sources; pages are slices of `members`.
pub struct FixtureClient {
    sources: Vec<FixtureSource>,
}

impl FixtureClient {
    pub fn from_sources(sources: Vec<FixtureSource>) -> Self {
        Self { sources }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let f: FixtureFile = serde_json::from_str(s).context("parsing fixture sources json")?;
        Ok(Self::from_sources(f.sources))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture sources from {}", path.display()))?;
        Self::from_json_str(&content)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn find(&self, id: &str) -> Option<&FixtureSource> {
        self.sources
            .iter()
            .find(|s| s.handle.eq_ignore_ascii_case(id))
    }
}

#[async_trait]
impl RemoteSourceClient for FixtureClient {
    async fn resolve(&self, identifier: &str) -> Result<SourceHandle, ClientError> {
        let src = self
            .find(identifier)
            .ok_or_else(|| ClientError::SourceNotFound(identifier.to_string()))?;
        match src.failure {
            Some(FixtureFailure::NotFound) => {
                Err(ClientError::SourceNotFound(identifier.to_string()))
            }
            Some(FixtureFailure::Forbidden) => {
                Err(ClientError::SourceForbidden(identifier.to_string()))
            }
            _ => Ok(SourceHandle {
                id: src.handle.clone(),
                title: src.title(),
            }),
        }
    }

    async fn fetch_page(
        &self,
        handle: &SourceHandle,
        offset: usize,
        page_size: usize,
    ) -> Result<Vec<RawMember>, ClientError> {
        let src = self
            .find(&handle.id)
            .ok_or_else(|| ClientError::Transient(format!("source {} vanished", handle.id)))?;

        match &src.failure {
            Some(FixtureFailure::RateLimited {
                retry_after_secs,
                at_offset,
            }) if offset >= *at_offset => {
                return Err(ClientError::RateLimited {
                    retry_after_secs: *retry_after_secs,
                })
            }
            Some(FixtureFailure::Transient { at_offset }) if offset >= *at_offset => {
                return Err(ClientError::Transient("connection reset".into()))
            }
            Some(FixtureFailure::Fatal { at_offset }) if offset >= *at_offset => {
                return Err(ClientError::Fatal("session is not authorized".into()))
            }
            _ => {}
        }

        let start = offset.min(src.members.len());
        let end = offset.saturating_add(page_size).min(src.members.len());
        Ok(src.members[start..end].to_vec())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
