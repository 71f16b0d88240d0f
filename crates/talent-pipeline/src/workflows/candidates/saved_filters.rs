use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use base64::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::filter::FilterState;
use super::repository::StoreError;

const SHARE_PARAM: &str = "filter";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SavedFilterId(pub Uuid);

impl fmt::Display for SavedFilterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SavedFilterId {
    type Err = uuid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim()).map(Self)
    }
}

/// Named filter preset owned by the registry, not by any session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedFilter {
    pub id: SavedFilterId,
    pub name: String,
    pub filters: FilterState,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_shared: bool,
}

/// Persistence for saved filters.
pub trait SavedFilterStore: Send + Sync {
    fn list_saved(&self) -> Result<Vec<SavedFilter>, StoreError>;
    fn fetch_saved(&self, id: &SavedFilterId) -> Result<Option<SavedFilter>, StoreError>;
    fn insert_saved(&self, filter: &SavedFilter) -> Result<(), StoreError>;
    fn update_saved(&self, filter: &SavedFilter) -> Result<(), StoreError>;
    fn delete_saved(&self, id: &SavedFilterId) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SavedFilterError {
    #[error("saved filter name must not be blank")]
    BlankName,
    #[error("saved filter {0} not found")]
    NotFound(SavedFilterId),
    #[error("share link has no `filter` parameter")]
    MissingParameter,
    #[error("share link payload is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("share link payload is not a filter: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// URL that carries a complete [`FilterState`] in its query string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ShareLink(String);

impl ShareLink {
    pub fn encode(base_url: &str, filters: &FilterState) -> Result<Self, SavedFilterError> {
        let payload = serde_json::to_vec(filters)?;
        let encoded = BASE64_URL_SAFE_NO_PAD.encode(payload);
        let separator = if base_url.contains('?') { '&' } else { '?' };
        Ok(Self(format!("{base_url}{separator}{SHARE_PARAM}={encoded}")))
    }

    pub fn decode(link: &str) -> Result<FilterState, SavedFilterError> {
        let query = link
            .split_once('?')
            .map_or(link, |(_, query)| query)
            .split('#')
            .next()
            .unwrap_or_default();
        let encoded = query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .find(|(key, _)| *key == SHARE_PARAM)
            .map(|(_, value)| value)
            .ok_or(SavedFilterError::MissingParameter)?;

        let payload = BASE64_URL_SAFE_NO_PAD.decode(encoded)?;
        Ok(serde_json::from_slice(&payload)?)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rebuilds the filter embedded in a share link without consulting any registry.
pub fn load_shared(link: &str) -> Result<FilterState, SavedFilterError> {
    ShareLink::decode(link)
}

pub struct SavedFilterRegistry<S: ?Sized> {
    store: Arc<S>,
    share_base_url: String,
}

impl<S> SavedFilterRegistry<S>
where
    S: SavedFilterStore + ?Sized,
{
    pub fn new(store: Arc<S>, share_base_url: impl Into<String>) -> Self {
        Self {
            store,
            share_base_url: share_base_url.into(),
        }
    }

    pub fn save(
        &self,
        name: &str,
        filters: FilterState,
        now: DateTime<Utc>,
    ) -> Result<SavedFilter, SavedFilterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SavedFilterError::BlankName);
        }

        let saved = SavedFilter {
            id: SavedFilterId(Uuid::new_v4()),
            name: name.to_string(),
            filters,
            created_at: now,
            is_shared: false,
        };
        self.store.insert_saved(&saved)?;
        info!(saved_filter = %saved.id, name = %saved.name, "filter saved");
        Ok(saved)
    }

    pub fn delete(&self, id: &SavedFilterId) -> Result<(), SavedFilterError> {
        self.fetch(id)?;
        self.store.delete_saved(id)?;
        Ok(())
    }

    pub fn load(&self, id: &SavedFilterId) -> Result<FilterState, SavedFilterError> {
        Ok(self.fetch(id)?.filters)
    }

    /// Builds the share link and marks the entry as shared.
    pub fn share(&self, id: &SavedFilterId) -> Result<ShareLink, SavedFilterError> {
        let mut saved = self.fetch(id)?;
        let link = ShareLink::encode(&self.share_base_url, &saved.filters)?;
        if !saved.is_shared {
            saved.is_shared = true;
            self.store.update_saved(&saved)?;
        }
        Ok(link)
    }

    /// Every saved filter in creation order.
    pub fn list(&self) -> Result<Vec<SavedFilter>, SavedFilterError> {
        let mut saved = self.store.list_saved()?;
        saved.sort_by_key(|entry| entry.created_at);
        Ok(saved)
    }

    fn fetch(&self, id: &SavedFilterId) -> Result<SavedFilter, SavedFilterError> {
        self.store
            .fetch_saved(id)?
            .ok_or(SavedFilterError::NotFound(*id))
    }
}
