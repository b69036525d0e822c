use serde_json::Value;
use snap_core::{ItemId, Source};
use thiserror::Error;

use crate::ItemPayload;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// One media reference inside a payload and where its staged key goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSlot {
    /// JSON pointer to the object holding the reference, e.g. `/medias/0`.
    pub owner: String,
    /// Field written on `owner` with the staged key, or `null` on failure.
    pub key_field: String,
    pub url: String,
    pub target_key: String,
}

/// Everything that differs between harvested sites.
///
/// The orchestrator, discoverer and processor only talk to this trait, so
/// adding a site means adding one implementation.
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> &Source;

    /// Newest-first listing page.
    fn listing_url(&self) -> &str;

    /// CSS selector matching item links on the listing.
    fn item_link_selector(&self) -> &str;

    fn item_id_from_href(&self, href: &str) -> Option<ItemId>;

    fn item_url(&self, item_id: &ItemId) -> String;

    /// Pulls the embedded structured record out of an item page.
    fn extract_payload(&self, item_id: &ItemId, page: &str) -> Result<ItemPayload, ParseError>;

    fn related_ids(&self, payload: &ItemPayload) -> Vec<String>;

    /// One URL resolving every id at once; `None` when `ids` is empty.
    fn related_lookup_url(&self, ids: &[String]) -> Option<String>;

    fn parse_related(&self, body: &str) -> Result<Vec<Value>, ParseError>;

    fn attach_related(&self, payload: &mut ItemPayload, related: Vec<Value>);

    fn media_slots(&self, item_id: &ItemId, payload: &ItemPayload) -> Vec<MediaSlot>;
}
