//! Immich API request and response types
//!
//! Only the fields the sync needs are modelled; everything else in the
//! payloads is ignored on deserialization.

use bridge_traits::media::MediaItem;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/search/metadata`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSearchRequest {
    /// Assets containing ANY of these people
    pub person_ids: Vec<String>,

    /// 1-based page number
    pub page: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_after: Option<String>,

    /// Ask the server to include recognised people on each asset
    pub with_people: bool,
}

/// Response of `POST /api/search/metadata`
#[derive(Debug, Deserialize)]
pub struct MetadataSearchResponse {
    pub assets: AssetPage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPage {
    #[serde(default)]
    pub items: Vec<AssetResponse>,

    /// Next page number as a string, `null` on the last page
    #[serde(default)]
    pub next_page: Option<String>,

    #[serde(default)]
    pub total: Option<u64>,
}

/// Asset resource (subset)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetResponse {
    pub id: String,

    /// Last update time (RFC 3339)
    pub updated_at: String,

    /// Present only when the search asked for people
    #[serde(default)]
    pub people: Option<Vec<PersonResponse>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonResponse {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,
}

impl From<AssetResponse> for MediaItem {
    fn from(asset: AssetResponse) -> Self {
        let people = asset.people.unwrap_or_default();
        MediaItem::new(asset.id, asset.updated_at).with_people(people.into_iter().map(|p| p.id))
    }
}

/// Body of `PUT /api/albums/{id}/assets`
#[derive(Debug, Clone, Serialize)]
pub struct BulkIdsRequest<'a> {
    pub ids: &'a [String],
}

/// One entry of the bulk add response
#[derive(Debug, Clone, Deserialize)]
pub struct BulkIdResponse {
    pub id: String,
    pub success: bool,

    /// `duplicate`, `no_permission`, `not_found` or `unknown`
    #[serde(default)]
    pub error: Option<String>,
}

impl BulkIdResponse {
    pub fn is_duplicate(&self) -> bool {
        self.error.as_deref() == Some("duplicate")
    }
}
