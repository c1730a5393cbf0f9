//! Immich API connector implementation
//!
//! Implements `MediaSearchClient` and `CollectionMutator` on top of an injected
//! `HttpClient`.

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::media::{
    BulkAddSummary, CollectionMutator, MediaItem, MediaSearchClient, SearchPage, SearchQuery,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::{ImmichError, Result};
use crate::types::{BulkIdResponse, BulkIdsRequest, MetadataSearchRequest, MetadataSearchResponse};

/// Longest error body kept in an `ApiError` message
const MAX_ERROR_BODY: usize = 512;

/// Immich API connector
///
/// One connector per API key. The connector performs no retries of its own; a
/// failed request surfaces as an error to the caller.
///
/// # Example
///
/// ```ignore
/// use provider_immich::ImmichConnector;
/// use bridge_traits::media::{MediaSearchClient, SearchQuery};
///
/// let connector = ImmichConnector::new(http_client, "http://immich:2283", api_key);
/// let page = connector.search(&SearchQuery { person_ids, updated_after: None, page: 1 }).await?;
/// ```
pub struct ImmichConnector {
    http_client: Arc<dyn HttpClient>,

    /// Server URL including the `/api` suffix
    base_url: String,

    api_key: String,

    request_timeout: Option<Duration>,
}

impl ImmichConnector {
    /// Create a connector for `server_url` (with or without a trailing `/api`).
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        server_url: &str,
        api_key: impl Into<String>,
    ) -> Self {
        let trimmed = server_url.trim_end_matches('/');
        let base_url = if trimmed.ends_with("/api") {
            trimmed.to_string()
        } else {
            format!("{}/api", trimmed)
        };

        Self {
            http_client,
            base_url,
            api_key: api_key.into(),
            request_timeout: None,
        }
    }

    /// Override the HTTP client's timeout for every request made by this connector.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        let request = HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .api_key(self.api_key.as_str())
            .header("Accept", "application/json");

        match self.request_timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;

        if response.is_success() {
            return Ok(response);
        }

        let mut message = response.text_lossy();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }

        warn!(status = response.status, "Immich API request failed");
        Err(ImmichError::ApiError {
            status_code: response.status,
            message,
        })
    }

    /// Run one page of a person-filtered metadata search.
    #[instrument(skip(self, query), fields(page = query.page, persons = query.person_ids.len()))]
    pub async fn search_metadata(&self, query: &SearchQuery) -> Result<SearchPage> {
        let body = MetadataSearchRequest {
            person_ids: query.person_ids.iter().cloned().collect(),
            page: query.page,
            updated_after: query.updated_after.clone(),
            with_people: true,
        };

        let request = self.request(HttpMethod::Post, "/search/metadata").json(&body)?;
        let response = self.send(request).await?;

        let parsed: MetadataSearchResponse = serde_json::from_slice(&response.body)
            .map_err(|e| ImmichError::ParseError(format!("search response: {}", e)))?;

        let next_page = parse_page_token(parsed.assets.next_page)?;
        let items: Vec<MediaItem> = parsed.assets.items.into_iter().map(Into::into).collect();

        debug!(
            items = items.len(),
            next_page = ?next_page,
            total = ?parsed.assets.total,
            "Fetched search page"
        );

        Ok(SearchPage { items, next_page })
    }

    /// Add assets to an album in a single request.
    #[instrument(skip(self, asset_ids), fields(album_id = %album_id, assets = asset_ids.len()))]
    pub async fn add_assets_to_album(
        &self,
        album_id: &str,
        asset_ids: &[String],
    ) -> Result<BulkAddSummary> {
        if asset_ids.is_empty() {
            return Ok(BulkAddSummary::default());
        }

        let path = format!("/albums/{}/assets", urlencoding::encode(album_id));
        let request = self
            .request(HttpMethod::Put, &path)
            .json(&BulkIdsRequest { ids: asset_ids })?;
        let response = self.send(request).await?;

        // The per-id breakdown is informational; an unexpected body is not a failure.
        let summary = match serde_json::from_slice::<Vec<BulkIdResponse>>(&response.body) {
            Ok(results) => summarize(&results),
            Err(e) => {
                debug!(error = %e, "Unrecognised bulk add response body");
                BulkAddSummary {
                    added: asset_ids.len(),
                    ..BulkAddSummary::default()
                }
            }
        };

        if summary.failed > 0 {
            warn!(failed = summary.failed, "Some assets were rejected by the album");
        }

        Ok(summary)
    }
}

/// Immich encodes the next page as a decimal string.
fn parse_page_token(token: Option<String>) -> Result<Option<u32>> {
    match token {
        None => Ok(None),
        Some(token) => match token.trim().parse::<u32>() {
            Ok(page) if page > 0 => Ok(Some(page)),
            _ => Err(ImmichError::InvalidPageToken(token)),
        },
    }
}

fn summarize(results: &[BulkIdResponse]) -> BulkAddSummary {
    results
        .iter()
        .fold(BulkAddSummary::default(), |mut summary, result| {
            if result.success {
                summary.added += 1;
            } else if result.is_duplicate() {
                summary.duplicates += 1;
            } else {
                summary.failed += 1;
            }
            summary
        })
}

#[async_trait]
impl MediaSearchClient for ImmichConnector {
    async fn search(&self, query: &SearchQuery) -> bridge_traits::error::Result<SearchPage> {
        Ok(self.search_metadata(query).await?)
    }
}

#[async_trait]
impl CollectionMutator for ImmichConnector {
    async fn add_to_collection(
        &self,
        collection_id: &str,
        media_ids: &[String],
    ) -> bridge_traits::error::Result<BulkAddSummary> {
        Ok(self.add_assets_to_album(collection_id, media_ids).await?)
    }
}
