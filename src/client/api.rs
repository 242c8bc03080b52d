//! Catalog API client implementation.

use futures::{StreamExt, TryStreamExt};
use reqwest::Client;

use super::models::*;
use super::retry::RetryPolicy;
use super::{ByteStream, Catalog, CatalogError};
use crate::config::CatalogConfig;
use crate::library::track::Track;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.36";

/// Online catalog API client.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    /// HTTP client, shared across all requests
    client: Client,

    /// Search endpoint URL
    search_url: String,

    /// Stream-resolution endpoint URL
    details_url: String,

    /// Lyrics endpoint URL
    lyrics_url: String,

    /// Retry policy for details/lyrics (search is never retried)
    retry: RetryPolicy,
}

impl CatalogClient {
    /// Create a new catalog client from configuration.
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            client: Client::new(),
            search_url: config.search_url.trim_end_matches('/').to_string(),
            details_url: config.details_url.trim_end_matches('/').to_string(),
            lyrics_url: config.lyrics_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    async fn get_details_once(
        &self,
        id: u64,
        quality: Quality,
    ) -> Result<MusicDetails, CatalogError> {
        let response = self
            .client
            .get(&self.details_url)
            .query(&[("id", id.to_string()), ("quality", quality.level().to_string())])
            .send()
            .await?
            .error_for_status()?;

        let parsed: DetailsResponse = response.json().await?;

        // A well-formed response without a URL means the catalog cannot serve
        // this track at this quality. Retrying would not change that.
        let data = match parsed.data {
            Some(data) if parsed.code == 200 => data,
            _ => {
                return Err(CatalogError::Unavailable {
                    id,
                    message: parsed
                        .message
                        .unwrap_or_else(|| String::from("no stream URL")),
                })
            }
        };

        let uri = data.url.ok_or(CatalogError::Unavailable {
            id,
            message: String::from("no stream URL"),
        })?;

        Ok(MusicDetails {
            uri,
            size: data.size,
            bitrate: data.br,
            cover: data.cover,
        })
    }

    async fn get_lyrics_once(&self, id: u64) -> Result<Option<String>, CatalogError> {
        let response = self
            .client
            .get(&self.lyrics_url)
            .query(&[("id", id.to_string())])
            .send()
            .await?
            .error_for_status()?;

        let parsed: LyricsResponse = response.json().await?;

        if parsed.code != 200 {
            tracing::warn!(
                "catalog returned no lyrics for {id}: {}",
                parsed.message.as_deref().unwrap_or("unknown")
            );
            return Ok(None);
        }

        Ok(parsed.data.and_then(|d| d.lrc).filter(|l| !l.is_empty()))
    }
}

impl Catalog for CatalogClient {
    async fn search(
        &self,
        keyword: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<Track>, CatalogError> {
        let offset = page.saturating_sub(1) * limit;

        let response = self
            .client
            .get(&self.search_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[
                ("s", keyword.to_string()),
                ("type", String::from("1")),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let parsed: SearchResponse = response.json().await?;

        if parsed.code != 200 {
            return Err(CatalogError::InvalidResponse(format!(
                "search returned code {}",
                parsed.code
            )));
        }

        // Blank result set is a normal outcome, not an error.
        let songs = parsed.result.map(|r| r.songs).unwrap_or_default();
        Ok(songs.into_iter().map(Track::from).collect())
    }

    async fn music_details(&self, id: u64, quality: Quality) -> Result<MusicDetails, CatalogError> {
        self.retry
            .run(
                |_attempt| self.get_details_once(id, quality),
                CatalogError::is_transient,
            )
            .await
    }

    async fn lyrics(&self, id: u64) -> Result<Option<String>, CatalogError> {
        self.retry
            .run(|_attempt| self.get_lyrics_once(id), CatalogError::is_transient)
            .await
    }

    async fn fetch_stream(&self, uri: &str) -> Result<ByteStream, CatalogError> {
        let response = self.client.get(uri).send().await?.error_for_status()?;

        let stream = response
            .bytes_stream()
            .map_err(CatalogError::from)
            .map(|chunk| chunk.map(|b| b.to_vec()));

        Ok(Box::pin(stream))
    }
}
