//! Online catalog client: search, stream resolution, lyrics.

pub mod api;
pub mod models;
pub mod retry;

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use thiserror::Error;

pub use api::CatalogClient;
pub use models::{MusicDetails, Quality};

use crate::library::track::Track;

/// Catalog client errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network-layer failure (including HTTP 5xx). Retryable.
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The catalog reports the track unavailable at the requested quality.
    /// Not retryable; the download pipeline falls back one quality tier.
    #[error("track {id} unavailable: {message}")]
    Unavailable { id: u64, message: String },

    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),
}

impl CatalogError {
    /// Whether a retry within the client's budget could help.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Byte stream of a track payload, chunked as delivered by the transport.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, CatalogError>> + Send>>;

/// The catalog contract the download pipeline and orchestrator depend on.
///
/// `CatalogClient` is the production implementation; tests substitute fakes.
pub trait Catalog: Send + Sync {
    /// Search the catalog. Failures surface immediately (no retry); an empty
    /// result set is not an error.
    fn search(
        &self,
        keyword: &str,
        page: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<Track>, CatalogError>> + Send;

    /// Resolve a streaming URI and size for a track at a quality tier.
    fn music_details(
        &self,
        id: u64,
        quality: Quality,
    ) -> impl Future<Output = Result<MusicDetails, CatalogError>> + Send;

    /// Fetch LRC lyrics. `Ok(None)` means the catalog has none, which is
    /// distinct from a transport failure.
    fn lyrics(&self, id: u64) -> impl Future<Output = Result<Option<String>, CatalogError>> + Send;

    /// Open the payload stream behind a resolved URI.
    fn fetch_stream(
        &self,
        uri: &str,
    ) -> impl Future<Output = Result<ByteStream, CatalogError>> + Send;
}
