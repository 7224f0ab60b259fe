use async_trait::async_trait;

use crate::{
    common::types::VideoId,
    pipeline::source::SourceStream,
    sources::{
        classify::UpstreamError,
        format::AudioFormat,
        models::{SearchResult, VideoDetails},
    },
};

/// Keyword search against the video platform.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Short name used in logs (e.g. "youtube").
    fn name(&self) -> &str;

    /// Returns at most `limit` results in the provider's relevance order.
    /// An empty vector means nothing matched.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>, UpstreamError>;
}

/// Turns a video id into playable formats and opens byte streams for them.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    fn name(&self) -> &str;

    /// Fetches title and candidate formats. Playability problems surface as
    /// classified [`UpstreamError`]s.
    async fn resolve(&self, video_id: &VideoId) -> Result<VideoDetails, UpstreamError>;

    /// Opens the raw media bytes of `format`. The first upstream response
    /// is checked before returning, so access errors surface here rather
    /// than mid-stream.
    async fn open_stream(&self, format: &AudioFormat) -> Result<SourceStream, UpstreamError>;
}
