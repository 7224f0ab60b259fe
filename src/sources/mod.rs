pub mod classify;
pub mod format;
pub mod models;
pub mod plugin;
pub mod youtube;
pub mod ytdlp;

pub use classify::{UpstreamError, UpstreamKind};
pub use plugin::{MediaResolver, SearchProvider};
