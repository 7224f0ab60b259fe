pub mod common;
pub mod configs;
pub mod pipeline;
pub mod server;
pub mod sources;
pub mod transport;
