pub mod base;
pub mod delivery;
pub mod logging;
pub mod server;
pub mod transcoder;
pub mod youtube;
pub mod ytdlp;

pub use base::*;
pub use delivery::*;
pub use logging::*;
pub use server::*;
pub use transcoder::*;
pub use youtube::*;
pub use ytdlp::*;
