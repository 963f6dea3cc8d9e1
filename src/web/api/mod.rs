pub mod error;
pub mod playback;
pub mod session;
