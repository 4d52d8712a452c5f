//! Concrete audio outputs.

mod channel;
mod encoder;
#[cfg(feature = "local-playback")]
mod playback;

pub use channel::ChannelSink;
pub use encoder::EncoderSink;
#[cfg(feature = "local-playback")]
pub use playback::PreviewSink;
