//! Chat surface adapters.

mod channel_surface;

pub use channel_surface::ChannelSurface;
