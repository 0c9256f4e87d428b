//! Communication channels (Signal).
//!
//! The channel connector turns transport envelopes into [`InboundMessage`]s for the
//! bridge, and [`ChannelHandle`] is the outbound side used to deliver replies.

mod envelope;
mod handle;
mod inbound;
mod signal;

pub use envelope::parse_envelope;
pub use handle::{ChannelError, ChannelHandle};
pub use inbound::InboundMessage;
pub use signal::SignalChannel;
