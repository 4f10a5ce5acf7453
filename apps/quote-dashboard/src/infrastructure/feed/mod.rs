//! Feed Adapters
//!
//! Everything between the external market data bridge and the dashboard
//! session:
//!
//! - `codec`: NDJSON envelope decoding
//! - `source`: Line-oriented [`FeedSource`](crate::application::ports::FeedSource)
//!   over stdin, files or any async reader
//! - `bridge`: Routes decoded events into the session and tracks stats

mod bridge;
mod codec;
mod source;

pub use bridge::{BridgeState, BridgeStats, FeedBridge};
pub use codec::{CodecError, EnvelopeCodec, IGNORED_EVENTS};
pub use source::LineFeedSource;
