//! Newline-delimited JSON-RPC framing and classification.

mod classify;
mod framer;

pub use classify::{classify, Classified, CorrelationId};
pub use framer::FrameSplitter;
