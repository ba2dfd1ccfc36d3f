//! Child process spawning and signal relay.

mod signal;
mod spawn;

pub use signal::{forward, SignalListener};
pub use spawn::{spawn_piped, ProcessOptions};
