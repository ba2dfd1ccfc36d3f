//! The recording proxy: lifecycle, recorder and process supervisor.

mod lifecycle;
mod recorder;
mod supervisor;

pub use supervisor::{Supervisor, FAILURE_EXIT_CODE};
