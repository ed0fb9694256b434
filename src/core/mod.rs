//! Process-wide runtime state.

mod state;

pub use state::{is_shutdown, register_shutdown_channel, setup_shutdown_handler};
