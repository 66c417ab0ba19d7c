//! Host-facing JSON bridge exposing the search service to UI and CLI callers.

pub mod contract;
pub mod router;
pub mod stdio;

pub use router::HostRouter;
pub use stdio::{run_bridge, run_stdio_bridge};
