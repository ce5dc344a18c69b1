//! Headless controller for a profiler UI: options codec, request
//! coordination with stale-response discard, and render dispatch.

pub mod bindings;
pub mod browser;
pub mod bus;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod fixture_server;
pub mod format;
pub mod logging;
pub mod options;
pub mod render;
pub mod shell;
pub mod transport;
