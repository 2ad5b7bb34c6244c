//! The xRegistry bridge: one HTTP process exposing npm, PyPI, Maven
//! Central, OCI and MCP upstreams behind the uniform read-only
//! registry surface.
//!
//! The bridge dispatches each request by group plural to a facade from
//! the ecosystem crates, runs the shared filter/pagination machinery
//! from `xr-core`, and rewrites upstream origins out of every response.

pub mod config;
pub mod handlers;
pub mod problem;
pub mod server;
pub mod state;
pub mod trace;

pub use config::BridgeConfig;
pub use server::build_router;
pub use state::{AppState, build_facades};
