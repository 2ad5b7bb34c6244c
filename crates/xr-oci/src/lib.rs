//! OCI facade for the xRegistry bridge.
//!
//! Exposes Docker Hub as the `containerregistries` group: repositories
//! are `images` resources and tags are versions, ordered by push time.

pub mod facade;
pub mod registry;

pub use facade::{DEFAULT_IMAGES_ESTIMATE, OciFacade};
pub use registry::{HUB_BASE, HubClient, qualified_name};
