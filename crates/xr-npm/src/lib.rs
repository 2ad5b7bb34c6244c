//! npm facade for the xRegistry bridge.
//!
//! Exposes `registry.npmjs.org` as the `noderegistries` group: the
//! package document becomes a resource, `dist-tags.latest` picks the
//! default version, and the `time` map drives the ancestor chronology.

pub mod facade;
pub mod registry;
mod types;

pub use facade::{DEFAULT_PACKAGES_ESTIMATE, NpmFacade};
pub use registry::{NpmClient, REGISTRY_BASE};
