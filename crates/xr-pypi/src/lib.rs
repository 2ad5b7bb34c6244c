//! PyPI facade for the xRegistry bridge.
//!
//! Exposes `pypi.org` as the `pythonregistries` group. Names follow
//! PEP 503 normalization, version ordering follows PEP 440, and the
//! simple index (PEP 691 JSON) provides the name corpus.

pub mod facade;
pub mod registry;

pub use facade::{DEFAULT_PACKAGES_ESTIMATE, PypiFacade};
pub use registry::{PYPI_BASE, PypiClient, normalize_package_name};
