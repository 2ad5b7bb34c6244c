use thiserror::Error;

/// Error taxonomy shared by the bridge and every facade.
///
/// Variants mirror the HTTP problem taxonomy the bridge exposes: request
/// errors (`BadRequest`, `Unauthorized`, `NotFound`, `MethodNotAllowed`)
/// and upstream errors (`UpstreamUnavailable`, `RateLimited`,
/// `UpstreamTimeout`, `UpstreamMalformed`). Upstream source errors are
/// flattened into strings so the enum stays `Clone` — single-flight
/// waiters all receive the same failure value.
///
/// # Examples
///
/// ```
/// use xr_core::error::FacadeError;
///
/// let err = FacadeError::NotFound("package express".into());
/// assert_eq!(err.http_status(), 404);
/// assert!(!err.is_retryable());
/// ```
#[derive(Error, Debug, Clone)]
pub enum FacadeError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String },

    #[error("upstream unavailable for {url}: {detail}")]
    UpstreamUnavailable { url: String, detail: String },

    #[error("upstream rate limited: {url}")]
    RateLimited { url: String },

    #[error("upstream call timed out after {seconds}s: {url}")]
    UpstreamTimeout { url: String, seconds: u64 },

    #[error("malformed upstream payload from {url}: {detail}")]
    UpstreamMalformed { url: String, detail: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl FacadeError {
    /// HTTP status the bridge maps this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::MethodNotAllowed { .. } => 405,
            Self::UpstreamUnavailable { .. }
            | Self::RateLimited { .. }
            | Self::UpstreamMalformed { .. } => 502,
            Self::UpstreamTimeout { .. } => 504,
            Self::Internal(_) => 500,
        }
    }

    /// RFC 9457 `title` for the problem body.
    pub fn title(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "Bad Request",
            Self::Unauthorized(_) => "Unauthorized",
            Self::NotFound(_) => "Not Found",
            Self::MethodNotAllowed { .. } => "Method Not Allowed",
            Self::UpstreamUnavailable { .. } => "Upstream Unavailable",
            Self::RateLimited { .. } => "Upstream Rate Limited",
            Self::UpstreamMalformed { .. } => "Upstream Malformed",
            Self::UpstreamTimeout { .. } => "Upstream Timeout",
            Self::Internal(_) => "Internal Server Error",
        }
    }

    /// Whether a cached "warm" value may be served instead of this error.
    ///
    /// Only transient upstream failures qualify; a definite 404 or 429
    /// must propagate so clients see the true upstream state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::UpstreamTimeout { .. }
        )
    }
}

impl From<std::io::Error> for FacadeError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("I/O error: {err}"))
    }
}

impl From<serde_json::Error> for FacadeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, FacadeError>;
