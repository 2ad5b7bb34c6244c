use crate::error::{FacadeError, Result};

/// Default page size for collection endpoints.
pub const DEFAULT_LIMIT: usize = 20;

/// Validated `limit`/`offset` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Parses `limit` and `offset` out of query pairs.
    ///
    /// `limit` must be a positive integer (`limit=0` and negatives are
    /// rejected, not clamped); `offset` must be non-negative. Both
    /// default when absent.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self> {
        let mut page = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "limit" => {
                    let parsed: i64 = value
                        .parse()
                        .map_err(|_| FacadeError::BadRequest(format!("invalid limit: {value}")))?;
                    if parsed <= 0 {
                        return Err(FacadeError::BadRequest(
                            "limit must be at least 1".to_string(),
                        ));
                    }
                    page.limit = parsed as usize;
                }
                "offset" => {
                    let parsed: i64 = value
                        .parse()
                        .map_err(|_| FacadeError::BadRequest(format!("invalid offset: {value}")))?;
                    if parsed < 0 {
                        return Err(FacadeError::BadRequest(
                            "offset must not be negative".to_string(),
                        ));
                    }
                    page.offset = parsed as usize;
                }
                _ => {}
            }
        }

        Ok(page)
    }

    /// The `[start, end)` slice bounds of this page over `len` items.
    pub fn bounds(&self, len: usize) -> (usize, usize) {
        let start = self.offset.min(len);
        let end = self.offset.saturating_add(self.limit).min(len);
        (start, end)
    }

    /// Number of survivors after which two-step evaluation may stop.
    pub fn needed(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }
}

/// Parsed `sort=<field>[=asc|desc]` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub ascending: bool,
}

impl SortSpec {
    /// Parses the sort flag value. Direction defaults to ascending.
    pub fn parse(raw: &str) -> Result<Self> {
        let (field, direction) = match raw.split_once('=') {
            Some((field, direction)) => (field, Some(direction)),
            None => (raw, None),
        };

        if field.is_empty() {
            return Err(FacadeError::BadRequest("sort field must not be empty".into()));
        }

        let ascending = match direction {
            None | Some("asc") => true,
            Some("desc") => false,
            Some(other) => {
                return Err(FacadeError::BadRequest(format!(
                    "invalid sort direction: {other}"
                )));
            }
        };

        Ok(Self {
            field: field.to_string(),
            ascending,
        })
    }
}

/// Builds the `Link: <...>; rel="next"` value for the page after `page`.
///
/// The query string is rebuilt from the original pairs with `offset`
/// advanced by one page; a missing `limit`/`offset` is materialized so
/// the link is self-contained.
pub fn next_link(base: &str, path: &str, pairs: &[(String, String)], page: Page) -> String {
    let next_offset = page.offset.saturating_add(page.limit);

    let mut query: Vec<(String, String)> = Vec::with_capacity(pairs.len() + 2);
    let mut saw_limit = false;
    let mut saw_offset = false;
    for (key, value) in pairs {
        match key.as_str() {
            "limit" => {
                saw_limit = true;
                query.push((key.clone(), page.limit.to_string()));
            }
            "offset" => {
                saw_offset = true;
                query.push((key.clone(), next_offset.to_string()));
            }
            _ => query.push((key.clone(), value.clone())),
        }
    }
    if !saw_limit {
        query.push(("limit".into(), page.limit.to_string()));
    }
    if !saw_offset {
        query.push(("offset".into(), next_offset.to_string()));
    }

    let rendered: Vec<String> = query
        .iter()
        .map(|(k, v)| {
            if v.is_empty() {
                k.clone()
            } else {
                format!("{k}={v}")
            }
        })
        .collect();

    format!("<{base}{path}?{}>; rel=\"next\"", rendered.join("&"))
}
