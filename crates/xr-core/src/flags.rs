use crate::error::{FacadeError, Result};
use crate::page::SortSpec;
use std::collections::BTreeSet;

/// Enumerated values accepted by the `inline` flag.
///
/// Open-ended inline lists collapse to this set; anything else is a
/// 400.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InlineFlag {
    Model,
    Capabilities,
    Endpoints,
    ModelSource,
    All,
}

impl InlineFlag {
    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "model" => Ok(Self::Model),
            "capabilities" => Ok(Self::Capabilities),
            "endpoints" => Ok(Self::Endpoints),
            "modelsource" => Ok(Self::ModelSource),
            "*" => Ok(Self::All),
            other => Err(FacadeError::BadRequest(format!(
                "unknown inline value: {other}"
            ))),
        }
    }
}

/// Query keys the surface understands; anything else is a 400.
const KNOWN_KEYS: &[&str] = &[
    "inline",
    "filter",
    "sort",
    "limit",
    "offset",
    "doc",
    "schema",
    "epoch",
    "noreadonly",
];

/// Typed view of the per-request query flags.
///
/// `limit`/`offset` are parsed separately by [`crate::page::Page`]; the
/// unknown-key check here covers them so each handler validates the
/// query exactly once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFlags {
    pub inline: BTreeSet<InlineFlag>,
    pub filter: Option<String>,
    pub sort: Option<SortSpec>,
    pub doc: bool,
    pub schema: Option<String>,
    pub epoch: Option<u64>,
    pub noreadonly: bool,
}

impl RequestFlags {
    /// Parses query pairs into typed flags, rejecting unknown keys and
    /// malformed values.
    pub fn from_pairs(pairs: &[(String, String)]) -> Result<Self> {
        let mut flags = Self::default();

        for (key, value) in pairs {
            match key.as_str() {
                "inline" => {
                    for part in value.split(',').filter(|p| !p.is_empty()) {
                        flags.inline.insert(InlineFlag::parse(part.trim())?);
                    }
                }
                "filter" => {
                    // Only the first filter expression is honored; see
                    // DESIGN.md on repeated filter params.
                    if flags.filter.is_none() {
                        flags.filter = Some(value.clone());
                    }
                }
                "sort" => {
                    flags.sort = Some(SortSpec::parse(value)?);
                }
                "doc" => {
                    flags.doc = true;
                }
                "schema" => {
                    flags.schema = Some(value.clone());
                }
                "epoch" => {
                    let parsed = value.parse().map_err(|_| {
                        FacadeError::BadRequest(format!("invalid epoch: {value}"))
                    })?;
                    flags.epoch = Some(parsed);
                }
                "noreadonly" => {
                    flags.noreadonly = true;
                }
                "limit" | "offset" => {}
                other => {
                    return Err(FacadeError::BadRequest(format!(
                        "unknown query flag: {other}"
                    )));
                }
            }
        }

        Ok(flags)
    }

    /// Whether `flag` was requested, directly or via `inline=*`.
    pub fn inlines(&self, flag: InlineFlag) -> bool {
        self.inline.contains(&flag) || self.inline.contains(&InlineFlag::All)
    }
}

/// Splits a raw query string into decoded key/value pairs.
///
/// Values keep their raw `+` (filters may contain it); percent-decoding
/// covers the characters the registry surface actually uses.
pub fn query_pairs(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) => (percent_decode(key), percent_decode(value)),
            None => (percent_decode(part), String::new()),
        })
        .collect()
}

fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let (Some(hi), Some(lo)) = (
                bytes.get(i + 1).and_then(|b| (*b as char).to_digit(16)),
                bytes.get(i + 2).and_then(|b| (*b as char).to_digit(16)),
            ) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
