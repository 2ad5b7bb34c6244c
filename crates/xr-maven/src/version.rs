//! Maven version ordering.
//!
//! Implements the ordering of Maven's `ComparableVersion` for the
//! common qualifier set: versions are tokenized on `.`, `-` and
//! digit/letter transitions, numeric tokens compare numerically, and
//! qualifiers rank `alpha < beta < milestone < rc < snapshot < release
//! < sp`, with unknown qualifiers after `sp` in lexical order. Shorter
//! versions are padded with release markers, so `1.0` equals `1.0.0`.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(u64),
    Qual(String),
    /// Implicit padding for the shorter version; behaves as `0` against
    /// numbers and as the release marker against qualifiers.
    Pad,
}

const RELEASE_RANK: u8 = 5;

fn qualifier_rank(q: &str) -> u8 {
    match q {
        "alpha" => 0,
        "beta" => 1,
        "milestone" => 2,
        "rc" | "cr" => 3,
        "snapshot" => 4,
        "" | "ga" | "final" | "release" => RELEASE_RANK,
        "sp" => 6,
        _ => 7,
    }
}

/// Splits a version string into comparison tokens.
///
/// Single-letter shorthands directly followed by a number expand the
/// Maven way: `1.0a1` reads as `1.0-alpha-1`.
fn tokenize(version: &str) -> Vec<Token> {
    let lower = version.to_lowercase();
    let mut raw: Vec<String> = Vec::new();

    for part in lower.split(['.', '-']) {
        if part.is_empty() {
            raw.push(String::new());
            continue;
        }
        let mut current = String::new();
        let mut last_is_digit: Option<bool> = None;
        for c in part.chars() {
            let is_digit = c.is_ascii_digit();
            if last_is_digit.is_some_and(|last| last != is_digit) {
                raw.push(std::mem::take(&mut current));
            }
            current.push(c);
            last_is_digit = Some(is_digit);
        }
        raw.push(current);
    }

    let mut tokens = Vec::with_capacity(raw.len());
    for (i, part) in raw.iter().enumerate() {
        if let Ok(n) = part.parse::<u64>() {
            tokens.push(Token::Num(n));
            continue;
        }
        let followed_by_number = raw
            .get(i + 1)
            .is_some_and(|next| next.parse::<u64>().is_ok());
        let qualifier = match part.as_str() {
            "a" if followed_by_number => "alpha",
            "b" if followed_by_number => "beta",
            "m" if followed_by_number => "milestone",
            other => other,
        };
        tokens.push(Token::Qual(qualifier.to_string()));
    }
    tokens
}

fn compare_tokens(a: &Token, b: &Token) -> Ordering {
    match (a, b) {
        (Token::Num(x), Token::Num(y)) => x.cmp(y),
        (Token::Num(0), Token::Pad) | (Token::Pad, Token::Num(0)) => Ordering::Equal,
        (Token::Num(_), Token::Pad) => Ordering::Greater,
        (Token::Pad, Token::Num(_)) => Ordering::Less,
        // Numbers outrank any qualifier.
        (Token::Num(_), Token::Qual(_)) => Ordering::Greater,
        (Token::Qual(_), Token::Num(_)) => Ordering::Less,
        (Token::Pad, Token::Pad) => Ordering::Equal,
        (Token::Qual(x), Token::Qual(y)) => qualifier_rank(x)
            .cmp(&qualifier_rank(y))
            .then_with(|| x.cmp(y)),
        (Token::Qual(x), Token::Pad) => qualifier_rank(x).cmp(&RELEASE_RANK),
        (Token::Pad, Token::Qual(y)) => RELEASE_RANK.cmp(&qualifier_rank(y)),
    }
}

/// Compares two Maven versions.
///
/// # Examples
///
/// ```
/// use std::cmp::Ordering;
/// use xr_maven::version::compare_maven_versions;
///
/// assert_eq!(compare_maven_versions("1.0-alpha", "1.0"), Ordering::Less);
/// assert_eq!(compare_maven_versions("1.10", "1.9"), Ordering::Greater);
/// assert_eq!(compare_maven_versions("1.0", "1.0.0"), Ordering::Equal);
/// ```
pub fn compare_maven_versions(a: &str, b: &str) -> Ordering {
    let ta = tokenize(a);
    let tb = tokenize(b);
    let len = ta.len().max(tb.len());

    for i in 0..len {
        let x = ta.get(i).unwrap_or(&Token::Pad);
        let y = tb.get(i).unwrap_or(&Token::Pad);
        let ordering = compare_tokens(x, y);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
