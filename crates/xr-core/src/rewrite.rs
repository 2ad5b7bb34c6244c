use regex::Regex;
use serde_json::Value;

/// Keys whose values are canonical identifiers and must never be
/// rewritten, even when they look like upstream URLs.
const SKIP_KEYS: &[&str] = &["xid"];

/// Recursively replaces upstream-origin URL prefixes in `value` with the
/// bridge-visible base URL.
///
/// Only strings that *begin* with `upstream_origin` are touched; the
/// remainder of the string (path, query) is preserved. Members named
/// `xid` are skipped wholesale. The shaped documents are trees, so no
/// cycle guard is needed; the recursion is bounded by document depth.
///
/// Rewriting is idempotent: a value that already carries `base` does not
/// start with `upstream_origin` and passes through unchanged.
pub fn rewrite_value(value: &mut Value, upstream_origin: &str, base: &str) {
    match value {
        Value::String(s) => {
            if let Some(rest) = s.strip_prefix(upstream_origin) {
                *s = format!("{base}{rest}");
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_value(item, upstream_origin, base);
            }
        }
        Value::Object(map) => {
            for (key, member) in map.iter_mut() {
                if SKIP_KEYS.contains(&key.as_str()) {
                    continue;
                }
                rewrite_value(member, upstream_origin, base);
            }
        }
        _ => {}
    }
}

/// Rewrites every occurrence of the upstream origin inside a `Link`
/// header value.
///
/// Unlike body rewriting this is a global substitution: a Link header
/// carries several `<url>; rel=...` entries and the origin can appear in
/// any of them.
pub fn rewrite_link_header(link: &str, upstream_origin: &str, base: &str) -> String {
    match Regex::new(&regex::escape(upstream_origin)) {
        Ok(pattern) => pattern.replace_all(link, base).into_owned(),
        Err(_) => link.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const UPSTREAM: &str = "https://registry.npmjs.org";
    const BASE: &str = "https://bridge.example/noderegistries/npmjs.org";

    #[test]
    fn test_rewrites_prefixed_strings() {
        let mut doc = json!({
            "tarball": "https://registry.npmjs.org/express/-/express-4.18.2.tgz",
            "homepage": "http://expressjs.com/",
        });
        rewrite_value(&mut doc, UPSTREAM, BASE);

        assert_eq!(
            doc["tarball"],
            "https://bridge.example/noderegistries/npmjs.org/express/-/express-4.18.2.tgz"
        );
        assert_eq!(doc["homepage"], "http://expressjs.com/");
    }

    #[test]
    fn test_xid_is_never_rewritten() {
        let mut doc = json!({
            "xid": "https://registry.npmjs.org/looks-like-a-url",
            "self": "https://registry.npmjs.org/looks-like-a-url",
        });
        rewrite_value(&mut doc, UPSTREAM, BASE);

        assert_eq!(doc["xid"], "https://registry.npmjs.org/looks-like-a-url");
        assert_eq!(
            doc["self"],
            "https://bridge.example/noderegistries/npmjs.org/looks-like-a-url"
        );
    }

    #[test]
    fn test_xid_subtree_is_skipped_entirely() {
        let mut doc = json!({
            "xid": {"nested": "https://registry.npmjs.org/x"},
        });
        rewrite_value(&mut doc, UPSTREAM, BASE);
        assert_eq!(doc["xid"]["nested"], "https://registry.npmjs.org/x");
    }

    #[test]
    fn test_recurses_into_arrays_and_objects() {
        let mut doc = json!({
            "versions": {
                "1.0.0": {
                    "dist": {"tarball": "https://registry.npmjs.org/a/-/a-1.0.0.tgz"},
                },
            },
            "urls": ["https://registry.npmjs.org/a", "https://other.example/b"],
        });
        rewrite_value(&mut doc, UPSTREAM, BASE);

        assert_eq!(
            doc["versions"]["1.0.0"]["dist"]["tarball"],
            format!("{BASE}/a/-/a-1.0.0.tgz")
        );
        assert_eq!(doc["urls"][0], format!("{BASE}/a"));
        assert_eq!(doc["urls"][1], "https://other.example/b");
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let mut doc = json!({
            "tarball": "https://registry.npmjs.org/a/-/a.tgz",
        });
        rewrite_value(&mut doc, UPSTREAM, BASE);
        let once = doc.clone();
        rewrite_value(&mut doc, UPSTREAM, BASE);
        assert_eq!(doc, once);
    }

    #[test]
    fn test_mid_string_origin_is_untouched() {
        let mut doc = json!({
            "readme": "see https://registry.npmjs.org/express for details",
        });
        rewrite_value(&mut doc, UPSTREAM, BASE);
        assert_eq!(
            doc["readme"],
            "see https://registry.npmjs.org/express for details"
        );
    }

    #[test]
    fn test_non_string_leaves_pass_through() {
        let mut doc = json!({"count": 3, "flag": true, "nothing": null});
        let before = doc.clone();
        rewrite_value(&mut doc, UPSTREAM, BASE);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_link_header_rewrite_is_global() {
        let link = "<https://registry.npmjs.org/a?page=2>; rel=\"next\", <https://registry.npmjs.org/a?page=9>; rel=\"last\"";
        let rewritten = rewrite_link_header(link, UPSTREAM, BASE);
        assert_eq!(
            rewritten,
            format!("<{BASE}/a?page=2>; rel=\"next\", <{BASE}/a?page=9>; rel=\"last\"")
        );
    }

    #[test]
    fn test_deeply_nested_tree_terminates() {
        let mut doc = json!("https://registry.npmjs.org/leaf");
        for _ in 0..64 {
            doc = json!({ "inner": doc });
        }
        rewrite_value(&mut doc, UPSTREAM, BASE);
        let mut cursor = &doc;
        for _ in 0..64 {
            cursor = &cursor["inner"];
        }
        assert_eq!(*cursor, format!("{BASE}/leaf"));
    }
}
