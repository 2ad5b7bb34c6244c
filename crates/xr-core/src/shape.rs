use crate::facade::{PackageVersion, UpstreamPackage};
use crate::flags::{InlineFlag, RequestFlags};
use crate::registry_set::{FacadeContext, FacadeSet};
use serde_json::{Map, Value, json};

/// Registry spec version advertised on every response.
pub const SPEC_VERSION: &str = "1.0-rc2";

/// Schema URL baked into the content type.
pub const SCHEMA_URL: &str = "https://xregistry.io/schemas/xregistry-v1.0-rc2.json";

/// `Content-Type` of every JSON response.
pub const CONTENT_TYPE: &str =
    "application/json; schema=https://xregistry.io/schemas/xregistry-v1.0-rc2.json";

/// Percent-escapes the characters that would break one path segment,
/// keeping the display form otherwise (`@scope/pkg` stays readable).
pub fn encode_segment(name: &str) -> String {
    name.replace('%', "%25")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('#', "%23")
}

/// `/noderegistries/npmjs.org`
pub fn group_xid(ctx: &FacadeContext) -> String {
    format!(
        "/{}/{}",
        ctx.facade.group_type(),
        encode_segment(ctx.facade.group_id())
    )
}

/// `/noderegistries/npmjs.org/packages/express`
pub fn resource_xid(ctx: &FacadeContext, name: &str) -> String {
    format!(
        "{}/{}/{}",
        group_xid(ctx),
        ctx.facade.resource_plural(),
        encode_segment(name)
    )
}

/// `/noderegistries/npmjs.org/packages/express/versions/4.18.2`
pub fn version_xid(ctx: &FacadeContext, name: &str, version: &str) -> String {
    format!("{}/versions/{}", resource_xid(ctx, name), encode_segment(version))
}

fn absolute(base: &str, path: &str, doc: bool) -> String {
    if doc {
        path.to_string()
    } else {
        format!("{base}{path}")
    }
}

/// Stamps `epoch`/`createdat`/`modifiedat` for `path` into `map`.
fn stamp_entity(map: &mut Map<String, Value>, ctx: &FacadeContext, path: &str) {
    let state = ctx.entities.get(path);
    map.insert("epoch".into(), json!(state.epoch));
    map.insert("createdat".into(), json!(state.createdat_str()));
    map.insert("modifiedat".into(), json!(state.modifiedat_str()));
}

/// The singleton registry document served at `/`.
///
/// Group collections appear as URL references by default; `inline=
/// endpoints` (or `*`) embeds them, `inline=model`/`capabilities`/
/// `modelsource` embed the respective documents. With `?doc` all URLs
/// are emitted registry-relative for export bundles.
pub fn registry_doc(
    set: &FacadeSet,
    base: &str,
    registry_id: &str,
    flags: &RequestFlags,
) -> Value {
    let doc = flags.doc;
    let mut map = Map::new();
    map.insert("specversion".into(), json!(SPEC_VERSION));
    map.insert("registryid".into(), json!(registry_id));
    map.insert("xid".into(), json!("/"));
    map.insert("self".into(), json!(absolute(base, "/", doc)));

    let state = set.root_entities.get("/");
    map.insert("epoch".into(), json!(state.epoch));
    map.insert("createdat".into(), json!(state.createdat_str()));
    map.insert("modifiedat".into(), json!(state.modifiedat_str()));

    map.insert("modelurl".into(), json!(absolute(base, "/model", doc)));
    map.insert(
        "capabilitiesurl".into(),
        json!(absolute(base, "/capabilities", doc)),
    );

    if flags.inlines(InlineFlag::Model) {
        map.insert("model".into(), model_doc(set));
    }
    if flags.inlines(InlineFlag::ModelSource) {
        map.insert("modelsource".into(), model_doc(set));
    }
    if flags.inlines(InlineFlag::Capabilities) {
        map.insert("capabilities".into(), capabilities_doc());
    }

    for ctx in set.iter() {
        let plural = ctx.facade.group_type();
        map.insert(
            format!("{plural}url"),
            json!(absolute(base, &format!("/{plural}"), doc)),
        );
        map.insert(format!("{plural}count"), json!(1));
        if flags.inlines(InlineFlag::Endpoints) {
            map.insert(plural.to_string(), group_collection_doc(ctx, base));
        }
    }

    Value::Object(map)
}

/// The capabilities document: what this read-only surface supports.
pub fn capabilities_doc() -> Value {
    json!({
        "apis": ["/capabilities", "/export", "/model"],
        "flags": [
            "doc", "epoch", "filter", "inline", "limit", "noreadonly",
            "offset", "schema", "sort"
        ],
        "mutable": [],
        "pagination": true,
        "schemas": [SCHEMA_URL],
        "specversions": [SPEC_VERSION],
        "sticky": false
    })
}

/// Combined model document: one group/resource pair per facade.
pub fn model_doc(set: &FacadeSet) -> Value {
    let mut groups = Map::new();
    for ctx in set.iter() {
        groups.insert(ctx.facade.group_type().to_string(), ctx.facade.model());
    }
    json!({ "groups": groups })
}

/// `{ "<groupId>": <group document> }`
pub fn group_collection_doc(ctx: &FacadeContext, base: &str) -> Value {
    let mut map = Map::new();
    map.insert(ctx.facade.group_id().to_string(), group_doc(ctx, base));
    Value::Object(map)
}

pub fn group_doc(ctx: &FacadeContext, base: &str) -> Value {
    let xid = group_xid(ctx);
    let plural = ctx.facade.resource_plural();

    let mut map = Map::new();
    map.insert(
        format!("{}id", ctx.facade.group_singular()),
        json!(ctx.facade.group_id()),
    );
    map.insert("name".into(), json!(ctx.facade.group_id()));
    map.insert("xid".into(), json!(xid));
    map.insert("self".into(), json!(format!("{base}{xid}")));
    stamp_entity(&mut map, ctx, &xid);
    map.insert(
        format!("{plural}url"),
        json!(format!("{base}{xid}/{plural}")),
    );
    // Advertised as an estimate; upstreams do not expose a live count.
    map.insert(
        format!("{plural}count"),
        json!(ctx.facade.package_count_estimate()),
    );
    Value::Object(map)
}

/// A full resource document: identity, bookkeeping, ecosystem metadata
/// and the default version's payload folded in underneath.
pub fn resource_doc(ctx: &FacadeContext, base: &str, pkg: &UpstreamPackage) -> Value {
    let xid = resource_xid(ctx, &pkg.name);
    let singular = ctx.facade.resource_singular();

    let mut map = Map::new();
    map.insert(format!("{singular}id"), json!(pkg.resource_id));
    map.insert("name".into(), json!(pkg.name));
    if let Some(default) = &pkg.default_version {
        map.insert("versionid".into(), json!(default));
        map.insert("isdefault".into(), json!(true));
    }
    map.insert("xid".into(), json!(xid));
    map.insert("self".into(), json!(format!("{base}{xid}")));
    stamp_entity(&mut map, ctx, &xid);
    map.insert("metaurl".into(), json!(format!("{base}{xid}/meta")));
    map.insert("versionsurl".into(), json!(format!("{base}{xid}/versions")));
    map.insert("versionscount".into(), json!(pkg.versions.len()));

    for (key, value) in &pkg.attributes {
        map.entry(key.clone()).or_insert_with(|| value.clone());
    }
    if let Some(default) = &pkg.default_version {
        if let Some(version) = pkg.version(default) {
            for (key, value) in &version.attributes {
                map.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }

    Value::Object(map)
}

/// A shallow collection entry for a candidate that was not enriched:
/// identity and navigation only, no upstream metadata.
pub fn resource_entry_doc(
    ctx: &FacadeContext,
    base: &str,
    name: &str,
    pkg: Option<&UpstreamPackage>,
) -> Value {
    if let Some(pkg) = pkg {
        return resource_doc(ctx, base, pkg);
    }

    let xid = resource_xid(ctx, name);
    let singular = ctx.facade.resource_singular();

    let mut map = Map::new();
    map.insert(format!("{singular}id"), json!(ctx.facade.normalize(name)));
    map.insert("name".into(), json!(name));
    map.insert("xid".into(), json!(xid));
    map.insert("self".into(), json!(format!("{base}{xid}")));
    map.insert("metaurl".into(), json!(format!("{base}{xid}/meta")));
    map.insert("versionsurl".into(), json!(format!("{base}{xid}/versions")));
    Value::Object(map)
}

/// The resource's `meta` view: identity and default-version pointer
/// without any version payload.
pub fn resource_meta_doc(ctx: &FacadeContext, base: &str, pkg: &UpstreamPackage) -> Value {
    let resource = resource_xid(ctx, &pkg.name);
    let xid = format!("{resource}/meta");
    let singular = ctx.facade.resource_singular();

    let mut map = Map::new();
    map.insert(format!("{singular}id"), json!(pkg.resource_id));
    map.insert("xid".into(), json!(xid));
    map.insert("self".into(), json!(format!("{base}{xid}")));
    stamp_entity(&mut map, ctx, &resource);
    map.insert("readonly".into(), json!(true));
    map.insert("compatibility".into(), json!("none"));
    if let Some(default) = &pkg.default_version {
        map.insert("defaultversionid".into(), json!(default));
        map.insert(
            "defaultversionurl".into(),
            json!(format!(
                "{base}{resource}/versions/{}",
                encode_segment(default)
            )),
        );
        map.insert("defaultversionsticky".into(), json!(false));
    }
    Value::Object(map)
}

/// `ancestor` of `version`: the immediate predecessor in the package's
/// chronological order, or the version itself for the oldest.
pub fn ancestor_of(pkg: &UpstreamPackage, version: &str) -> Option<String> {
    let position = pkg.versions.iter().position(|v| v.version == version)?;
    if position == 0 {
        Some(version.to_string())
    } else {
        Some(pkg.versions[position - 1].version.clone())
    }
}

/// The sorted `versions` map document.
pub fn versions_doc(ctx: &FacadeContext, base: &str, pkg: &UpstreamPackage) -> Value {
    let mut map = Map::new();
    for version in &pkg.versions {
        map.insert(
            version.version.clone(),
            version_doc(ctx, base, pkg, version),
        );
    }
    Value::Object(map)
}

pub fn version_doc(
    ctx: &FacadeContext,
    base: &str,
    pkg: &UpstreamPackage,
    version: &PackageVersion,
) -> Value {
    let xid = version_xid(ctx, &pkg.name, &version.version);
    let singular = ctx.facade.resource_singular();
    let is_default = pkg.default_version.as_deref() == Some(version.version.as_str());
    let ancestor = ancestor_of(pkg, &version.version).unwrap_or_else(|| version.version.clone());

    let mut map = Map::new();
    map.insert("versionid".into(), json!(version.version));
    map.insert(format!("{singular}id"), json!(pkg.resource_id));
    map.insert("xid".into(), json!(xid));
    map.insert("self".into(), json!(format!("{base}{xid}")));
    map.insert("isdefault".into(), json!(is_default));
    map.insert("ancestor".into(), json!(ancestor));
    stamp_entity(&mut map, ctx, &xid);

    for (key, value) in &version.attributes {
        map.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(map)
}

/// The version `meta` view. Exactly the identity, bookkeeping and
/// lineage members — no payload.
pub fn version_meta_doc(
    ctx: &FacadeContext,
    base: &str,
    pkg: &UpstreamPackage,
    version: &PackageVersion,
) -> Value {
    let version_path = version_xid(ctx, &pkg.name, &version.version);
    let xid = format!("{version_path}/meta");
    let singular = ctx.facade.resource_singular();
    let is_default = pkg.default_version.as_deref() == Some(version.version.as_str());
    let ancestor = ancestor_of(pkg, &version.version).unwrap_or_else(|| version.version.clone());
    let state = ctx.entities.get(&version_path);

    let mut map = Map::new();
    map.insert("xid".into(), json!(xid));
    map.insert("self".into(), json!(format!("{base}{xid}")));
    map.insert("versionid".into(), json!(version.version));
    map.insert(format!("{singular}id"), json!(pkg.resource_id));
    map.insert("epoch".into(), json!(state.epoch));
    map.insert("createdat".into(), json!(state.createdat_str()));
    map.insert("modifiedat".into(), json!(state.modifiedat_str()));
    map.insert("isdefault".into(), json!(is_default));
    map.insert("ancestor".into(), json!(ancestor));
    Value::Object(map)
}
