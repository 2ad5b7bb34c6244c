use serde::Deserialize;

/// Search response from the npm registry (`/-/v1/search`).
#[derive(Deserialize)]
pub(crate) struct SearchResponse {
    pub objects: Vec<SearchObject>,
}

#[derive(Deserialize)]
pub(crate) struct SearchObject {
    pub package: SearchPackage,
}

/// Package entry inside a search result.
#[derive(Deserialize)]
pub(crate) struct SearchPackage {
    pub name: String,
}

/// `dist-tags` block of a package document.
#[derive(Deserialize, Default)]
pub(crate) struct DistTags {
    #[serde(default)]
    pub latest: Option<String>,
}
