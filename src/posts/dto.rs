use serde::Deserialize;

use crate::media::UploadItem;

#[derive(Debug, Default, Deserialize)]
pub struct SliderQuery {
    pub limit: Option<i64>,
}

/// Accepts `["a","b"]` as well as `"a, b"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    Many(Vec<String>),
    Joined(String),
}

impl StringList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringList::Many(items) => items,
            StringList::Joined(s) => vec![s],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePostRequest {
    pub headline: Option<String>,
    pub detail: Option<String>,
    pub tags: Option<StringList>,
    pub categories: Option<StringList>,
}

/// Fields collected from the multipart create form.
#[derive(Debug, Default)]
pub struct CreatePostForm {
    pub headline: Option<String>,
    pub detail: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub media: Option<UploadItem>,
}
