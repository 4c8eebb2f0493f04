use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RestreamQuery {
    /// `best`, `aac`, `opus` or `mpeg`, the instance default when missing
    pub audio: Option<String>,
    /// `true` turns the response into a tagged download
    pub metadata: Option<String>,
    // overrides for the tags of a download
    pub title: Option<String>,
    pub genre: Option<String>,
    pub author: Option<String>,
}

impl RestreamQuery {
    pub fn is_download(&self) -> bool {
        self.metadata.as_deref() == Some("true")
    }
}

/// `Some` only for something that isn't empty
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
