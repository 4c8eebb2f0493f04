// type hell
//
// these are all shaped after the api-v2 responses. The api loves `null`, so almost every field
// goes through `nullable` and ends up as its default instead
mod activity;
mod comment;
mod media;
mod playlist;
mod preferences;
mod search;
mod selection;
mod track;
mod user;

pub use activity::*;
pub use comment::*;
pub use media::*;
pub use playlist::*;
pub use preferences::*;
pub use search::*;
pub use selection::*;
pub use track::*;
pub use user::*;

use serde::{Deserialize, Deserializer, Serialize};

/// a page of a cursor based listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Paginated<T> {
    #[serde(default, deserialize_with = "nullable")]
    pub collection: Vec<T>,
    #[serde(rename = "total_results", default, deserialize_with = "nullable")]
    pub total: i64,
    /// opaque cursor url, empty once there is nothing left
    #[serde(rename = "next_href", default, deserialize_with = "nullable")]
    pub next: String,
}

impl<T> Paginated<T> {
    /// an empty page pointing at `next`, call `proceed` to actually load it
    pub fn starting_at(next: impl Into<String>) -> Self {
        Self {
            collection: Vec::new(),
            total: 0,
            next: next.into(),
        }
    }
}

impl<T> Default for Paginated<T> {
    fn default() -> Self {
        Self::starting_at("")
    }
}

/// `null` -> `T::default()`
pub fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

/// ids show up as numbers, strings or not at all depending on the endpoint
pub fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Number(n)) => n.to_string(),
        Some(RawId::Text(s)) => s,
        None => String::new(),
    })
}
