use serde::Deserialize;

use crate::storage::Article;
use crate::util::sanitize_text;

/// One page of `search_by_date` results.
///
/// Only `hits` is consumed; the paging fields are kept for logging.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub nb_pages: u32,
    #[serde(default)]
    pub hits_per_page: u32,
    #[serde(default)]
    pub nb_hits: u64,
}

/// A single story or comment as the search API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "objectID")]
    pub object_id: String,
    pub author: Option<String>,
    pub title: Option<String>,
    pub story_title: Option<String>,
    pub story_url: Option<String>,
    pub url: Option<String>,
    pub comment_text: Option<String>,
    pub created_at: String,
    pub created_at_i: i64,
    pub points: Option<i64>,
}

fn clean(field: Option<String>) -> Option<String> {
    field.map(|s| sanitize_text(&s).into_owned())
}

impl SearchHit {
    /// Map onto the stored shape, stripping control characters from every
    /// text field that ends up on screen.
    pub fn into_article(self) -> Article {
        Article {
            object_id: self.object_id,
            title: clean(self.title),
            story_title: clean(self.story_title),
            author: clean(self.author),
            url: self.url,
            story_url: self.story_url,
            comment_text: clean(self.comment_text),
            created_at: self.created_at,
            created_at_i: self.created_at_i,
            points: self.points,
        }
    }
}
