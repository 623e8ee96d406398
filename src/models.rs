use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    /// Path segment used by TMDB for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "movie" => Ok(MediaKind::Movie),
            "tv" => Ok(MediaKind::Tv),
            other => Err(anyhow::anyhow!("unknown media kind '{}'", other)),
        }
    }
}

/// A movie or show record as delivered by the catalog.
///
/// Fields the client does not use are kept in `extra` so the whole payload
/// can be written back to the list store unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backdrop_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub overview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaKind>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MediaKind>,
    #[serde(default)]
    pub original_language: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogItem {
    pub fn new(id: i64, title: &str, media_type: MediaKind) -> Self {
        Self {
            id,
            title: Some(title.to_string()),
            name: None,
            original_name: None,
            backdrop_path: None,
            poster_path: None,
            overview: String::new(),
            release_date: None,
            first_air_date: None,
            vote_average: 0.0,
            vote_count: 0,
            media_type: Some(media_type),
            kind: None,
            original_language: String::new(),
            extra: Map::new(),
        }
    }

    /// Media kind used for lookups. Items carrying neither `media_type` nor
    /// `type` are treated as movies.
    pub fn media_kind(&self) -> MediaKind {
        self.media_type.or(self.kind).unwrap_or(MediaKind::Movie)
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .or(self.original_name.as_deref())
            .unwrap_or("Untitled")
    }

    pub fn artwork_path(&self) -> Option<&str> {
        self.backdrop_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.poster_path.as_deref().filter(|p| !p.is_empty()))
    }

    pub fn display_date(&self) -> Option<&str> {
        self.release_date
            .as_deref()
            .filter(|d| !d.is_empty())
            .or(self.first_air_date.as_deref().filter(|d| !d.is_empty()))
    }

    /// `vote_average` scaled to a percentage with two decimals, e.g. `"73.50"`.
    pub fn match_percent(&self) -> String {
        format!("{:.2}", self.vote_average * 10.0)
    }

    pub fn same_entry(&self, other: &CatalogItem) -> bool {
        self.id == other.id && self.media_kind() == other.media_kind()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

/// Genres and trailer for one catalog item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtendedDetail {
    pub genres: Vec<Genre>,
    pub trailer: Option<String>,
}

impl ExtendedDetail {
    pub fn genre_names(&self) -> String {
        join_genres(&self.genres)
    }
}

/// Genre names as shown in the overlay, e.g. `"Drama, Thriller"`.
pub fn join_genres(genres: &[Genre]) -> String {
    genres
        .iter()
        .map(|g| g.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_unknown_fields_for_round_trip() {
        let value = json!({
            "id": 42,
            "name": "Show",
            "genre_ids": [18, 10765],
            "popularity": 12.5,
            "type": "tv"
        });
        let item: CatalogItem = serde_json::from_value(value).expect("item deserialize");
        assert_eq!(item.media_kind(), MediaKind::Tv);
        assert_eq!(item.display_title(), "Show");
        assert_eq!(item.extra.get("genre_ids"), Some(&json!([18, 10765])));

        let back = serde_json::to_value(&item).expect("item serialize");
        assert_eq!(back.get("popularity"), Some(&json!(12.5)));
        assert_eq!(back.get("type"), Some(&json!("tv")));
        assert!(back.get("title").is_none());
    }

    #[test]
    fn media_type_wins_over_type_and_defaults_to_movie() {
        let mut item = CatalogItem::new(1, "X", MediaKind::Tv);
        item.kind = Some(MediaKind::Movie);
        assert_eq!(item.media_kind(), MediaKind::Tv);
        item.media_type = None;
        assert_eq!(item.media_kind(), MediaKind::Movie);
        item.kind = None;
        assert_eq!(item.media_kind(), MediaKind::Movie);
    }

    #[test]
    fn display_helpers_fall_back() {
        let mut item = CatalogItem::new(7, "Movie", MediaKind::Movie);
        item.title = None;
        item.original_name = Some("Original".to_string());
        assert_eq!(item.display_title(), "Original");

        item.poster_path = Some("/poster.jpg".to_string());
        assert_eq!(item.artwork_path(), Some("/poster.jpg"));
        item.backdrop_path = Some("/backdrop.jpg".to_string());
        assert_eq!(item.artwork_path(), Some("/backdrop.jpg"));

        item.first_air_date = Some("2020-02-02".to_string());
        assert_eq!(item.display_date(), Some("2020-02-02"));

        item.vote_average = 7.35;
        assert_eq!(item.match_percent(), "73.50");
    }

    #[test]
    fn parses_media_kind() {
        assert_eq!("Movie".parse::<MediaKind>().unwrap(), MediaKind::Movie);
        assert_eq!(" tv ".parse::<MediaKind>().unwrap(), MediaKind::Tv);
        assert!("person".parse::<MediaKind>().is_err());
    }
}
