use crate::models::{CatalogItem, ExtendedDetail, Genre, MediaKind};
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";

#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn fetch_extended_detail(&self, kind: MediaKind, id: i64) -> Result<ExtendedDetail>;
    async fn fetch_row(&self, row: Row) -> Result<Vec<CatalogItem>>;
}

/// Browse rows shown on the home page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Row {
    Trending,
    Originals,
    TopRated,
    Action,
    Comedy,
    Horror,
    Romance,
    Documentaries,
}

impl Row {
    pub const ALL: [Row; 8] = [
        Row::Trending,
        Row::Originals,
        Row::TopRated,
        Row::Action,
        Row::Comedy,
        Row::Horror,
        Row::Romance,
        Row::Documentaries,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Row::Trending => "Trending Now",
            Row::Originals => "Originals",
            Row::TopRated => "Top Rated",
            Row::Action => "Action Thrillers",
            Row::Comedy => "Comedies",
            Row::Horror => "Scary Movies",
            Row::Romance => "Romance Movies",
            Row::Documentaries => "Documentaries",
        }
    }

    /// Kind assigned to results that come back without `media_type`.
    pub fn default_kind(&self) -> MediaKind {
        match self {
            Row::Originals => MediaKind::Tv,
            _ => MediaKind::Movie,
        }
    }

    fn endpoint(&self) -> (&'static str, Option<(&'static str, &'static str)>) {
        match self {
            Row::Trending => ("trending/all/week", None),
            Row::Originals => ("discover/tv", Some(("with_networks", "213"))),
            Row::TopRated => ("movie/top_rated", None),
            Row::Action => ("discover/movie", Some(("with_genres", "28"))),
            Row::Comedy => ("discover/movie", Some(("with_genres", "35"))),
            Row::Horror => ("discover/movie", Some(("with_genres", "27"))),
            Row::Romance => ("discover/movie", Some(("with_genres", "10749"))),
            Row::Documentaries => ("discover/movie", Some(("with_genres", "99"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base: String,
}

impl TmdbClient {
    pub fn new(api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("TMDB API key is empty");
        }
        let user_agent = format!("reelview/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .user_agent(user_agent)
            .build()
            .context("Failed to build TMDB HTTP client")?;
        Ok(Self {
            client,
            api_key: api_key.trim().to_string(),
            base: TMDB_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base = base.trim_end_matches('/').to_string();
        self
    }

    async fn get_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let url = format!("{}/{}", self.base, path);
        let res = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", "en-US")])
            .query(query)
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}: {}", path, status, text));
        }
        Ok(text)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn fetch_extended_detail(&self, kind: MediaKind, id: i64) -> Result<ExtendedDetail> {
        let path = format!("{}/{}", kind.as_str(), id);
        debug!(kind = %kind, id, "Fetching extended detail");
        let text = self
            .get_text(&path, &[("append_to_response", "videos")])
            .await?;
        parse_detail(&text)
    }

    async fn fetch_row(&self, row: Row) -> Result<Vec<CatalogItem>> {
        #[derive(Deserialize)]
        struct Page {
            #[serde(default)]
            results: Vec<Value>,
        }

        let (path, extra) = row.endpoint();
        let query: Vec<(&str, &str)> = extra.into_iter().collect();
        let text = self.get_text(path, &query).await?;
        let page: Page = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(row_items(row, page.results))
    }
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    genres: Option<Vec<Genre>>,
    #[serde(default)]
    videos: Option<Videos>,
}

#[derive(Debug, Deserialize)]
struct Videos {
    #[serde(default)]
    results: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(rename = "type", default)]
    video_type: String,
    #[serde(default)]
    key: Option<String>,
}

/// Parse a `/{kind}/{id}?append_to_response=videos` body.
pub fn parse_detail(body: &str) -> Result<ExtendedDetail> {
    let data: DetailResponse = serde_json::from_str(body).context("JSON parse failed")?;
    Ok(ExtendedDetail {
        genres: data.genres.unwrap_or_default(),
        trailer: data.videos.as_ref().and_then(select_trailer),
    })
}

fn select_trailer(videos: &Videos) -> Option<String> {
    videos
        .results
        .iter()
        .find(|v| v.video_type == "Trailer")
        .and_then(|v| v.key.clone())
        .filter(|k| !k.is_empty())
}

fn row_items(row: Row, results: Vec<Value>) -> Vec<CatalogItem> {
    results
        .into_iter()
        .filter(|v| {
            !matches!(
                v.get("media_type").and_then(|m| m.as_str()),
                Some(kind) if kind != "movie" && kind != "tv"
            )
        })
        .filter_map(|v| match serde_json::from_value::<CatalogItem>(v) {
            Ok(mut item) => {
                if item.media_type.is_none() && item.kind.is_none() {
                    item.media_type = Some(row.default_kind());
                }
                Some(item)
            }
            Err(e) => {
                debug!(row = ?row, "Skipping malformed catalog entry: {}", e);
                None
            }
        })
        .collect()
}

pub fn image_url(path: &str) -> String {
    format!("{IMAGE_BASE}{path}")
}
