//! Fetch the extended detail for one title and print what the overlay would show.
//! Usage:
//!   cargo run --bin tmdb_detail -- movie <tmdb_id>
//!   cargo run --bin tmdb_detail -- tv <tmdb_id>
//!   cargo run --bin tmdb_detail -- row <trending|originals|...>
//! Requires TMDB_API_KEY in the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use reelview::models::MediaKind;
use reelview::tmdb::{Row, TmdbApi, TmdbClient};
use serde_json::json;
use std::env;
use std::str::FromStr;

fn parse_row(name: &str) -> Result<Row> {
    Row::ALL
        .into_iter()
        .find(|row| format!("{:?}", row).eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow::anyhow!("unknown row '{}'", name))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: cargo run --bin tmdb_detail -- movie|tv <tmdb_id>");
        eprintln!("       cargo run --bin tmdb_detail -- row <row_name>");
        std::process::exit(1);
    }

    let api_key = env::var("TMDB_API_KEY").context("TMDB_API_KEY missing")?;
    let client = TmdbClient::new(&api_key)?;

    if args[1] == "row" {
        let row = parse_row(&args[2])?;
        let items = client.fetch_row(row).await?;
        let output: Vec<_> = items
            .iter()
            .map(|item| {
                json!({
                    "id": item.id,
                    "media_type": item.media_kind(),
                    "title": item.display_title(),
                    "artwork": item.artwork_path(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&json!({
            "row": row.title(),
            "items": output,
        }))?);
        return Ok(());
    }

    let kind = MediaKind::from_str(&args[1])?;
    let id: i64 = args[2].parse().context("tmdb_id must be an integer")?;
    let detail = client.fetch_extended_detail(kind, id).await?;

    let output = json!({
        "media_type": kind,
        "id": id,
        "genres": detail.genre_names(),
        "trailer": &detail.trailer,
        "trailer_url": detail
            .trailer
            .as_ref()
            .map(|key| format!("https://www.youtube.com/watch?v={}", key)),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
