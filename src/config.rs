use anyhow::{anyhow, Context, Result};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_ADDR: &str = "127.0.0.1:3146";
const DEFAULT_REFRESH_SECS: u64 = 15;

pub const REQUIRED_VARS: [&str; 2] = ["TMDB_API_KEY", "SESSION_SECRET"];

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub id_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tmdb_api_key: String,
    pub session_secret: String,
    pub addr: SocketAddr,
    pub firestore: Option<FirestoreConfig>,
    pub list_refresh: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("{} must be set", key));

        let addr = get("REELVIEW_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("REELVIEW_ADDR is not a socket address")?;
        let refresh_secs = match get("MY_LIST_REFRESH_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("MY_LIST_REFRESH_SECS must be a whole number of seconds")?
                .max(1),
            None => DEFAULT_REFRESH_SECS,
        };
        let firestore = get("FIRESTORE_PROJECT_ID").map(|project_id| FirestoreConfig {
            project_id,
            id_token: get("FIRESTORE_ID_TOKEN"),
        });

        Ok(Self {
            tmdb_api_key: require("TMDB_API_KEY")?,
            session_secret: require("SESSION_SECRET")?,
            addr,
            firestore,
            list_refresh: Duration::from_secs(refresh_secs),
        })
    }
}
