use crate::models::{CatalogItem, ExtendedDetail, Genre, MediaKind};
use serde::Serialize;

/// Where the trailer area of the overlay currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrailerState {
    Idle,
    Loading,
    Ready { key: String },
    Unavailable,
    Failed { reason: String },
    Closed,
}

/// Issued when a selection needs its extended detail fetched. The result must
/// be handed back to [`DetailOverlay::resolve`] together with `generation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub kind: MediaKind,
    pub id: i64,
}

#[derive(Debug, Clone)]
pub struct DetailOverlay {
    selected: Option<CatalogItem>,
    generation: u64,
    trailer: TrailerState,
    genres: Vec<Genre>,
    muted: bool,
    list_error: Option<String>,
}

impl Default for DetailOverlay {
    fn default() -> Self {
        Self {
            selected: None,
            generation: 0,
            trailer: TrailerState::Idle,
            genres: Vec::new(),
            muted: false,
            list_error: None,
        }
    }
}

impl DetailOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.selected.is_some()
    }

    pub fn selected(&self) -> Option<&CatalogItem> {
        self.selected.as_ref()
    }

    pub fn trailer(&self) -> &TrailerState {
        &self.trailer
    }

    pub fn genres(&self) -> &[Genre] {
        &self.genres
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn list_error(&self) -> Option<&str> {
        self.list_error.as_deref()
    }

    /// Select `item` and enter `Loading`. Returns `None` when the same item is
    /// already open, so an unchanged selection never fetches twice.
    pub fn open(&mut self, item: CatalogItem) -> Option<FetchTicket> {
        if let Some(current) = &self.selected {
            if current.same_entry(&item) {
                return None;
            }
        }
        self.generation += 1;
        let ticket = FetchTicket {
            generation: self.generation,
            kind: item.media_kind(),
            id: item.id,
        };
        self.selected = Some(item);
        self.trailer = TrailerState::Loading;
        self.genres.clear();
        self.list_error = None;
        Some(ticket)
    }

    /// Apply a fetch result. Results from an older generation are dropped and
    /// `false` is returned.
    pub fn resolve(&mut self, generation: u64, result: Result<ExtendedDetail, String>) -> bool {
        if generation != self.generation || self.selected.is_none() {
            return false;
        }
        match result {
            Ok(detail) => {
                self.genres = detail.genres;
                self.trailer = match detail.trailer {
                    Some(key) => TrailerState::Ready { key },
                    None => TrailerState::Unavailable,
                };
            }
            Err(reason) => {
                self.genres.clear();
                self.trailer = TrailerState::Failed { reason };
            }
        }
        true
    }

    pub fn toggle_muted(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    pub fn set_list_error(&mut self, error: Option<String>) {
        self.list_error = error;
    }

    /// Hide the overlay. A fetch still in flight keeps running but its result
    /// no longer matches the generation.
    pub fn close(&mut self) {
        self.generation += 1;
        self.selected = None;
        self.genres.clear();
        self.list_error = None;
        self.trailer = TrailerState::Closed;
    }
}
