use crate::models::CatalogItem;
use crate::tmdb::image_url;
use rand::Rng;
use std::sync::Arc;

/// Hero banner showing one random item of its input.
#[derive(Debug, Clone)]
pub struct Banner {
    items: Arc<[CatalogItem]>,
    chosen: Option<usize>,
}

impl Default for Banner {
    fn default() -> Self {
        Self {
            items: Arc::from(Vec::new()),
            chosen: None,
        }
    }
}

impl Banner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the input. A new choice is made only when `items` is a different
    /// allocation than the current input; returns whether that happened.
    pub fn set_items(&mut self, items: Arc<[CatalogItem]>) -> bool {
        self.set_items_with(items, &mut rand::rng())
    }

    pub fn set_items_with<R>(&mut self, items: Arc<[CatalogItem]>, rng: &mut R) -> bool
    where
        R: Rng + ?Sized,
    {
        if Arc::ptr_eq(&self.items, &items) {
            return false;
        }
        self.chosen = choose_index(items.len(), rng);
        self.items = items;
        true
    }

    pub fn current(&self) -> Option<&CatalogItem> {
        self.items.get(self.chosen?)
    }

    pub fn artwork_url(&self) -> Option<String> {
        self.current()?.artwork_path().map(image_url)
    }
}

/// Uniform index in `[0, len)`, or `None` for an empty input.
pub fn choose_index<R>(len: usize, rng: &mut R) -> Option<usize>
where
    R: Rng + ?Sized,
{
    if len == 0 {
        return None;
    }
    Some(rng.random_range(0..len))
}
