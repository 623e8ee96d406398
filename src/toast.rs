use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// How long a notification stays on screen.
pub const TOAST_SECS: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct Toasts {
    next_id: u64,
    items: Vec<Toast>,
}

impl Toasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: String, kind: ToastKind, now: DateTime<Utc>) -> u64 {
        self.next_id += 1;
        self.items.push(Toast {
            id: self.next_id,
            message,
            kind,
            expires_at: now + Duration::seconds(TOAST_SECS),
        });
        self.next_id
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|t| t.id != id);
        before != self.items.len()
    }

    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.items.retain(|t| t.expires_at > now);
    }

    pub fn active(&self, now: DateTime<Utc>) -> Vec<Toast> {
        self.items
            .iter()
            .filter(|t| t.expires_at > now)
            .cloned()
            .collect()
    }
}
