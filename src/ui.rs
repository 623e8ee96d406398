//! UI controller.
//!
//! All UI state lives in one [`UiState`] owned by a single tokio task. HTTP
//! handlers and background work talk to it through [`Msg`]s; every message is
//! applied in arrival order by [`UiState::update`], which returns the
//! [`Effect`]s the runtime should start. Effects report back as messages.
//! After each message the task publishes a fresh [`ViewModel`].
use crate::banner::Banner;
use crate::detail::{DetailOverlay, FetchTicket, TrailerState};
use crate::language::display_language;
use crate::models::{join_genres, CatalogItem, ExtendedDetail, MediaKind};
use crate::my_list::{self, is_member, DocumentStore, ListAction, MembershipFeed};
use crate::session::UserId;
use crate::tmdb::{image_url, Row, TmdbApi};
use crate::toast::{Toast, ToastKind, Toasts, TOAST_SECS};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
pub enum Msg {
    Session(Option<UserId>),
    CatalogLoaded(Vec<(Row, Vec<CatalogItem>)>),
    Select {
        kind: MediaKind,
        id: i64,
    },
    DetailLoaded {
        generation: u64,
        result: Result<ExtendedDetail, String>,
    },
    Close,
    ToggleMuted,
    ToggleList,
    ListUpdated {
        user: UserId,
        items: Vec<CatalogItem>,
    },
    ListWriteFinished {
        user: UserId,
        item: CatalogItem,
        result: Result<ListAction, String>,
    },
    DismissToast(u64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    LoadCatalog,
    FetchDetail(FetchTicket),
    Subscribe(UserId),
    Unsubscribe,
    WriteList {
        user: UserId,
        item: CatalogItem,
        currently_member: bool,
    },
    RefreshList,
    ExpireToast(u64),
}

/// A message the controller refused to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnknownItem { kind: MediaKind, id: i64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::UnknownItem { kind, id } => write!(f, "no {} with id {} on screen", kind, id),
        }
    }
}

impl std::error::Error for Rejection {}

#[derive(Debug, Default)]
pub struct UiState {
    rows: Vec<(Row, Arc<[CatalogItem]>)>,
    banner: Banner,
    detail: DetailOverlay,
    session: Option<UserId>,
    mirror: Vec<CatalogItem>,
    list_pending: bool,
    /// Membership a finished write established for one item id, held until
    /// a list snapshot agrees with it.
    unconfirmed: Option<(i64, bool)>,
    toasts: Toasts,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detail(&self) -> &DetailOverlay {
        &self.detail
    }

    pub fn mirror(&self) -> &[CatalogItem] {
        &self.mirror
    }

    pub fn session(&self) -> Option<&UserId> {
        self.session.as_ref()
    }

    /// Whether `item` is on the list, counting writes the mirror has not
    /// caught up with yet.
    pub fn in_list(&self, item: &CatalogItem) -> bool {
        match self.unconfirmed {
            Some((id, member)) if id == item.id => member,
            _ => is_member(item, &self.mirror),
        }
    }

    fn find_item(&self, kind: MediaKind, id: i64) -> Option<&CatalogItem> {
        self.rows
            .iter()
            .flat_map(|(_, items)| items.iter())
            .chain(self.mirror.iter())
            .find(|item| item.id == id && item.media_kind() == kind)
    }

    fn selected_is_member(&self) -> bool {
        self.detail
            .selected()
            .map(|item| self.in_list(item))
            .unwrap_or(false)
    }

    fn toast(&mut self, message: String, kind: ToastKind, now: DateTime<Utc>) -> Effect {
        Effect::ExpireToast(self.toasts.push(message, kind, now))
    }

    pub fn update(&mut self, msg: Msg, now: DateTime<Utc>) -> Result<Vec<Effect>, Rejection> {
        self.toasts.prune(now);
        let mut effects = Vec::new();

        match msg {
            Msg::Session(user) => {
                if user != self.session {
                    info!(
                        from = ?self.session.as_ref().map(UserId::as_str),
                        to = ?user.as_ref().map(UserId::as_str),
                        "Session changed"
                    );
                    self.mirror.clear();
                    self.list_pending = false;
                    self.unconfirmed = None;
                    effects.push(Effect::Unsubscribe);
                    if let Some(u) = &user {
                        effects.push(Effect::Subscribe(u.clone()));
                    }
                    self.session = user;
                }
            }
            Msg::CatalogLoaded(rows) => {
                self.rows = rows
                    .into_iter()
                    .map(|(row, items)| (row, Arc::from(items)))
                    .collect();
                if let Some((_, originals)) = self.rows.iter().find(|(row, _)| *row == Row::Originals)
                {
                    self.banner.set_items(originals.clone());
                }
            }
            Msg::Select { kind, id } => {
                let item = self
                    .find_item(kind, id)
                    .cloned()
                    .ok_or(Rejection::UnknownItem { kind, id })?;
                if let Some(ticket) = self.detail.open(item) {
                    effects.push(Effect::FetchDetail(ticket));
                }
            }
            Msg::DetailLoaded { generation, result } => {
                if !self.detail.resolve(generation, result) {
                    debug!(generation, "Dropping stale detail result");
                }
            }
            Msg::Close => self.detail.close(),
            Msg::ToggleMuted => {
                self.detail.toggle_muted();
            }
            Msg::ToggleList => {
                let Some(item) = self.detail.selected().cloned() else {
                    return Ok(effects);
                };
                match self.session.clone() {
                    None => {
                        let message = "Sign in to use My List".to_string();
                        self.detail.set_list_error(Some(message.clone()));
                        effects.push(self.toast(message, ToastKind::Error, now));
                    }
                    Some(_) if self.list_pending => {}
                    Some(user) => {
                        self.list_pending = true;
                        effects.push(Effect::WriteList {
                            user,
                            currently_member: self.selected_is_member(),
                            item,
                        });
                    }
                }
            }
            Msg::ListUpdated { user, items } => {
                if self.session.as_ref() == Some(&user) {
                    self.mirror = items;
                    if let Some((id, member)) = self.unconfirmed {
                        if self.mirror.iter().any(|saved| saved.id == id) == member {
                            self.unconfirmed = None;
                        }
                    }
                }
            }
            Msg::ListWriteFinished { user, item, result } => {
                if self.session.as_ref() != Some(&user) {
                    return Ok(effects);
                }
                self.list_pending = false;
                let shown = self
                    .detail
                    .selected()
                    .map(|s| s.same_entry(&item))
                    .unwrap_or(false);
                match result {
                    Ok(action) => {
                        self.unconfirmed = Some((item.id, action == ListAction::Added));
                        if shown {
                            self.detail.set_list_error(None);
                        }
                        effects.push(Effect::RefreshList);
                        let message = my_list::notice_text(&item, action);
                        effects.push(self.toast(message, ToastKind::Info, now));
                    }
                    Err(reason) => {
                        if shown {
                            self.detail.set_list_error(Some(reason.clone()));
                        }
                        let message = format!("Could not update My List: {}. Try again.", reason);
                        effects.push(self.toast(message, ToastKind::Error, now));
                    }
                }
            }
            Msg::DismissToast(id) => {
                self.toasts.dismiss(id);
            }
        }

        Ok(effects)
    }

    pub fn view(&self, now: DateTime<Utc>) -> ViewModel {
        let overlay = self.detail.selected().map(|item| OverlayView {
            id: item.id,
            media_type: item.media_kind(),
            title: item.display_title().to_string(),
            overview: item.overview.clone(),
            trailer: self.detail.trailer().clone(),
            muted: self.detail.muted(),
            in_list: self.in_list(item),
            list_pending: self.list_pending,
            list_error: self.detail.list_error().map(str::to_string),
            genres: join_genres(self.detail.genres()),
            language: display_language(&item.original_language).to_string(),
            match_percent: item.match_percent(),
            date: item.display_date().map(str::to_string),
            vote_count: item.vote_count,
        });

        ViewModel {
            signed_in: self.session.as_ref().map(|u| u.to_string()),
            banner: self.banner.current().map(CardView::from),
            rows: self
                .rows
                .iter()
                .map(|(row, items)| RowView {
                    title: row.title().to_string(),
                    items: items.iter().map(CardView::from).collect(),
                })
                .collect(),
            my_list: self.mirror.iter().map(CardView::from).collect(),
            overlay,
            toasts: self.toasts.active(now),
        }
    }
}

/// Immutable snapshot of everything the page shows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewModel {
    pub signed_in: Option<String>,
    pub banner: Option<CardView>,
    pub rows: Vec<RowView>,
    pub my_list: Vec<CardView>,
    pub overlay: Option<OverlayView>,
    pub toasts: Vec<Toast>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    pub title: String,
    pub items: Vec<CardView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CardView {
    pub id: i64,
    pub media_type: MediaKind,
    pub title: String,
    pub overview: String,
    pub artwork: Option<String>,
    pub poster: Option<String>,
}

impl From<&CatalogItem> for CardView {
    fn from(item: &CatalogItem) -> Self {
        Self {
            id: item.id,
            media_type: item.media_kind(),
            title: item.display_title().to_string(),
            overview: item.overview.clone(),
            artwork: item.artwork_path().map(image_url),
            poster: item
                .poster_path
                .as_deref()
                .or(item.backdrop_path.as_deref())
                .map(image_url),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OverlayView {
    pub id: i64,
    pub media_type: MediaKind,
    pub title: String,
    pub overview: String,
    pub trailer: TrailerState,
    pub muted: bool,
    pub in_list: bool,
    pub list_pending: bool,
    pub list_error: Option<String>,
    pub genres: String,
    pub language: String,
    pub match_percent: String,
    pub date: Option<String>,
    pub vote_count: u64,
}

/// Collaborators the controller's effects need.
#[derive(Clone)]
pub struct Services {
    pub tmdb: Arc<dyn TmdbApi>,
    pub store: Arc<dyn DocumentStore>,
    pub list_refresh: Duration,
}

/// Messages applied back to back, with no other message in between.
struct Envelope {
    msgs: Vec<Msg>,
    reply: Option<oneshot::Sender<Result<(), Rejection>>>,
}

/// Cheap handle to a running controller.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: UnboundedSender<Envelope>,
    view: watch::Receiver<Arc<ViewModel>>,
}

impl ControllerHandle {
    /// Send `msg` and wait until it has been applied.
    pub async fn dispatch(&self, msg: Msg) -> Result<()> {
        self.dispatch_batch(vec![msg]).await
    }

    /// Apply `msgs` in order as one unit and wait for them. Stops at the first
    /// rejected message; the view is published once, after the batch.
    pub async fn dispatch_batch(&self, msgs: Vec<Msg>) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                msgs,
                reply: Some(reply_tx),
            })
            .map_err(|_| anyhow!("UI controller has stopped"))?;
        let outcome = reply_rx
            .await
            .context("UI controller dropped the request")?;
        outcome.map_err(anyhow::Error::from)
    }

    pub fn view(&self) -> Arc<ViewModel> {
        self.view.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<ViewModel>> {
        self.view.clone()
    }
}

struct Controller {
    state: UiState,
    services: Services,
    feed: Option<MembershipFeed>,
    tx: WeakUnboundedSender<Envelope>,
    view_tx: watch::Sender<Arc<ViewModel>>,
}

/// Start the controller task. It stops, releasing any list subscription, once
/// every handle is dropped.
pub fn spawn(services: Services) -> ControllerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let state = UiState::new();
    let (view_tx, view_rx) = watch::channel(Arc::new(state.view(Utc::now())));
    let controller = Controller {
        state,
        services,
        feed: None,
        tx: tx.downgrade(),
        view_tx,
    };
    tokio::spawn(controller.run(rx));
    ControllerHandle { tx, view: view_rx }
}

fn post(tx: &WeakUnboundedSender<Envelope>, msg: Msg) {
    if let Some(tx) = tx.upgrade() {
        let _ = tx.send(Envelope {
            msgs: vec![msg],
            reply: None,
        });
    }
}

impl Controller {
    async fn run(mut self, mut rx: UnboundedReceiver<Envelope>) {
        self.execute(vec![Effect::LoadCatalog]);
        while let Some(Envelope { msgs, reply }) = rx.recv().await {
            let mut outcome = Ok(());
            for msg in msgs {
                match self.state.update(msg, Utc::now()) {
                    Ok(effects) => self.execute(effects),
                    Err(rejection) => {
                        outcome = Err(rejection);
                        break;
                    }
                }
            }
            self.view_tx
                .send_replace(Arc::new(self.state.view(Utc::now())));
            if let Some(reply) = reply {
                let _ = reply.send(outcome);
            }
        }
        debug!("UI controller stopped");
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::LoadCatalog => self.load_catalog(),
                Effect::FetchDetail(ticket) => {
                    let tmdb = self.services.tmdb.clone();
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let result = tmdb
                            .fetch_extended_detail(ticket.kind, ticket.id)
                            .await
                            .map_err(|e| {
                                warn!(kind = %ticket.kind, id = ticket.id, "Detail fetch failed: {:#}", e);
                                format!("{e:#}")
                            });
                        post(
                            &tx,
                            Msg::DetailLoaded {
                                generation: ticket.generation,
                                result,
                            },
                        );
                    });
                }
                Effect::Subscribe(user) => {
                    let tx = self.tx.clone();
                    let feed_user = user.clone();
                    self.feed = Some(MembershipFeed::spawn(
                        self.services.store.clone(),
                        user,
                        self.services.list_refresh,
                        move |items| {
                            post(
                                &tx,
                                Msg::ListUpdated {
                                    user: feed_user.clone(),
                                    items,
                                },
                            )
                        },
                    ));
                }
                Effect::Unsubscribe => {
                    self.feed = None;
                }
                Effect::WriteList {
                    user,
                    item,
                    currently_member,
                } => {
                    let store = self.services.store.clone();
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        let result =
                            my_list::toggle_membership(store.as_ref(), &user, &item, currently_member)
                                .await
                                .map_err(|e| {
                                    error!(user = %user, item_id = item.id, "My List update failed: {:#}", e);
                                    format!("{e:#}")
                                });
                        post(&tx, Msg::ListWriteFinished { user, item, result });
                    });
                }
                Effect::RefreshList => {
                    if let Some(feed) = &self.feed {
                        feed.refresh();
                    }
                }
                Effect::ExpireToast(id) => {
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_secs(TOAST_SECS as u64)).await;
                        post(&tx, Msg::DismissToast(id));
                    });
                }
            }
        }
    }

    fn load_catalog(&self) {
        let tmdb = self.services.tmdb.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let mut set = JoinSet::new();
            for row in Row::ALL {
                let tmdb = tmdb.clone();
                set.spawn(async move { (row, tmdb.fetch_row(row).await) });
            }
            let mut rows = Vec::new();
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok((row, Ok(items))) => rows.push((row, items)),
                    Ok((row, Err(e))) => {
                        warn!(row = ?row, "Failed to load catalog row: {:#}", e);
                        rows.push((row, Vec::new()));
                    }
                    Err(e) => warn!("Catalog row task failed: {}", e),
                }
            }
            rows.sort_by_key(|(row, _)| *row);
            info!(rows = rows.len(), "Catalog loaded");
            post(&tx, Msg::CatalogLoaded(rows));
        });
    }
}
