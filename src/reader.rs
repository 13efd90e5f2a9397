use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::content::{Document, EntryDetail, EntryIndex};
use crate::daily::{self, DailyPage};
use crate::data::ContentService;
use crate::entries::EntryList;
use crate::nav::{self, Chrome, NavItem};
use crate::preferences::{Preferences, Section, Theme, FONT_SIZE_STEP};

pub const DOCUMENT_LOAD_FAILED: &str = "載入失敗，請重新整理頁面";
pub const FUTURE_NOTE: &str = "更多經文陸續整理中，敬請期待。";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loadable<T> {
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> Loadable<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Loadable::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Loadable::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyView {
    pub page: DailyPage,
    pub nav: Vec<NavItem>,
}

enum Fetched {
    Daily(Result<Document>),
    Index(Result<EntryIndex>),
    Detail {
        id: u32,
        detail: Option<EntryDetail>,
    },
}

/// Everything the reader knows: preferences, loaded content, card states
/// and chrome. Network work happens on worker threads that report back over
/// a channel; all mutation happens on the thread that owns the `Reader`.
pub struct Reader {
    service: Arc<dyn ContentService>,
    prefs: Preferences,
    daily: Loadable<DailyView>,
    entries: Loadable<EntryList>,
    entry_nav: Vec<NavItem>,
    chrome: Chrome,
    response_tx: Sender<Fetched>,
    response_rx: Receiver<Fetched>,
    in_flight: usize,
}

impl Reader {
    pub fn new(service: Arc<dyn ContentService>, prefs: Preferences) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            service,
            prefs,
            daily: Loadable::Loading,
            entries: Loadable::Loading,
            entry_nav: Vec::new(),
            chrome: Chrome::default(),
            response_tx,
            response_rx,
            in_flight: 0,
        }
    }

    /// Kicks off the two top-level fetches side by side.
    pub fn start(&mut self) {
        self.spawn_daily();
        self.spawn_index();
    }

    /// Re-runs whichever top-level fetch failed. Detail failures stay put.
    pub fn reload_failed(&mut self) -> bool {
        let mut issued = false;
        if self.daily.is_failed() {
            self.daily = Loadable::Loading;
            self.spawn_daily();
            issued = true;
        }
        if self.entries.is_failed() {
            self.entries = Loadable::Loading;
            self.spawn_index();
            issued = true;
        }
        issued
    }

    fn spawn_daily(&mut self) {
        let service = self.service.clone();
        let tx = self.response_tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let result = service.load_daily_document();
            let _ = tx.send(Fetched::Daily(result));
        });
    }

    fn spawn_index(&mut self) {
        let service = self.service.clone();
        let tx = self.response_tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let result = service.load_entry_index();
            let _ = tx.send(Fetched::Index(result));
        });
    }

    fn spawn_detail(&mut self, id: u32) {
        let service = self.service.clone();
        let tx = self.response_tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let detail = service.load_entry_detail(id);
            let _ = tx.send(Fetched::Detail { id, detail });
        });
    }

    /// Applies every completed fetch without blocking.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(message) = self.response_rx.try_recv() {
            self.apply(message);
            changed = true;
        }
        changed
    }

    /// Blocks until no fetch is outstanding or `timeout` passes.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(message) => self.apply(message),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    fn apply(&mut self, message: Fetched) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match message {
            Fetched::Daily(Ok(document)) => {
                tracing::info!(sections = document.sections.len(), "daily document loaded");
                self.daily = Loadable::Ready(DailyView {
                    page: daily::render_daily(&document),
                    nav: daily::daily_nav(&document),
                });
            }
            Fetched::Daily(Err(err)) => {
                tracing::error!(error = %format!("{err:#}"), "failed to load daily document");
                self.daily = Loadable::Failed(DOCUMENT_LOAD_FAILED.to_string());
            }
            Fetched::Index(Ok(index)) => {
                tracing::info!(entries = index.entries.len(), "entry index loaded");
                let mut list = EntryList::render(&index, &mut self.prefs);
                self.entry_nav = list.quick_nav();
                let restore = list.restore();
                self.entries = Loadable::Ready(list);
                if !restore.is_empty() {
                    tracing::debug!(count = restore.len(), "restoring expanded entries");
                }
                for id in restore {
                    self.spawn_detail(id);
                }
            }
            Fetched::Index(Err(err)) => {
                tracing::error!(error = %format!("{err:#}"), "failed to load entry index");
                self.entries = Loadable::Failed(DOCUMENT_LOAD_FAILED.to_string());
            }
            Fetched::Detail { id, detail } => {
                let Loadable::Ready(list) = &mut self.entries else {
                    return;
                };
                if !list.apply_detail(id, detail) {
                    tracing::debug!(id, "ignoring detail for card without a pending fetch");
                }
            }
        }
    }

    pub fn toggle_entry(&mut self, id: u32) -> bool {
        let Loadable::Ready(list) = &mut self.entries else {
            return false;
        };
        let Some(toggled) = list.toggle(id, &mut self.prefs) else {
            return false;
        };
        if let Some(fetch) = toggled.fetch {
            self.spawn_detail(fetch);
        }
        true
    }

    pub fn toggle_section(&mut self, section: Section) -> bool {
        let expanded = !self.prefs.section_expanded(section);
        self.prefs.set_section_expanded(section, expanded);
        expanded
    }

    /// Scrolls to a nav target, expanding its section first when collapsed.
    pub fn navigate(&mut self, anchor: &str, now: Instant) {
        if let Some(section) = nav::owning_section(anchor) {
            if !self.prefs.section_expanded(section) {
                self.prefs.set_section_expanded(section, true);
            }
        }
        self.chrome.close_drawer();
        self.chrome.request_jump(anchor.to_string(), now);
    }

    pub fn change_font_size(&mut self, direction: i64) -> i64 {
        self.prefs.change_font_size(direction.signum() * FONT_SIZE_STEP)
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.prefs.toggle_theme()
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    pub fn daily(&self) -> &Loadable<DailyView> {
        &self.daily
    }

    pub fn entries(&self) -> &Loadable<EntryList> {
        &self.entries
    }

    pub fn daily_nav(&self) -> &[NavItem] {
        match &self.daily {
            Loadable::Ready(view) => &view.nav,
            _ => &[],
        }
    }

    pub fn entry_nav(&self) -> &[NavItem] {
        &self.entry_nav
    }

    pub fn chrome(&self) -> &Chrome {
        &self.chrome
    }

    pub fn chrome_mut(&mut self) -> &mut Chrome {
        &mut self.chrome
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }
}
