//! Lazily hydrated baogao cards.
//!
//! Each card walks a small state machine:
//!
//! ```text
//! collapsed-unloaded --click--> expanded-unloaded --ok--> expanded-loaded <--click--> collapsed-loaded
//!                                      |
//!                                      +--failure--> expanded-error <--click--> collapsed-error
//! ```
//!
//! A detail fetch is requested at most once per card for the lifetime of the
//! list. The expanded set is mirrored into [`Preferences`] on every toggle.

use std::collections::HashMap;

use crate::content::{EntryDetail, EntryIndex, EntrySummary};
use crate::nav::NavItem;
use crate::preferences::Preferences;

pub const ANCHOR_PREFIX: &str = "baogao-";
pub const INTRO_PLACEHOLDER: &str = "志心皈命禮";
pub const LOADING_TEXT: &str = "載入中...";
pub const LOAD_FAILED_TEXT: &str = "載入失敗";
pub const QUICK_NAV_LIMIT: usize = 20;
pub const QUICK_NAV_MORE: &str = "... 更多請展開區塊查看";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardPhase {
    CollapsedUnloaded,
    ExpandedUnloaded,
    ExpandedLoaded,
    CollapsedLoaded,
    ExpandedError,
    CollapsedError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardBody {
    pub intro: String,
    pub content: String,
}

impl From<EntryDetail> for CardBody {
    fn from(detail: EntryDetail) -> Self {
        let intro = detail
            .intro
            .filter(|intro| !intro.is_empty())
            .unwrap_or_else(|| INTRO_PLACEHOLDER.to_string());
        Self {
            intro,
            content: detail.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Hydration {
    Unloaded,
    Loading,
    Loaded(CardBody),
    Failed,
}

#[derive(Debug, Clone)]
pub struct Card {
    summary: EntrySummary,
    expanded: bool,
    hydration: Hydration,
}

impl Card {
    fn new(summary: EntrySummary, expanded: bool) -> Self {
        Self {
            summary,
            expanded,
            hydration: Hydration::Unloaded,
        }
    }

    pub fn id(&self) -> u32 {
        self.summary.id
    }

    pub fn title(&self) -> &str {
        &self.summary.title
    }

    pub fn number_label(&self) -> String {
        format!("第 {} 篇", self.summary.id)
    }

    pub fn anchor(&self) -> String {
        entry_anchor(self.summary.id)
    }

    pub fn expanded(&self) -> bool {
        self.expanded
    }

    pub fn loaded(&self) -> bool {
        matches!(self.hydration, Hydration::Loaded(_))
    }

    pub fn body(&self) -> Option<&CardBody> {
        match &self.hydration {
            Hydration::Loaded(body) => Some(body),
            _ => None,
        }
    }

    pub fn failed(&self) -> bool {
        matches!(self.hydration, Hydration::Failed)
    }

    pub fn phase(&self) -> CardPhase {
        match (self.expanded, &self.hydration) {
            (false, Hydration::Unloaded | Hydration::Loading) => CardPhase::CollapsedUnloaded,
            (true, Hydration::Unloaded | Hydration::Loading) => CardPhase::ExpandedUnloaded,
            (true, Hydration::Loaded(_)) => CardPhase::ExpandedLoaded,
            (false, Hydration::Loaded(_)) => CardPhase::CollapsedLoaded,
            (true, Hydration::Failed) => CardPhase::ExpandedError,
            (false, Hydration::Failed) => CardPhase::CollapsedError,
        }
    }

    /// Claims the one fetch this card is ever allowed.
    fn begin_fetch(&mut self) -> Option<u32> {
        if self.hydration == Hydration::Unloaded {
            self.hydration = Hydration::Loading;
            Some(self.summary.id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggled {
    pub expanded: bool,
    /// Id whose detail must now be fetched, if any.
    pub fetch: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct EntryList {
    source: String,
    source_url: String,
    total_entries: u32,
    cards: Vec<Card>,
    positions: HashMap<u32, usize>,
}

pub fn entry_anchor(id: u32) -> String {
    format!("{ANCHOR_PREFIX}{id}")
}

impl EntryList {
    /// Builds one card per summary. Persisted ids that no longer appear in
    /// the index are dropped from the expanded set.
    pub fn render(index: &EntryIndex, prefs: &mut Preferences) -> Self {
        let mut positions = HashMap::with_capacity(index.entries.len());
        let mut cards = Vec::with_capacity(index.entries.len());
        for summary in &index.entries {
            if positions.contains_key(&summary.id) {
                tracing::warn!(id = summary.id, "duplicate entry id in index; keeping first");
                continue;
            }
            positions.insert(summary.id, cards.len());
            let expanded = prefs.is_entry_expanded(summary.id);
            cards.push(Card::new(summary.clone(), expanded));
        }
        prefs.retain_entries(|id| positions.contains_key(&id));

        Self {
            source: index.source.clone(),
            source_url: index.source_url.clone(),
            total_entries: index.total_entries,
            cards,
            positions,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn summary_line(&self) -> String {
        format!("📜 共收錄 {} 篇寶誥經文", self.total_entries)
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card(&self, id: u32) -> Option<&Card> {
        self.positions.get(&id).map(|&idx| &self.cards[idx])
    }

    fn card_mut(&mut self, id: u32) -> Option<&mut Card> {
        let idx = *self.positions.get(&id)?;
        self.cards.get_mut(idx)
    }

    /// Ids of every card rendered expanded, each now marked as loading. The
    /// caller fetches them all at once.
    pub fn restore(&mut self) -> Vec<u32> {
        self.cards
            .iter_mut()
            .filter(|card| card.expanded)
            .filter_map(Card::begin_fetch)
            .collect()
    }

    pub fn toggle(&mut self, id: u32, prefs: &mut Preferences) -> Option<Toggled> {
        let card = self.card_mut(id)?;
        card.expanded = !card.expanded;
        let expanded = card.expanded;
        let fetch = if expanded { card.begin_fetch() } else { None };
        prefs.set_entry_expanded(id, expanded);
        Some(Toggled { expanded, fetch })
    }

    /// Applies a finished detail fetch. Returns false when the id is not a
    /// card or no fetch was outstanding for it.
    pub fn apply_detail(&mut self, id: u32, detail: Option<EntryDetail>) -> bool {
        let Some(card) = self.card_mut(id) else {
            return false;
        };
        if card.hydration != Hydration::Loading {
            return false;
        }
        card.hydration = match detail {
            Some(detail) => Hydration::Loaded(detail.into()),
            None => Hydration::Failed,
        };
        true
    }

    pub fn pending(&self) -> usize {
        self.cards
            .iter()
            .filter(|card| card.hydration == Hydration::Loading)
            .count()
    }

    pub fn quick_nav(&self) -> Vec<NavItem> {
        let mut items: Vec<NavItem> = self
            .cards
            .iter()
            .take(QUICK_NAV_LIMIT)
            .map(|card| NavItem::link(card.title(), card.anchor()))
            .collect();
        items.push(NavItem::placeholder(QUICK_NAV_MORE));
        items
    }

    pub fn expanded_ids(&self) -> Vec<u32> {
        self.cards
            .iter()
            .filter(|card| card.expanded)
            .map(Card::id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::{MemoryBackend, KEY_EXPANDED_ENTRIES};
    use std::sync::Arc;

    fn summary(id: u32, title: &str) -> EntrySummary {
        EntrySummary {
            id,
            title: title.into(),
            file: crate::content::detail_file_name(id),
        }
    }

    fn index(entries: Vec<EntrySummary>) -> EntryIndex {
        EntryIndex {
            source: "寶誥集".into(),
            source_url: "https://example.org/baogao".into(),
            total_entries: entries.len() as u32,
            entries,
        }
    }

    fn detail(content: &str) -> EntryDetail {
        EntryDetail {
            intro: None,
            content: content.into(),
        }
    }

    fn prefs_with(expanded: &str) -> (Arc<MemoryBackend>, Preferences) {
        let backend = Arc::new(MemoryBackend::with_values([(KEY_EXPANDED_ENTRIES, expanded)]));
        let prefs = Preferences::load(backend.clone());
        (backend, prefs)
    }

    #[test]
    fn restored_card_hydrates_with_placeholder_intro() {
        let (_, mut prefs) = prefs_with("[3]");
        let mut list = EntryList::render(
            &index(vec![summary(1, "A"), summary(3, "B")]),
            &mut prefs,
        );

        let first = list.card(1).unwrap();
        assert_eq!(first.phase(), CardPhase::CollapsedUnloaded);
        assert!(!first.loaded());
        let third = list.card(3).unwrap();
        assert!(third.expanded());
        assert!(!third.loaded());

        assert_eq!(list.restore(), vec![3]);
        assert!(list.apply_detail(3, Some(detail("hello"))));
        let third = list.card(3).unwrap();
        assert_eq!(third.phase(), CardPhase::ExpandedLoaded);
        assert_eq!(
            third.body(),
            Some(&CardBody {
                intro: INTRO_PLACEHOLDER.into(),
                content: "hello".into(),
            })
        );
        assert_eq!(list.card(1).unwrap().phase(), CardPhase::CollapsedUnloaded);
    }

    #[test]
    fn detail_is_requested_exactly_once() {
        let (_, mut prefs) = prefs_with("[]");
        let mut list = EntryList::render(&index(vec![summary(5, "E")]), &mut prefs);

        let first = list.toggle(5, &mut prefs).unwrap();
        assert_eq!(
            first,
            Toggled {
                expanded: true,
                fetch: Some(5)
            }
        );
        assert_eq!(list.card(5).unwrap().phase(), CardPhase::ExpandedUnloaded);
        list.apply_detail(5, Some(detail("text")));

        let second = list.toggle(5, &mut prefs).unwrap();
        assert_eq!(second.fetch, None);
        assert_eq!(list.card(5).unwrap().phase(), CardPhase::CollapsedLoaded);
        let third = list.toggle(5, &mut prefs).unwrap();
        assert_eq!(third.fetch, None);
        assert_eq!(list.card(5).unwrap().phase(), CardPhase::ExpandedLoaded);
    }

    #[test]
    fn toggling_while_in_flight_does_not_refetch() {
        let (_, mut prefs) = prefs_with("[]");
        let mut list = EntryList::render(&index(vec![summary(2, "B")]), &mut prefs);
        assert_eq!(list.toggle(2, &mut prefs).unwrap().fetch, Some(2));
        assert_eq!(list.toggle(2, &mut prefs).unwrap().fetch, None);
        assert_eq!(list.toggle(2, &mut prefs).unwrap().fetch, None);
        assert_eq!(list.pending(), 1);
        assert!(list.apply_detail(2, Some(detail("late"))));
        assert_eq!(list.card(2).unwrap().phase(), CardPhase::ExpandedLoaded);
    }

    #[test]
    fn failure_is_terminal_and_never_retried() {
        let (_, mut prefs) = prefs_with("[]");
        let mut list = EntryList::render(&index(vec![summary(8, "H")]), &mut prefs);
        list.toggle(8, &mut prefs);
        assert!(list.apply_detail(8, None));
        let card = list.card(8).unwrap();
        assert_eq!(card.phase(), CardPhase::ExpandedError);
        assert!(!card.loaded());
        assert!(card.failed());

        assert_eq!(list.toggle(8, &mut prefs).unwrap().fetch, None);
        assert_eq!(list.card(8).unwrap().phase(), CardPhase::CollapsedError);
        assert_eq!(list.toggle(8, &mut prefs).unwrap().fetch, None);
        assert_eq!(list.card(8).unwrap().phase(), CardPhase::ExpandedError);
    }

    #[test]
    fn persisted_set_tracks_visible_expansion() {
        let (backend, mut prefs) = prefs_with("[]");
        let mut list = EntryList::render(
            &index((1..=6).map(|id| summary(id, "x")).collect()),
            &mut prefs,
        );
        for id in [4, 1, 6, 4, 2, 6, 6, 3] {
            list.toggle(id, &mut prefs);
            let visible = list.expanded_ids();
            let persisted: Vec<u32> = prefs.expanded_entries().iter().copied().collect();
            assert_eq!(visible, persisted);
            let stored: Vec<u32> =
                serde_json::from_str(&backend.raw(KEY_EXPANDED_ENTRIES).unwrap()).unwrap();
            assert_eq!(stored, persisted);
        }
        assert_eq!(list.expanded_ids(), vec![1, 2, 3, 6]);
    }

    #[test]
    fn unknown_persisted_ids_are_pruned() {
        let (backend, mut prefs) = prefs_with("[3,99]");
        let list = EntryList::render(&index(vec![summary(3, "C")]), &mut prefs);
        assert_eq!(list.expanded_ids(), vec![3]);
        assert_eq!(backend.raw(KEY_EXPANDED_ENTRIES).as_deref(), Some("[3]"));
    }

    #[test]
    fn stray_completions_are_ignored() {
        let (_, mut prefs) = prefs_with("[]");
        let mut list = EntryList::render(&index(vec![summary(1, "A")]), &mut prefs);
        assert!(!list.apply_detail(1, Some(detail("unrequested"))));
        assert!(!list.apply_detail(42, Some(detail("unknown"))));
        assert!(!list.card(1).unwrap().loaded());
        assert!(list.toggle(42, &mut prefs).is_none());
    }

    #[test]
    fn explicit_intro_is_kept() {
        let body: CardBody = EntryDetail {
            intro: Some("至心朝禮".into()),
            content: "body".into(),
        }
        .into();
        assert_eq!(body.intro, "至心朝禮");
    }

    #[test]
    fn quick_nav_caps_at_twenty_plus_placeholder() {
        let (_, mut prefs) = prefs_with("[]");
        let list = EntryList::render(
            &index((1..=25).map(|id| summary(id, &format!("t{id}"))).collect()),
            &mut prefs,
        );
        let nav = list.quick_nav();
        assert_eq!(nav.len(), QUICK_NAV_LIMIT + 1);
        assert_eq!(nav[0].target.as_deref(), Some("baogao-1"));
        assert_eq!(nav[19].label, "t20");
        let last = nav.last().unwrap();
        assert!(last.target.is_none());
        assert_eq!(last.label, QUICK_NAV_MORE);

        let (_, mut prefs) = prefs_with("[]");
        let short = EntryList::render(&index(vec![summary(1, "only")]), &mut prefs);
        assert_eq!(short.quick_nav().len(), 2);
    }
}
