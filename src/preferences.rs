use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;

pub const KEY_FONT_SIZE: &str = "fontSize";
pub const KEY_THEME: &str = "theme";
pub const KEY_EXPANDED_SECTIONS: &str = "expandedSections";
pub const KEY_EXPANDED_ENTRIES: &str = "expandedBaogao";

pub const FONT_SIZE_MIN: i64 = 14;
pub const FONT_SIZE_MAX: i64 = 28;
pub const FONT_SIZE_DEFAULT: i64 = 18;
pub const FONT_SIZE_STEP: i64 = 2;

/// Durable string key-value storage underneath [`Preferences`].
pub trait PreferenceBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: RwLock::new(
                values
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }
}

impl PreferenceBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Glyph shown on the theme toggle: the theme a press switches to.
    pub fn toggle_icon(&self) -> &'static str {
        match self {
            Theme::Light => "🌙",
            Theme::Dark => "☀️",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    Daily,
    Baogao,
    Future,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Daily, Section::Baogao, Section::Future];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Daily => "daily",
            Section::Baogao => "baogao",
            Section::Future => "future",
        }
    }

    pub fn default_expanded(&self) -> bool {
        !matches!(self, Section::Baogao)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionStates {
    daily: bool,
    baogao: bool,
    future: bool,
}

impl Default for SectionStates {
    fn default() -> Self {
        Self {
            daily: Section::Daily.default_expanded(),
            baogao: Section::Baogao.default_expanded(),
            future: Section::Future.default_expanded(),
        }
    }
}

impl SectionStates {
    pub fn get(&self, section: Section) -> bool {
        match section {
            Section::Daily => self.daily,
            Section::Baogao => self.baogao,
            Section::Future => self.future,
        }
    }

    pub fn set(&mut self, section: Section, expanded: bool) {
        match section {
            Section::Daily => self.daily = expanded,
            Section::Baogao => self.baogao = expanded,
            Section::Future => self.future = expanded,
        }
    }

    fn to_json(self) -> String {
        let map: std::collections::BTreeMap<&str, bool> = Section::ALL
            .iter()
            .map(|section| (section.as_str(), self.get(*section)))
            .collect();
        serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
    }

    fn from_json(raw: &str) -> serde_json::Result<Self> {
        let map: HashMap<String, bool> = serde_json::from_str(raw)?;
        let mut states = Self::default();
        for section in Section::ALL {
            if let Some(expanded) = map.get(section.as_str()) {
                states.set(section, *expanded);
            }
        }
        Ok(states)
    }
}

pub fn clamp_font_size(size: i64) -> i64 {
    size.clamp(FONT_SIZE_MIN, FONT_SIZE_MAX)
}

/// Typed view over the persisted UI preferences. Every setter writes
/// through to the backend immediately.
pub struct Preferences {
    backend: Arc<dyn PreferenceBackend>,
    font_size: i64,
    theme: Theme,
    sections: SectionStates,
    expanded_entries: BTreeSet<u32>,
}

impl Preferences {
    pub fn load(backend: Arc<dyn PreferenceBackend>) -> Self {
        let font_size = read_pref(backend.as_ref(), KEY_FONT_SIZE, |raw| {
            raw.trim().parse::<i64>().ok().map(clamp_font_size)
        })
        .unwrap_or(FONT_SIZE_DEFAULT);
        let theme = read_pref(backend.as_ref(), KEY_THEME, Theme::parse).unwrap_or_default();
        let sections = read_pref(backend.as_ref(), KEY_EXPANDED_SECTIONS, |raw| {
            SectionStates::from_json(raw).ok()
        })
        .unwrap_or_default();
        let expanded_entries = read_pref(backend.as_ref(), KEY_EXPANDED_ENTRIES, |raw| {
            serde_json::from_str::<Vec<u32>>(raw)
                .ok()
                .map(|ids| ids.into_iter().filter(|id| *id > 0).collect())
        })
        .unwrap_or_default();

        Self {
            backend,
            font_size,
            theme,
            sections,
            expanded_entries,
        }
    }

    pub fn font_size(&self) -> i64 {
        self.font_size
    }

    pub fn change_font_size(&mut self, delta: i64) -> i64 {
        self.font_size = clamp_font_size(self.font_size.saturating_add(delta));
        self.write(KEY_FONT_SIZE, &self.font_size.to_string());
        self.font_size
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.write(KEY_THEME, self.theme.as_str());
        self.theme
    }

    pub fn section_expanded(&self, section: Section) -> bool {
        self.sections.get(section)
    }

    pub fn set_section_expanded(&mut self, section: Section, expanded: bool) {
        self.sections.set(section, expanded);
        self.write(KEY_EXPANDED_SECTIONS, &self.sections.to_json());
    }

    pub fn expanded_entries(&self) -> &BTreeSet<u32> {
        &self.expanded_entries
    }

    pub fn is_entry_expanded(&self, id: u32) -> bool {
        self.expanded_entries.contains(&id)
    }

    pub fn set_entry_expanded(&mut self, id: u32, expanded: bool) {
        if expanded {
            self.expanded_entries.insert(id);
        } else {
            self.expanded_entries.remove(&id);
        }
        self.write_entries();
    }

    /// Drops ids the predicate rejects; writes only when something changed.
    pub fn retain_entries<F>(&mut self, mut keep: F)
    where
        F: FnMut(u32) -> bool,
    {
        let before = self.expanded_entries.len();
        self.expanded_entries.retain(|id| keep(*id));
        if self.expanded_entries.len() != before {
            self.write_entries();
        }
    }

    fn write_entries(&self) {
        let ids: Vec<u32> = self.expanded_entries.iter().copied().collect();
        match serde_json::to_string(&ids) {
            Ok(json) => self.write(KEY_EXPANDED_ENTRIES, &json),
            Err(err) => tracing::warn!(%err, "serialize expanded entries"),
        }
    }

    fn write(&self, key: &str, value: &str) {
        if let Err(err) = self.backend.set(key, value) {
            tracing::warn!(key, error = %format!("{err:#}"), "failed to persist preference");
        }
    }
}

fn read_pref<T>(
    backend: &dyn PreferenceBackend,
    key: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> Option<T> {
    match backend.get(key) {
        Ok(Some(raw)) => {
            let parsed = parse(&raw);
            if parsed.is_none() {
                tracing::warn!(key, value = %raw, "ignoring malformed preference");
            }
            parsed
        }
        Ok(None) => None,
        Err(err) => {
            tracing::warn!(key, error = %format!("{err:#}"), "failed to read preference");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct BrokenBackend;

    impl PreferenceBackend for BrokenBackend {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            bail!("disk on fire")
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            bail!("disk on fire")
        }
    }

    #[test]
    fn first_load_uses_defaults() {
        let prefs = Preferences::load(Arc::new(MemoryBackend::new()));
        assert_eq!(prefs.font_size(), 18);
        assert_eq!(prefs.theme(), Theme::Light);
        assert!(prefs.section_expanded(Section::Daily));
        assert!(!prefs.section_expanded(Section::Baogao));
        assert!(prefs.section_expanded(Section::Future));
        assert!(prefs.expanded_entries().is_empty());
    }

    #[test]
    fn malformed_values_fall_back_silently() {
        let backend = MemoryBackend::with_values([
            (KEY_FONT_SIZE, "huge"),
            (KEY_THEME, "sepia"),
            (KEY_EXPANDED_SECTIONS, "{not json"),
            (KEY_EXPANDED_ENTRIES, "[1, \"two\"]"),
        ]);
        let prefs = Preferences::load(Arc::new(backend));
        assert_eq!(prefs.font_size(), FONT_SIZE_DEFAULT);
        assert_eq!(prefs.theme(), Theme::Light);
        assert_eq!(prefs.sections, SectionStates::default());
        assert!(prefs.expanded_entries().is_empty());
    }

    #[test]
    fn backend_failures_do_not_panic() {
        let mut prefs = Preferences::load(Arc::new(BrokenBackend));
        assert_eq!(prefs.font_size(), FONT_SIZE_DEFAULT);
        assert_eq!(prefs.change_font_size(2), 20);
        prefs.set_entry_expanded(4, true);
        assert!(prefs.is_entry_expanded(4));
    }

    #[test]
    fn stored_values_are_restored() {
        let backend = MemoryBackend::with_values([
            (KEY_FONT_SIZE, "24"),
            (KEY_THEME, "dark"),
            (KEY_EXPANDED_SECTIONS, r#"{"daily":false,"baogao":true}"#),
            (KEY_EXPANDED_ENTRIES, "[9,3,3]"),
        ]);
        let prefs = Preferences::load(Arc::new(backend));
        assert_eq!(prefs.font_size(), 24);
        assert_eq!(prefs.theme(), Theme::Dark);
        assert!(!prefs.section_expanded(Section::Daily));
        assert!(prefs.section_expanded(Section::Baogao));
        assert!(prefs.section_expanded(Section::Future));
        assert_eq!(
            prefs.expanded_entries().iter().copied().collect::<Vec<_>>(),
            vec![3, 9]
        );
    }

    #[test]
    fn out_of_range_font_size_is_clamped_on_read() {
        let backend = MemoryBackend::with_values([(KEY_FONT_SIZE, "40")]);
        let prefs = Preferences::load(Arc::new(backend));
        assert_eq!(prefs.font_size(), FONT_SIZE_MAX);
    }

    #[test]
    fn font_size_stays_within_bounds() {
        let backend = Arc::new(MemoryBackend::new());
        let mut prefs = Preferences::load(backend.clone());
        for _ in 0..20 {
            prefs.change_font_size(FONT_SIZE_STEP);
        }
        assert_eq!(prefs.font_size(), 28);
        assert_eq!(backend.raw(KEY_FONT_SIZE).as_deref(), Some("28"));
        for _ in 0..20 {
            prefs.change_font_size(-FONT_SIZE_STEP);
        }
        assert_eq!(prefs.font_size(), 14);
        assert_eq!(backend.raw(KEY_FONT_SIZE).as_deref(), Some("14"));
    }

    #[test]
    fn theme_toggle_twice_round_trips() {
        let backend = Arc::new(MemoryBackend::new());
        let mut prefs = Preferences::load(backend.clone());
        let original = prefs.theme();
        assert_eq!(prefs.toggle_theme(), Theme::Dark);
        assert_eq!(backend.raw(KEY_THEME).as_deref(), Some("dark"));
        assert_eq!(prefs.toggle_theme(), original);
        assert_eq!(backend.raw(KEY_THEME).as_deref(), Some(original.as_str()));
    }

    #[test]
    fn expanded_entries_serialize_as_sorted_array() {
        let backend = Arc::new(MemoryBackend::new());
        let mut prefs = Preferences::load(backend.clone());
        prefs.set_entry_expanded(12, true);
        prefs.set_entry_expanded(2, true);
        prefs.set_entry_expanded(12, true);
        assert_eq!(backend.raw(KEY_EXPANDED_ENTRIES).as_deref(), Some("[2,12]"));
        prefs.set_entry_expanded(2, false);
        assert_eq!(backend.raw(KEY_EXPANDED_ENTRIES).as_deref(), Some("[12]"));
    }

    #[test]
    fn section_flags_persist_as_object() {
        let backend = Arc::new(MemoryBackend::new());
        let mut prefs = Preferences::load(backend.clone());
        prefs.set_section_expanded(Section::Baogao, true);
        assert_eq!(
            backend.raw(KEY_EXPANDED_SECTIONS).as_deref(),
            Some(r#"{"baogao":true,"daily":true,"future":true}"#)
        );
        let reloaded = Preferences::load(backend);
        assert!(reloaded.section_expanded(Section::Baogao));
    }

    #[test]
    fn retain_prunes_and_persists() {
        let backend = Arc::new(MemoryBackend::with_values([(KEY_EXPANDED_ENTRIES, "[1,5,7]")]));
        let mut prefs = Preferences::load(backend.clone());
        prefs.retain_entries(|id| id != 5);
        assert_eq!(backend.raw(KEY_EXPANDED_ENTRIES).as_deref(), Some("[1,7]"));
    }
}
