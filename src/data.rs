use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use crate::content::{
    self, Document, EntryDetail, EntryIndex, EntrySummary, Lines, Section, SectionBody, Subsection,
};

/// Source of everything the reader displays. The UI only talks to this
/// trait so it can be driven by a fake in tests.
pub trait ContentService: Send + Sync {
    fn load_daily_document(&self) -> Result<Document>;
    fn load_entry_index(&self) -> Result<EntryIndex>;
    fn load_entry_detail(&self, id: u32) -> Option<EntryDetail>;
}

pub struct HttpContentService {
    client: Arc<content::Client>,
}

impl HttpContentService {
    pub fn new(client: Arc<content::Client>) -> Self {
        Self { client }
    }
}

impl ContentService for HttpContentService {
    fn load_daily_document(&self) -> Result<Document> {
        self.client.fetch_daily_document()
    }

    fn load_entry_index(&self) -> Result<EntryIndex> {
        self.client.fetch_entry_index()
    }

    fn load_entry_detail(&self, id: u32) -> Option<EntryDetail> {
        self.client.fetch_entry_detail(id)
    }
}

/// In-memory content. Backs `--demo` and the tests; records every detail
/// request so callers can check how often the network would have been hit.
#[derive(Default)]
pub struct MockContentService {
    document: Option<Document>,
    index: Option<EntryIndex>,
    details: HashMap<u32, EntryDetail>,
    detail_calls: Mutex<Vec<u32>>,
}

impl MockContentService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_index(mut self, index: EntryIndex) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_detail(mut self, id: u32, detail: EntryDetail) -> Self {
        self.details.insert(id, detail);
        self
    }

    pub fn detail_calls(&self) -> Vec<u32> {
        self.detail_calls.lock().clone()
    }

    /// A small offline sample of both documents.
    pub fn sample() -> Self {
        let document = Document {
            source: "示例日課".into(),
            source_url: "https://example.org/daily".into(),
            sections: vec![
                Section {
                    id: "opening".into(),
                    title: "淨心神咒".into(),
                    intro: Some("誦經前靜坐片刻".into()),
                    body: SectionBody::Content(Lines::Many(vec![
                        "太上台星，應變無停。".into(),
                        "驅邪縛魅，保命護身。".into(),
                        "智慧明淨，心神安寧。".into(),
                    ])),
                },
                Section {
                    id: "praise".into(),
                    title: "讚頌".into(),
                    intro: None,
                    body: SectionBody::Subsections(vec![Subsection {
                        title: "香讚".into(),
                        intro: None,
                        content: Lines::Text("道由心學，心假香傳。\n香焚玉爐，心存帝前。".into()),
                        deity: Some("三清道祖".into()),
                    }]),
                },
            ],
        };
        let titles = ["玉清寶誥", "上清寶誥", "太清寶誥", "玉皇寶誥", "紫微寶誥"];
        let entries: Vec<EntrySummary> = titles
            .iter()
            .enumerate()
            .map(|(idx, title)| {
                let id = idx as u32 + 1;
                EntrySummary {
                    id,
                    title: (*title).to_string(),
                    file: content::detail_file_name(id),
                }
            })
            .collect();
        let mut service = Self::new()
            .with_document(document)
            .with_index(EntryIndex {
                source: "示例寶誥".into(),
                source_url: "https://example.org/baogao".into(),
                total_entries: entries.len() as u32,
                entries: entries.clone(),
            });
        for entry in entries.iter().take(4) {
            service = service.with_detail(
                entry.id,
                EntryDetail {
                    intro: None,
                    content: format!("{}：大羅元始，至真妙道。", entry.title),
                },
            );
        }
        service
    }
}

impl ContentService for MockContentService {
    fn load_daily_document(&self) -> Result<Document> {
        self.document
            .clone()
            .ok_or_else(|| anyhow!("no daily document in mock content"))
    }

    fn load_entry_index(&self) -> Result<EntryIndex> {
        self.index
            .clone()
            .ok_or_else(|| anyhow!("no entry index in mock content"))
    }

    fn load_entry_detail(&self, id: u32) -> Option<EntryDetail> {
        self.detail_calls.lock().push(id);
        self.details.get(&id).cloned()
    }
}
