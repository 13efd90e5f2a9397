use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use reqwest::header::USER_AGENT;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

pub const DAILY_DOCUMENT_PATH: &str = "data/daily/morning-prayer.json";
pub const ENTRY_INDEX_PATH: &str = "data/baogao/index.json";
pub const ENTRY_DETAIL_DIR: &str = "data/baogao";

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },
    #[error("section {id:?} must carry exactly one of `content` or `subsections`")]
    InvalidSection { id: String },
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Body text as shipped in the JSON: either one newline-separated string or
/// an array of lines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Lines {
    Many(Vec<String>),
    Text(String),
}

impl Lines {
    pub fn lines(&self) -> Vec<&str> {
        match self {
            Lines::Many(lines) => lines.iter().map(String::as_str).collect(),
            Lines::Text(text) => text.split('\n').collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub source: String,
    pub source_url: String,
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSection")]
pub struct Section {
    pub id: String,
    pub title: String,
    pub intro: Option<String>,
    pub body: SectionBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionBody {
    Content(Lines),
    Subsections(Vec<Subsection>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Subsection {
    pub title: String,
    #[serde(default)]
    pub intro: Option<String>,
    pub content: Lines,
    #[serde(default)]
    pub deity: Option<String>,
}

#[derive(Deserialize)]
struct RawSection {
    id: String,
    title: String,
    #[serde(default)]
    intro: Option<String>,
    #[serde(default)]
    content: Option<Lines>,
    #[serde(default)]
    subsections: Option<Vec<Subsection>>,
}

impl TryFrom<RawSection> for Section {
    type Error = ContentError;

    fn try_from(raw: RawSection) -> Result<Self, Self::Error> {
        let body = match (raw.content, raw.subsections) {
            (Some(content), None) => SectionBody::Content(content),
            (None, Some(subsections)) => SectionBody::Subsections(subsections),
            _ => return Err(ContentError::InvalidSection { id: raw.id }),
        };
        Ok(Section {
            id: raw.id,
            title: raw.title,
            intro: raw.intro,
            body,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryIndex {
    pub source: String,
    pub source_url: String,
    pub total_entries: u32,
    pub entries: Vec<EntrySummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntrySummary {
    pub id: u32,
    pub title: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntryDetail {
    #[serde(default)]
    pub intro: Option<String>,
    pub content: String,
}

pub fn detail_file_name(id: u32) -> String {
    format!("{id:03}.json")
}

pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            bail!("content client user agent required");
        }

        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).with_context(|| format!("parse content base url {base:?}"))?;

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()
                .context("build content HTTP client")?,
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn fetch_daily_document(&self) -> Result<Document> {
        self.get_json(DAILY_DOCUMENT_PATH)
            .context("fetch daily document")
    }

    pub fn fetch_entry_index(&self) -> Result<EntryIndex> {
        self.get_json(ENTRY_INDEX_PATH).context("fetch entry index")
    }

    /// Failures are logged and collapse to `None` so a single broken entry
    /// never takes the rest of the page with it.
    pub fn fetch_entry_detail(&self, id: u32) -> Option<EntryDetail> {
        let path = format!("{ENTRY_DETAIL_DIR}/{}", detail_file_name(id));
        match self.get_json::<EntryDetail>(&path) {
            Ok(detail) => Some(detail),
            Err(err) => {
                tracing::error!(id, error = %format!("{err:#}"), "failed to load entry detail");
                None
            }
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self
            .base_url
            .join(path)
            .with_context(|| format!("resolve {path} against {}", self.base_url))?;
        tracing::debug!(%url, "GET");
        let response = self
            .http
            .get(url.clone())
            .header(USER_AGENT, &self.user_agent)
            .send()
            .with_context(|| format!("request {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }
        response
            .json::<T>()
            .with_context(|| format!("decode {url}"))
    }
}
