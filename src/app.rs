use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config;
use crate::content;
use crate::data::{ContentService, HttpContentService, MockContentService};
use crate::logging;
use crate::preferences::Preferences;
use crate::reader::Reader;
use crate::storage;
use crate::ui;

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub base_url: Option<String>,
    pub demo: bool,
}

pub fn run(options: RunOptions) -> Result<()> {
    let mut cfg = config::load(config::LoadOptions::default()).context("load config")?;
    if let Some(base_url) = options.base_url {
        cfg.content.base_url = base_url;
    }

    logging::init(&cfg.log).context("initialize logging")?;
    tracing::info!(
        version = crate::VERSION,
        base_url = %cfg.content.base_url,
        demo = options.demo,
        "starting"
    );

    let store = storage::Store::open(storage::Options {
        path: cfg.storage.path.clone(),
    })
    .context("open storage")?;
    let prefs = Preferences::load(Arc::new(store));

    let service: Arc<dyn ContentService> = if options.demo {
        Arc::new(MockContentService::sample())
    } else {
        let client = content::Client::new(content::ClientConfig {
            base_url: cfg.content.base_url.clone(),
            user_agent: cfg.content.user_agent.clone(),
            timeout: Some(cfg.content.timeout),
            http_client: None,
        })
        .context("create content client")?;
        Arc::new(HttpContentService::new(Arc::new(client)))
    };

    let mut reader = Reader::new(service, prefs);
    reader.start();

    let mut model = ui::Model::new(reader);
    let result = model.run();
    tracing::info!("shutting down");
    result
}
