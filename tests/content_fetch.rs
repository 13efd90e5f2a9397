use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use jingwen_tui::content::{Client, ClientConfig, SectionBody};
use jingwen_tui::data::HttpContentService;
use jingwen_tui::entries::CardPhase;
use jingwen_tui::preferences::{PreferenceBackend, Preferences, KEY_EXPANDED_ENTRIES};
use jingwen_tui::reader::{Loadable, Reader, DOCUMENT_LOAD_FAILED};
use jingwen_tui::storage::Store;

const DAILY: &str = r#"{
  "source": "玄門日誦",
  "sourceUrl": "https://example.org/daily",
  "sections": [
    {"id": "opening", "title": "開經偈", "intro": "先靜心", "content": "第一句\n第二句"},
    {"id": "praise", "title": "讚", "subsections": [
      {"title": "香讚", "content": ["道由心學", "心假香傳"], "deity": "三清"}
    ]}
  ]
}"#;

const INDEX: &str = r#"{
  "source": "寶誥集",
  "sourceUrl": "https://example.org/baogao",
  "totalEntries": 3,
  "entries": [
    {"id": 1, "title": "玉清寶誥", "file": "001.json"},
    {"id": 7, "title": "紫微寶誥", "file": "007.json"},
    {"id": 12, "title": "斗姥寶誥", "file": "012.json"}
  ]
}"#;

struct Fixture {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn spawn_content_server(daily_ok: bool) -> Fixture {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
    let base_url = format!("http://{}/site", server.server_addr());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    let (shutdown, shutdown_rx) = mpsc::channel::<()>();

    let handle = thread::spawn(move || loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }
        let request = match server.recv_timeout(Duration::from_millis(50)) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(_) => break,
        };
        let path = request.url().to_string();
        seen.lock().unwrap().push(path.clone());

        let (status, body) = match path.as_str() {
            "/site/data/daily/morning-prayer.json" if daily_ok => (200, DAILY.to_string()),
            "/site/data/daily/morning-prayer.json" => (500, "boom".to_string()),
            "/site/data/baogao/index.json" => (200, INDEX.to_string()),
            "/site/data/baogao/001.json" => (200, r#"{"content": "大羅元始"}"#.to_string()),
            "/site/data/baogao/007.json" => (
                200,
                r#"{"intro": "至心朝禮", "content": "紫微中天"}"#.to_string(),
            ),
            "/site/data/baogao/012.json" => (200, "{not json".to_string()),
            _ => (404, "not found".to_string()),
        };
        let _ = request.respond(tiny_http::Response::from_string(body).with_status_code(status));
    });

    Fixture {
        base_url,
        requests,
        shutdown,
        handle: Some(handle),
    }
}

fn client(base_url: &str) -> Client {
    Client::new(ClientConfig {
        base_url: base_url.to_string(),
        user_agent: "jingwen-tui-tests".to_string(),
        timeout: Some(Duration::from_secs(5)),
        http_client: None,
    })
    .expect("build client")
}

fn detail_requests(fixture: &Fixture, file: &str) -> usize {
    fixture
        .requests
        .lock()
        .unwrap()
        .iter()
        .filter(|path| path.ends_with(file))
        .count()
}

#[test]
fn fetches_both_documents() {
    let fixture = spawn_content_server(true);
    let client = client(&fixture.base_url);

    let daily = client.fetch_daily_document().expect("daily document");
    assert_eq!(daily.source, "玄門日誦");
    assert_eq!(daily.sections.len(), 2);
    match &daily.sections[1].body {
        SectionBody::Subsections(subs) => assert_eq!(subs[0].deity.as_deref(), Some("三清")),
        other => panic!("expected subsections, got {other:?}"),
    }

    let index = client.fetch_entry_index().expect("entry index");
    assert_eq!(index.total_entries, 3);
    assert_eq!(index.entries[1].id, 7);
}

#[test]
fn detail_uses_zero_padded_file_and_collapses_failures() {
    let fixture = spawn_content_server(true);
    let client = client(&fixture.base_url);

    let detail = client.fetch_entry_detail(7).expect("detail 7");
    assert_eq!(detail.intro.as_deref(), Some("至心朝禮"));
    assert_eq!(detail.content, "紫微中天");
    assert_eq!(detail_requests(&fixture, "/007.json"), 1);

    assert!(client.fetch_entry_detail(12).is_none(), "malformed json");
    assert!(client.fetch_entry_detail(99).is_none(), "missing file");
    assert_eq!(detail_requests(&fixture, "/099.json"), 1);
}

#[test]
fn server_errors_surface_on_document_fetches() {
    let fixture = spawn_content_server(false);
    let err = client(&fixture.base_url)
        .fetch_daily_document()
        .expect_err("500 must fail");
    assert!(format!("{err:#}").contains("500"), "error was: {err:#}");
}

#[test]
fn reader_restores_expanded_entries_over_http() {
    let fixture = spawn_content_server(false);
    let store = Store::open_in_memory().expect("in-memory store");
    store
        .set(KEY_EXPANDED_ENTRIES, "[7,42]")
        .expect("seed expanded entries");
    let store = Arc::new(store);

    let service = Arc::new(HttpContentService::new(Arc::new(client(&fixture.base_url))));
    let mut reader = Reader::new(service, Preferences::load(store.clone()));
    reader.start();
    assert!(reader.wait_idle(Duration::from_secs(10)));

    assert_eq!(
        reader.daily(),
        &Loadable::Failed(DOCUMENT_LOAD_FAILED.to_string())
    );
    let list = reader.entries().ready().expect("index rendered");
    let restored = list.card(7).expect("card 7");
    assert_eq!(restored.phase(), CardPhase::ExpandedLoaded);
    assert_eq!(restored.body().map(|b| b.intro.as_str()), Some("至心朝禮"));
    assert_eq!(list.card(1).unwrap().phase(), CardPhase::CollapsedUnloaded);
    // 42 is not in the index, so it is pruned from the persisted set
    assert_eq!(
        store.get(KEY_EXPANDED_ENTRIES).unwrap().as_deref(),
        Some("[7]")
    );

    reader.toggle_entry(7);
    reader.toggle_entry(7);
    reader.toggle_entry(1);
    assert!(reader.wait_idle(Duration::from_secs(10)));
    assert_eq!(detail_requests(&fixture, "/007.json"), 1);
    assert_eq!(detail_requests(&fixture, "/001.json"), 1);
    assert_eq!(
        store.get(KEY_EXPANDED_ENTRIES).unwrap().as_deref(),
        Some("[1,7]")
    );
}
