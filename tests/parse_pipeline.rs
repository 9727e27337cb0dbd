//! Parse Pipeline Tests
//!
//! Drives trigger, background execution and read-back end to end against a
//! temporary SQLite database and local storage, with the extraction service
//! replaced by scripted clients.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{mpsc, Semaphore};

use tablemark::app::App;
use tablemark::config::{ExtractionSettings, Settings, WorkerSettings};
use tablemark::extraction::{
    DocumentIntelligenceClient, ExtractionClient, ExtractionError, RawBoundingRegion, RawCell,
    RawDocumentResult, RawTable,
};
use tablemark::models::{FailureKind, FileStatus};
use tablemark::parse::{ParseError, ParseEvent};
use tablemark::repository::{DbContext, NewUpload};
use tablemark::storage::{LocalStorage, Storage, StorageError};

const ORG: i32 = 7;
const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n%%EOF\n";

fn cell(row: usize, column: usize, content: &str) -> RawCell {
    RawCell {
        row_index: row,
        column_index: column,
        content: Some(content.to_string()),
        confidence: Some(0.9),
        ..Default::default()
    }
}

fn two_by_two(page: i32) -> RawTable {
    RawTable {
        row_count: 2,
        column_count: 2,
        cells: vec![
            cell(0, 0, "A"),
            cell(0, 1, "B"),
            cell(1, 0, "1"),
            cell(1, 1, "2"),
        ],
        bounding_regions: vec![RawBoundingRegion {
            page_number: page,
            polygon: vec![1.0, 1.0, 3.0, 1.0, 3.0, 2.0, 1.0, 2.0],
        }],
    }
}

fn document(tables: Vec<RawTable>, page_count: u32) -> RawDocumentResult {
    RawDocumentResult { page_count, tables }
}

/// Returns queued results in order, repeating the last one.
struct ScriptedClient {
    results: Mutex<VecDeque<RawDocumentResult>>,
}

impl ScriptedClient {
    fn new(results: Vec<RawDocumentResult>) -> Arc<Self> {
        Arc::new(Self {
            results: Mutex::new(results.into()),
        })
    }
}

#[async_trait]
impl ExtractionClient for ScriptedClient {
    async fn analyze(
        &self,
        _content: &[u8],
        _content_type: &str,
    ) -> Result<RawDocumentResult, ExtractionError> {
        let mut results = self.results.lock().unwrap();
        if results.len() > 1 {
            Ok(results.pop_front().unwrap())
        } else {
            Ok(results.front().cloned().unwrap_or_default())
        }
    }
}

/// Each call waits for one permit on the gate.
struct GatedClient {
    gate: Arc<Semaphore>,
}

fn gated() -> (Arc<Semaphore>, Arc<GatedClient>) {
    let gate = Arc::new(Semaphore::new(0));
    (gate.clone(), Arc::new(GatedClient { gate }))
}

#[async_trait]
impl ExtractionClient for GatedClient {
    async fn analyze(
        &self,
        _content: &[u8],
        _content_type: &str,
    ) -> Result<RawDocumentResult, ExtractionError> {
        self.gate.acquire().await.unwrap().forget();
        Ok(document(vec![two_by_two(1)], 1))
    }
}

struct RejectingClient;

#[async_trait]
impl ExtractionClient for RejectingClient {
    async fn analyze(
        &self,
        _content: &[u8],
        _content_type: &str,
    ) -> Result<RawDocumentResult, ExtractionError> {
        Err(ExtractionError::Rejected("corrupt PDF".to_string()))
    }
}

struct HangingClient;

#[async_trait]
impl ExtractionClient for HangingClient {
    async fn analyze(
        &self,
        _content: &[u8],
        _content_type: &str,
    ) -> Result<RawDocumentResult, ExtractionError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(RawDocumentResult::default())
    }
}

struct PanickingClient;

#[async_trait]
impl ExtractionClient for PanickingClient {
    async fn analyze(
        &self,
        _content: &[u8],
        _content_type: &str,
    ) -> Result<RawDocumentResult, ExtractionError> {
        panic!("layout model exploded");
    }
}

/// Local storage that adds a new version of a file the first time a
/// trigger checks for content.
struct ReplaceOnCheck {
    inner: LocalStorage,
    db: DbContext,
    replace: Arc<Mutex<Option<i32>>>,
}

#[async_trait]
impl Storage for ReplaceOnCheck {
    async fn exists(&self, key: &str) -> bool {
        let replace = self.replace.lock().unwrap().take();
        if let Some(file_id) = replace {
            self.inner.write("replacement.pdf", PDF).await.unwrap();
            let upload = NewUpload {
                storage_path: "replacement.pdf",
                size: PDF.len() as i64,
                mime_type: Some("application/pdf"),
                checksum: None,
                metadata: serde_json::Map::new(),
            };
            self.db
                .files()
                .add_version(file_id, &upload)
                .await
                .unwrap()
                .unwrap();
        }
        self.inner.exists(key).await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
        self.inner.write(key, content).await
    }
}

/// Local storage whose objects exist but can no longer be read.
struct UnreadableStorage {
    inner: LocalStorage,
}

#[async_trait]
impl Storage for UnreadableStorage {
    async fn exists(&self, key: &str) -> bool {
        self.inner.exists(key).await
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn write(&self, key: &str, content: &[u8]) -> Result<(), StorageError> {
        self.inner.write(key, content).await
    }
}

struct Harness {
    app: App,
    events: mpsc::Receiver<ParseEvent>,
    settings: Settings,
    project_id: i32,
    _dir: TempDir,
}

impl Harness {
    async fn new(client: Arc<dyn ExtractionClient>) -> Self {
        Self::build(client, WorkerSettings::default(), 64, |local, _| Arc::new(local)).await
    }

    async fn build<F>(
        client: Arc<dyn ExtractionClient>,
        workers: WorkerSettings,
        event_capacity: usize,
        storage: F,
    ) -> Self
    where
        F: FnOnce(LocalStorage, DbContext) -> Arc<dyn Storage>,
    {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::with_data_dir(dir.path().to_path_buf());
        settings.extraction.timeout_secs = 1;
        settings.workers = workers;
        settings.ensure_directories().unwrap();

        let db = settings.create_db_context();
        db.init_schema().await.unwrap();
        let project = db.projects().create(ORG, "Audits").await.unwrap();

        let storage = storage(LocalStorage::new(&settings.storage_dir), db.clone());
        let (tx, events) = mpsc::channel(event_capacity);
        let app = App::with_parts(db, storage, client, &settings, Some(tx));

        Self {
            app,
            events,
            settings,
            project_id: project.id,
            _dir: dir,
        }
    }

    async fn upload(&self, name: &str, content: &[u8], mime: &str) -> i32 {
        let (file, _) = self
            .app
            .files
            .upload(ORG, self.project_id, name, content, Some(mime))
            .await
            .unwrap();
        file.id
    }

    async fn next_event(&mut self) -> ParseEvent {
        tokio::time::timeout(Duration::from_secs(10), self.events.recv())
            .await
            .expect("timed out waiting for parse")
            .expect("event channel closed")
    }

    /// Wait for the next terminal event of a job.
    async fn settled(&mut self) -> ParseEvent {
        loop {
            let event = self.next_event().await;
            if !matches!(event, ParseEvent::Started { .. }) {
                return event;
            }
        }
    }
}

#[tokio::test]
async fn successful_parse_stores_normalized_tables() {
    let mut h = Harness::new(ScriptedClient::new(vec![document(vec![two_by_two(1)], 1)])).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    let receipt = h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    assert_eq!(receipt.status, FileStatus::InProgress);
    assert_eq!(receipt.attempt, 1);

    let event = h.settled().await;
    assert!(matches!(
        event,
        ParseEvent::Completed {
            tables: 1,
            pages: 1,
            ..
        }
    ));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Completed);
    assert_eq!(status.tables_found, 1);
    assert_eq!(status.page_count, 1);
    assert!(status.last_error.is_none());
    assert!(status.completed_at.is_some());

    let tables = h.app.parse.list_tables(ORG, file_id).await.unwrap();
    assert_eq!(tables.len(), 1);
    let table = &tables[0];
    assert_eq!(table.headers, vec![vec!["A".to_string(), "B".to_string()]]);
    assert_eq!(table.rows, vec![vec!["1".to_string(), "2".to_string()]]);
    assert_eq!(table.page_number, 1);
    assert_eq!(table.row_count, 2);
    assert_eq!(table.column_count, 2);
    let bbox = table.bbox.unwrap();
    assert_eq!((bbox.x, bbox.y, bbox.width, bbox.height), (1.0, 1.0, 2.0, 1.0));

    let single = h.app.parse.get_table(ORG, file_id, table.id).await.unwrap();
    assert_eq!(single.id, table.id);
    assert_eq!(single.rows, table.rows);

    h.app.shutdown().await;
}

#[tokio::test]
async fn second_trigger_while_running_conflicts() {
    let (gate, client) = gated();
    let mut h = Harness::new(client).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    let second = h.app.parse.trigger_parse(ORG, file_id).await;
    assert!(matches!(second, Err(ParseError::Conflict(id)) if id == file_id));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::InProgress);
    assert_eq!(status.attempt, 1);

    gate.add_permits(1);
    assert!(matches!(h.settled().await, ParseEvent::Completed { .. }));

    h.app.shutdown().await;
}

#[tokio::test]
async fn rejected_document_rolls_back_to_pending() {
    let mut h = Harness::new(Arc::new(RejectingClient)).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    let event = h.settled().await;
    assert!(matches!(
        event,
        ParseEvent::Failed {
            kind: FailureKind::Permanent,
            ..
        }
    ));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Pending);
    assert_eq!(status.failure, Some(FailureKind::Permanent));
    assert!(status.last_error.unwrap().contains("corrupt PDF"));
    assert_eq!(status.tables_found, 0);
    assert!(h.app.parse.list_tables(ORG, file_id).await.unwrap().is_empty());

    // A failed file can be triggered again
    let retry = h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    assert_eq!(retry.attempt, 2);
    h.settled().await;

    h.app.shutdown().await;
}

#[tokio::test]
async fn extraction_timeout_is_transient() {
    let mut h = Harness::new(Arc::new(HangingClient)).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    let event = h.settled().await;
    assert!(matches!(
        event,
        ParseEvent::Failed {
            kind: FailureKind::Transient,
            ..
        }
    ));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Pending);
    assert_eq!(status.failure, Some(FailureKind::Transient));
    assert!(status.last_error.unwrap().contains("timed out"));

    h.app.shutdown().await;
}

#[tokio::test]
async fn panicking_job_is_recorded_as_internal() {
    let mut h = Harness::new(Arc::new(PanickingClient)).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    let event = h.settled().await;
    assert!(matches!(
        event,
        ParseEvent::Failed {
            kind: FailureKind::Internal,
            ..
        }
    ));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Pending);
    assert_eq!(status.failure, Some(FailureKind::Internal));
    assert!(status.last_error.unwrap().contains("layout model exploded"));

    h.app.shutdown().await;
}

#[tokio::test]
async fn reparse_replaces_previous_tables() {
    let mut h = Harness::new(ScriptedClient::new(vec![
        document(vec![two_by_two(1), two_by_two(2)], 2),
        document(vec![two_by_two(3)], 3),
    ]))
    .await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    h.settled().await;
    let first = h.app.parse.list_tables(ORG, file_id).await.unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(
        first.iter().map(|t| t.page_number).collect::<Vec<_>>(),
        vec![1, 2]
    );

    let receipt = h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    assert_eq!(receipt.attempt, 2);
    h.settled().await;

    let second = h.app.parse.list_tables(ORG, file_id).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].page_number, 3);
    assert_eq!(second[0].attempt, 2);
    assert!(first.iter().all(|t| t.id != second[0].id));

    let stale = h.app.parse.get_table(ORG, file_id, first[0].id).await;
    assert!(matches!(stale, Err(ParseError::NotFound(_))));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.tables_found, 1);
    assert_eq!(status.page_count, 3);

    h.app.shutdown().await;
}

#[tokio::test]
async fn get_status_does_not_change_anything() {
    let mut h = Harness::new(ScriptedClient::new(vec![document(vec![two_by_two(1)], 1)])).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;
    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    h.settled().await;

    let first = h.app.parse.get_status(ORG, file_id).await.unwrap();
    let second = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );

    h.app.shutdown().await;
}

#[tokio::test]
async fn non_pdf_is_rejected_without_state_change() {
    let h = Harness::new(ScriptedClient::new(vec![])).await;
    let file_id = h.upload("notes.txt", b"just some text", "text/plain").await;

    let result = h.app.parse.trigger_parse(ORG, file_id).await;
    assert!(matches!(result, Err(ParseError::InvalidState(_))));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Pending);
    assert_eq!(status.attempt, 0);

    h.app.shutdown().await;
}

#[tokio::test]
async fn missing_content_is_rejected_without_state_change() {
    let h = Harness::new(ScriptedClient::new(vec![])).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    let versions = h.app.files.versions(ORG, file_id).await.unwrap();
    let path = h.settings.storage_dir.join(&versions[0].storage_path);
    std::fs::remove_file(path).unwrap();

    let result = h.app.parse.trigger_parse(ORG, file_id).await;
    assert!(matches!(result, Err(ParseError::InvalidState(_))));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Pending);
    assert_eq!(status.attempt, 0);

    h.app.shutdown().await;
}

#[tokio::test]
async fn other_org_and_deleted_files_are_not_found() {
    let h = Harness::new(ScriptedClient::new(vec![])).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    assert!(matches!(
        h.app.parse.trigger_parse(ORG + 1, file_id).await,
        Err(ParseError::NotFound(_))
    ));
    assert!(matches!(
        h.app.parse.get_status(ORG + 1, file_id).await,
        Err(ParseError::NotFound(_))
    ));
    assert!(matches!(
        h.app.parse.list_tables(ORG + 1, file_id).await,
        Err(ParseError::NotFound(_))
    ));

    h.app.files.soft_delete(ORG, file_id).await.unwrap();
    assert!(matches!(
        h.app.parse.trigger_parse(ORG, file_id).await,
        Err(ParseError::NotFound(_))
    ));
    assert!(matches!(
        h.app.parse.get_status(ORG, file_id).await,
        Err(ParseError::NotFound(_))
    ));

    h.app.shutdown().await;
}

#[tokio::test]
async fn replace_is_refused_while_parsing() {
    let (gate, client) = gated();
    let mut h = Harness::new(client).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    let replaced = h
        .app
        .files
        .replace(ORG, file_id, "report-v2.pdf", PDF, Some("application/pdf"))
        .await;
    assert!(replaced.is_err());

    gate.add_permits(1);
    h.settled().await;

    let version = h
        .app
        .files
        .replace(ORG, file_id, "report-v2.pdf", b"%PDF-1.5\n%%EOF\n", Some("application/pdf"))
        .await
        .unwrap();
    assert_eq!(version.version_number, 2);

    // Old tables stay readable until the new version is parsed
    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Pending);
    assert_eq!(status.tables_found, 1);

    h.app.shutdown().await;
}

#[tokio::test]
async fn trigger_racing_a_replace_parses_the_new_version() {
    let replace = Arc::new(Mutex::new(None));
    let armed = replace.clone();
    let mut h = Harness::build(
        ScriptedClient::new(vec![document(vec![two_by_two(1)], 1)]),
        WorkerSettings::default(),
        64,
        move |inner, db| {
            Arc::new(ReplaceOnCheck {
                inner,
                db,
                replace: armed,
            })
        },
    )
    .await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    *replace.lock().unwrap() = Some(file_id);
    let result = h.app.parse.trigger_parse(ORG, file_id).await;
    assert!(matches!(result, Err(ParseError::VersionChanged(id)) if id == file_id));

    let file = h.app.files.get(ORG, file_id).await.unwrap();
    assert_eq!(file.status, FileStatus::Pending);
    assert_eq!(file.parse_attempt, 0);
    assert_eq!(file.current_version, 2);
    let active_version = file.active_version_id.unwrap();

    // Triggering again picks up the replacement
    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    assert!(matches!(h.settled().await, ParseEvent::Completed { .. }));

    let tables = h.app.parse.list_tables(ORG, file_id).await.unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].version_id, active_version);

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Completed);
    assert_eq!(status.page_count, 1);

    h.app.shutdown().await;
}

#[tokio::test]
async fn missing_credentials_are_recorded_as_configuration() {
    let client = DocumentIntelligenceClient::from_settings(&ExtractionSettings {
        endpoint: None,
        api_key: None,
        ..ExtractionSettings::default()
    });
    let mut h = Harness::new(Arc::new(client)).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    assert!(matches!(
        h.settled().await,
        ParseEvent::Failed {
            kind: FailureKind::Configuration,
            ..
        }
    ));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Pending);
    assert_eq!(status.failure, Some(FailureKind::Configuration));
    assert_eq!(status.tables_found, 0);

    h.app.shutdown().await;
}

#[tokio::test]
async fn unreadable_content_is_recorded_as_storage() {
    let mut h = Harness::build(
        ScriptedClient::new(vec![document(vec![two_by_two(1)], 1)]),
        WorkerSettings::default(),
        64,
        |inner, _| Arc::new(UnreadableStorage { inner }),
    )
    .await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    assert!(matches!(
        h.settled().await,
        ParseEvent::Failed {
            kind: FailureKind::Storage,
            ..
        }
    ));

    let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
    assert_eq!(status.status, FileStatus::Pending);
    assert_eq!(status.failure, Some(FailureKind::Storage));
    assert_eq!(status.tables_found, 0);

    h.app.shutdown().await;
}

#[tokio::test]
async fn failed_commit_is_recorded_as_persistence() {
    let (gate, client) = gated();
    let mut h = Harness::new(client).await;
    let file_id = h.upload("report.pdf", PDF, "application/pdf").await;

    h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
    assert!(matches!(h.next_event().await, ParseEvent::Started { .. }));

    // Break the table store while extraction is running
    let conn = rusqlite::Connection::open(h.settings.database_path()).unwrap();
    conn.execute_batch("DROP TABLE parse_tables").unwrap();
    drop(conn);

    gate.add_permits(1);
    assert!(matches!(
        h.settled().await,
        ParseEvent::Failed {
            kind: FailureKind::Persistence,
            ..
        }
    ));

    let file = h.app.db.files().get(file_id).await.unwrap().unwrap();
    assert_eq!(file.status, FileStatus::Pending);
    assert_eq!(file.parse_failure, Some(FailureKind::Persistence));
    assert!(file.parse_completed_at.is_none());

    h.app.shutdown().await;
}

#[tokio::test]
async fn full_queue_rolls_trigger_back_as_dispatch() {
    let (gate, client) = gated();
    let workers = WorkerSettings {
        concurrency: 1,
        queue_capacity: 1,
    };
    let mut h = Harness::build(client, workers, 64, |local, _| Arc::new(local)).await;

    let mut file_ids = Vec::new();
    for name in ["a.pdf", "b.pdf", "c.pdf", "d.pdf"] {
        file_ids.push(h.upload(name, PDF, "application/pdf").await);
    }

    h.app.parse.trigger_parse(ORG, file_ids[0]).await.unwrap();
    assert!(matches!(h.next_event().await, ParseEvent::Started { .. }));

    // One job runs, one waits for a permit and one sits in the queue at most
    let mut accepted = 1;
    let mut rejected = Vec::new();
    for &file_id in &file_ids[1..] {
        match h.app.parse.trigger_parse(ORG, file_id).await {
            Ok(_) => accepted += 1,
            Err(ParseError::Dispatch(_)) => rejected.push(file_id),
            Err(e) => panic!("unexpected trigger error: {}", e),
        }
    }
    assert!(!rejected.is_empty());

    for &file_id in &rejected {
        let status = h.app.parse.get_status(ORG, file_id).await.unwrap();
        assert_eq!(status.status, FileStatus::Pending);
        assert_eq!(status.failure, Some(FailureKind::Dispatch));
    }

    gate.add_permits(accepted);
    for _ in 0..accepted {
        assert!(matches!(h.settled().await, ParseEvent::Completed { .. }));
    }

    h.app.shutdown().await;
}

#[tokio::test]
async fn undrained_events_do_not_stall_workers() {
    let mut h = Harness::build(
        ScriptedClient::new(vec![document(vec![two_by_two(1)], 1)]),
        WorkerSettings::default(),
        1,
        |local, _| Arc::new(local),
    )
    .await;
    let first = h.upload("a.pdf", PDF, "application/pdf").await;
    let second = h.upload("b.pdf", PDF, "application/pdf").await;

    for file_id in [first, second] {
        h.app.parse.trigger_parse(ORG, file_id).await.unwrap();
        let status = h
            .app
            .parse
            .wait_until_settled(ORG, file_id, Duration::from_millis(20), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(status.status, FileStatus::Completed);
    }

    tokio::time::timeout(Duration::from_secs(10), h.app.shutdown())
        .await
        .expect("shutdown waited on the event listener");
}
