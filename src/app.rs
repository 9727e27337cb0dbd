//! Wiring of storage, extraction, database and the parse worker pool.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::extraction::{DocumentIntelligenceClient, ExtractionClient};
use crate::files::FileService;
use crate::parse::{JobDispatcher, ParseEvent, ParseJobRunner, ParseService};
use crate::repository::{DbContext, DieselError};
use crate::storage::{LocalStorage, Storage};

/// A running instance: services plus the background dispatcher.
pub struct App {
    pub db: DbContext,
    pub files: FileService,
    pub parse: ParseService,
    dispatcher: JobDispatcher,
}

impl App {
    /// Start from settings: migrate the database, use local storage and the
    /// Document Intelligence client.
    pub async fn start(settings: &Settings) -> Result<Self, DieselError> {
        let db = settings.create_db_context();
        db.init_schema().await?;

        let storage: Arc<dyn Storage> = Arc::new(LocalStorage::new(&settings.storage_dir));
        let client = DocumentIntelligenceClient::from_settings(&settings.extraction);
        if !client.is_configured() {
            tracing::warn!("Document Intelligence endpoint or key not set; parses will fail");
        }

        Ok(Self::with_parts(db, storage, Arc::new(client), settings, None))
    }

    /// Assemble from explicit parts. The database must already be migrated.
    pub fn with_parts(
        db: DbContext,
        storage: Arc<dyn Storage>,
        client: Arc<dyn ExtractionClient>,
        settings: &Settings,
        events: Option<mpsc::Sender<ParseEvent>>,
    ) -> Self {
        let runner = ParseJobRunner::new(
            db.clone(),
            storage.clone(),
            client,
            settings.extraction.timeout(),
        );
        let dispatcher = JobDispatcher::spawn(runner, settings.workers, events);
        let parse = ParseService::new(db.clone(), storage.clone(), dispatcher.queue());
        let files = FileService::new(db.clone(), storage, settings.max_upload_bytes);

        Self {
            db,
            files,
            parse,
            dispatcher,
        }
    }

    /// Stop accepting parses and wait for running ones to finish.
    pub async fn shutdown(self) {
        let Self {
            parse, dispatcher, ..
        } = self;
        drop(parse);
        dispatcher.shutdown().await;
    }
}
