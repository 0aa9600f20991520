use std::sync::Arc;

use parley_agent::{ChatService, FileService, GenerationWorker};
use parley_llm::ProviderRegistry;
use parley_persist::{BlobStore, DiskBlobStore, MemoryBlobStore, MemoryPersistenceClient, PersistenceClient};

use crate::config::{Config, StorageBackend};

/// Shared application state passed to all handlers
///
/// The services are built once at startup; handlers only borrow them.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chat: Arc<ChatService>,
    pub files: Arc<FileService>,
}

impl AppState {
    /// Wire storage, providers and the generation worker from `config`
    ///
    /// Fails when a provider key or the storage backend is unavailable.
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let db = connect_storage(&config).await?;
        let blobs: Arc<dyn BlobStore> = match &config.storage.files_dir {
            Some(dir) => Arc::new(DiskBlobStore::new(dir).await?),
            None => Arc::new(MemoryBlobStore::new()),
        };

        tracing::info!(providers = ?config.llm.enabled_providers, "initializing provider clients");
        let registry = Arc::new(ProviderRegistry::from_env(&config.llm.enabled_providers)?);

        Ok(Self::with_parts(config, db, blobs, registry))
    }

    /// Assemble the services over already-built dependencies
    pub fn with_parts(
        config: Config,
        db: Arc<dyn PersistenceClient>,
        blobs: Arc<dyn BlobStore>,
        registry: Arc<ProviderRegistry>,
    ) -> Self {
        let settings = config.llm.chat_settings();
        let worker = GenerationWorker::spawn(
            db.clone(),
            blobs.clone(),
            registry.clone(),
            settings.clone(),
            config.generation.clone(),
        );
        let files = Arc::new(FileService::new(db.clone(), blobs, config.uploads.clone()));
        let chat = Arc::new(ChatService::new(db, registry, files.clone(), worker, settings));

        Self {
            config: Arc::new(config),
            chat,
            files,
        }
    }
}

async fn connect_storage(config: &Config) -> anyhow::Result<Arc<dyn PersistenceClient>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("using in-memory storage, data is lost on restart");
            Ok(Arc::new(MemoryPersistenceClient::new()))
        }
        #[cfg(feature = "mongodb")]
        StorageBackend::Mongodb => {
            tracing::info!(database = %config.storage.database, "connecting to MongoDB");
            let client = parley_persist::MongoPersistenceClient::connect(
                &config.mongodb_uri,
                &config.storage.database,
            )
            .await?;
            tracing::info!("MongoDB connected");
            Ok(Arc::new(client))
        }
        #[cfg(not(feature = "mongodb"))]
        StorageBackend::Mongodb => Err(anyhow::anyhow!(
            "storage backend 'mongodb' requires building with the `mongodb` feature"
        )),
    }
}
