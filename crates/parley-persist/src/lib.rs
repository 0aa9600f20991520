pub mod models;
pub mod error;
pub mod trait_client;
pub mod blob;
pub mod dbs;

pub use models::{
    AgentMessage, AgentThread, AttachmentRecord, DeltaPart, MessageRole, MessageStatus,
    NewAgentMessage, Session, StoredFile, StreamDelta, StreamRecord, StreamStatus, Thread,
    ThreadStatus, UploadToken, User, ALLOWED_CONTENT_TYPES, DEFAULT_THREAD_TITLE, MAX_UPLOAD_BYTES,
    is_allowed_content_type,
};
pub use error::{PersistError, Result};
pub use trait_client::PersistenceClient;
pub use blob::{BlobStore, DiskBlobStore, MemoryBlobStore};
pub use dbs::memory::MemoryPersistenceClient;
#[cfg(feature = "mongodb")]
pub use dbs::mongo::MongoPersistenceClient;
