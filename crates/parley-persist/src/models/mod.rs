mod user;
mod thread;
mod message;
mod attachment;
mod stream;
mod file;

// Export database-agnostic models
pub use user::{Session, User};
pub use thread::{AgentThread, Thread, ThreadStatus, DEFAULT_THREAD_TITLE};
pub use message::{AgentMessage, MessageRole, MessageStatus, NewAgentMessage};
pub use attachment::AttachmentRecord;
pub use stream::{DeltaPart, StreamDelta, StreamRecord, StreamStatus};
pub use file::{
    is_allowed_content_type, StoredFile, UploadToken, ALLOWED_CONTENT_TYPES, MAX_UPLOAD_BYTES,
};
