pub mod auth;
pub mod config;
pub mod content;
pub mod delta;
pub mod error;
pub mod files;
pub mod listing;
pub mod service;
pub mod views;
pub mod worker;

pub use auth::Caller;
pub use config::{ChatSettings, GenerationConfig, UploadSettings};
pub use error::{ChatError, Result};
pub use files::{FileForAi, FileService};
pub use listing::{
    ListMessagesArgs, MessagePage, MessageView, PaginationOpts, StreamArgs, StreamCursor,
    StreamView, SyncStreams, MAX_PAGE_SIZE,
};
pub use service::{
    title_from_prompt, ChatService, CreatedThread, SendMessageArgs, SendMessageResult,
    MAX_ATTACHMENTS,
};
pub use views::{AttachmentRecordView, ModelInfo, ThreadView};
pub use worker::{AbortRegistry, GenerationJob, GenerationWorker};
