//! Client-side logic of the Parley chat UI
//!
//! Everything here is pure state handling apart from [`api::ApiClient`],
//! which talks to the Parley HTTP API.

pub mod api;
pub mod error;
pub mod matching;
pub mod optimistic;
pub mod protocol;
pub mod routes;
pub mod sidebar;
pub mod uploads;

pub use api::ApiClient;
pub use error::{ClientError, Result};
pub use matching::{attachments_for_message, RenderedMessage, MATCH_WINDOW_MS};
pub use optimistic::{DisplayMessage, MessageCache, OPTIMISTIC_PREFIX};
pub use routes::{after_lookup, guard, Navigation, Route};
pub use sidebar::{bucket_for, group_threads, Bucket, ThreadGroup};
pub use uploads::{validate_upload, PendingUpload, UploadRejection, UploadState, UploadTracker};
