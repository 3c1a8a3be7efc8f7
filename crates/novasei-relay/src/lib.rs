//! Contact and quote form relay for the novasei marketing site.
//!
//! Accepts form submissions, stores an optional uploaded file in an object
//! bucket, emails the operator and the submitter, and serves time-limited
//! download links for uploaded files.

pub mod config;
pub mod email;
pub mod error;
pub mod handlers;
pub mod intake;
pub mod mailer;
pub mod server;
pub mod storage;
pub mod token;
pub mod upload;

pub use config::{EmailConfig, RelayConfig, StorageBackend};
pub use error::{RelayError, Result};
pub use mailer::{Mailer, MailError, OutgoingEmail, ResendMailer};
pub use server::{router, AppState, RelayServer, ServerError};
pub use storage::{Bucket, LocalBucket, MemoryBucket, StorageError, StoredObject};
pub use token::{DownloadToken, TokenError};
