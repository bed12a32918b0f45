pub mod api;
pub mod auth;
pub mod bot;
pub mod cli;
pub mod entity;
pub mod error;
pub mod init_data;
pub mod logging;
pub mod runtime;
pub mod storage;

pub use auth::{AuthConfig, AuthGate, ResolvedIdentity};
pub use entity::Note;
pub use error::{NotesError, Result};
pub use init_data::{LaunchData, ValidationError};
pub use storage::NoteStore;
