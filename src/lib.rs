// Library crate for the PBIS collection service
// This file exposes the public API for integration tests

pub mod config;
pub mod email;
pub mod graphql;
pub mod operator;
pub mod pbis;
pub mod shared;

pub use config::{LevelOverflow, PbisConfig};
pub use email::{EmailReport, EmailSender, WinnerNotifier};
pub use operator::{OperatorClaims, TokenConfig};
pub use pbis::{CollectionOrchestrator, CollectionState, PbisBackend, PbisError};
pub use shared::{AppError, AppState};
