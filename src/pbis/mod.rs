//! Weekly PBIS collection: level calculation, the weighted random drawing,
//! and the confirm-gated orchestrator that persists a run.

pub mod backend;
pub mod calculator;
pub mod drawing;
pub mod errors;
pub mod graphql_backend;
pub mod handlers;
pub mod levels;
pub mod models;
pub mod orchestrator;
pub mod payload;
pub mod random;
pub mod staff;

pub use backend::{BackendSeed, InMemoryPbisBackend, PbisBackend};
pub use calculator::calculate_preview;
pub use errors::PbisError;
pub use graphql_backend::GraphqlPbisBackend;
pub use models::{CollectionDate, CollectionPreview, CollectionSnapshot, TaStudent, TaTeacher};
pub use orchestrator::{
    CollectionForm, CollectionOrchestrator, CollectionState, ConfirmOptions, ConfirmOutcome,
    RunReport, RunStatus, StaffDrawOutcome,
};
pub use payload::{NewCollection, RecalculationTarget};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
