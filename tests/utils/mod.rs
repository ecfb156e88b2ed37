pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use mocks::{BackendCall, RecordingBackend, RecordingEmailSender};
#[allow(unused_imports)]
pub use setup::{school_seed, TestSetup, TestSetupBuilder};
