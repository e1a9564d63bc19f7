//! Reconciliation verifier
//!
//! Drives simulated git events through the action and asserts that the
//! remote platform ends up in the state each event type must produce.

pub mod cleanup;
pub mod driver;
mod error;
pub mod fixtures;
pub mod scenarios;
pub mod scope;
pub mod verifier;

pub use cleanup::{with_cleanup, CleanupCoordinator};
pub use driver::EventDriver;
pub use error::{ensure_eq, VerificationError};
pub use fixtures::{increase_model_memory_by_1mb, TestModel, TestRepository, MAIN_BRANCH};
pub use scope::{
    scoped, temporarily_replace_schema, temporarily_replace_schema_value,
    upload_and_associate_actuals,
};
pub use verifier::RemoteStateVerifier;
