//! Local working tree definitions

mod digest;
mod history;
mod scanner;

pub use digest::model_digest;
pub use history::RemovedDefinitions;
pub use scanner::{LocalDefinitions, LocalDeployment, LocalModel};
