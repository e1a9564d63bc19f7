//! Platform client implementations

mod in_memory;
mod rest_client;

pub use in_memory::InMemoryPlatform;
pub use rest_client::RestPlatformClient;
