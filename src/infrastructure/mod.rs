//! Infrastructure layer - platform clients, git, local definitions and the action

pub mod git;
pub mod http_client;
pub mod local;
pub mod logging;
pub mod platform;
pub mod services;
