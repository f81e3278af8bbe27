//! Shared utilities

pub mod keychain;

pub use keychain::{resolve_api_key, KeychainManager, KeychainPort};
