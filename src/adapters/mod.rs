/// Adapters - concrete implementations of the ports
///
/// These modules implement the port traits for specific services and databases.
pub mod services;
pub mod storage;
