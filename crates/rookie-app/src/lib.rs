// Application layer: configuration files and the Sleeper league provider.

pub mod config;
pub mod sleeper;
