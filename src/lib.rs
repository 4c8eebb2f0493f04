pub mod cache;
pub mod config;
pub mod logger;
pub mod server;
pub mod upstream;

pub use config::*;
pub use logger::*;
pub use server::ApplicationServer;
