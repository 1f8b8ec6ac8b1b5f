pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod extract;
pub mod http;
pub mod metrics;
pub mod orchestrator;
pub mod predicate;
pub mod race;
pub mod template;
pub mod totp;

pub use config::{Config, Overrides};
pub use error::Error;
pub use orchestrator::{Orchestrator, Trace};
