pub mod config;
pub mod definition;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, LoadOptions};
pub use definition::{validate_definition, DefinitionError};
pub use domain::intent::Intent;
pub use domain::session::{Role, Session, SessionId, SessionSummary, Turn};
pub use errors::{ApplicationError, DomainError};
