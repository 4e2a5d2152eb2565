//! Map-session controller: ties drawing, the polygon store, the remote
//! mirror and the overlay/probe readers together.

pub mod config;
pub mod controller;
pub mod error;
pub mod telemetry;

pub use config::SessionConfig;
pub use controller::{FieldSession, SyncTask};
pub use error::SessionError;
