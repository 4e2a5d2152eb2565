//! Remote polygon store and index services.
//!
//! `PolygonRemote` is the seam between the session and the backend. The HTTP
//! implementation talks to the polygon API; `MemoryPolygonRemote` stands in for
//! it in tests and offline hosts.

pub mod error;
pub mod http;
pub mod indices;
pub mod memory;
pub mod remote;
pub mod wire;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::*;
pub use http::*;
pub use indices::*;
pub use memory::*;
pub use remote::*;
pub use wire::*;
