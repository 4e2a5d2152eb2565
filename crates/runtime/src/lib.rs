use std::future::Future;
use std::pin::Pin;

pub mod cancel;
pub mod debounce;
pub mod event_bus;

pub use cancel::*;
pub use debounce::*;
pub use event_bus::*;

/// Boxed future that can be sent between threads; keeps async traits
/// dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
