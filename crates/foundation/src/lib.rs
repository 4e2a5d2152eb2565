pub mod bounds;
pub mod color;
pub mod ids;
pub mod latlng;
pub mod math;
pub mod time;

// Foundation crate: small, well-tested geographic primitives only.
pub use bounds::*;
pub use color::*;
pub use ids::*;
pub use latlng::*;
pub use time::*;
