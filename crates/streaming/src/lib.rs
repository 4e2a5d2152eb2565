pub mod cache;
pub mod layers;
pub mod overlay;
pub mod probe;
pub mod request;
pub mod residency;
pub mod source;

pub use cache::*;
pub use layers::*;
pub use overlay::*;
pub use probe::*;
pub use request::*;
pub use residency::*;
pub use source::*;
