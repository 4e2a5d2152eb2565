pub mod entity;
pub mod interaction;
pub mod picking;
pub mod selection;
pub mod store;

pub use entity::*;
pub use interaction::*;
pub use picking::pick_polygon;
pub use selection::Selection;
pub use store::*;
