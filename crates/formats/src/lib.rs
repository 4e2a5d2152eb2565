pub mod codec;
pub mod crop;

pub use codec::*;
pub use crop::*;
