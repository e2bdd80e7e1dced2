pub mod dedup;
pub mod entity;
pub mod normalize;
pub mod raw;

pub use dedup::*;
pub use entity::*;
pub use normalize::*;
pub use raw::*;
