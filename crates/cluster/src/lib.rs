pub mod error;
pub mod feature;
pub mod index;
pub mod kdtree;
pub mod leaf_set;
pub mod visible;

pub use error::*;
pub use feature::*;
pub use index::*;
pub use leaf_set::*;
pub use visible::*;
