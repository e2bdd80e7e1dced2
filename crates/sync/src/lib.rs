pub mod config;
pub mod fetch;
pub mod list;
pub mod machine;
pub mod reconcile;
pub mod renderer;
pub mod service;
pub mod viewport;

pub use config::*;
pub use fetch::*;
pub use list::*;
pub use machine::*;
pub use reconcile::*;
pub use renderer::*;
pub use service::*;
pub use viewport::*;
