pub mod types;
pub mod view_model;

pub use types::*;
pub use view_model::*;
