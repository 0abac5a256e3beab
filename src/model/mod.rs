pub mod category;
pub mod common;
pub mod product;

pub use category::*;
pub use common::*;
pub use product::*;
