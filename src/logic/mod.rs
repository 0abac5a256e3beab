pub mod filter;
pub mod query;

pub use filter::*;
pub use query::*;
