pub mod aggregate;
pub mod resolver;

pub use aggregate::summarize;
