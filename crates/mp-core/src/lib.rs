pub mod error;
pub mod types;
pub mod value;

pub use error::ProblemError;
pub use types::*;
pub use value::*;
