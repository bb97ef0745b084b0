//! Safe SQL builder: identifiers from the model only, values as parameters.

mod builder;
pub use builder::*;
