//! Runtime model: field definitions, values and records built from the resolved description.

mod field;
mod record;
mod value;

pub use field::*;
pub use record::*;
pub use value::*;
