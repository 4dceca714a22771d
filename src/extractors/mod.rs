//! Request extractors.

mod request;

pub use request::{FormValues, RequestContext};
