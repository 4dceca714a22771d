mod api;
mod common;

pub use api::{api_routes, BODY_LIMIT_BYTES};
pub use common::common_routes;
