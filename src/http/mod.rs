//! HTTP protocol layer module
//!
//! Response builders, cache validators and range handling shared by the
//! pipeline and the asset endpoint.

pub mod cache;
pub mod range;
pub mod response;

// Re-export commonly used items
pub use response::{
    build_304_response, build_404_response, build_405_response, build_416_response,
    build_asset_response, build_build_error_response, build_options_response,
    build_partial_response, HttpResponse,
};
