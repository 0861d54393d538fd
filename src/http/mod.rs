mod client;

pub use client::{ApiClient, ApiResponse, RequestContext, TOKEN_REFRESH_PATH};
