//! HTTP middleware
//!
//! Author: sd207@naver.com

pub mod security_headers;

pub use crate::error::error_path_middleware;
pub use security_headers::security_headers_middleware;
