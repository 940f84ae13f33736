//! HTTP middleware: request ids and access logging

pub mod access_log;
pub mod request_id;

pub use access_log::log_requests;
pub use request_id::{request_id_layer, X_REQUEST_ID};
