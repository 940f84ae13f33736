//! Request correlation ids
//!
//! Every request carries an `x-request-id`. A client-supplied id is kept;
//! otherwise a fresh one is minted and echoed on the response.

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Longest client-supplied id that is accepted as-is
const MAX_CLIENT_ID_LEN: usize = 128;

/// Mints compact uuid v4 ids (no hyphens)
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeCompactId;

impl MakeRequestId for MakeCompactId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().simple().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Layers that assign and echo the request id. The set layer must wrap the
/// propagate layer so the id exists before the response is built.
pub fn request_id_layer() -> (SetRequestIdLayer<MakeCompactId>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::new(X_REQUEST_ID, MakeCompactId),
        PropagateRequestIdLayer::new(X_REQUEST_ID),
    )
}

/// The request id as text, if it is printable and of sane length
pub fn request_id_of<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= MAX_CLIENT_ID_LEN)
}
