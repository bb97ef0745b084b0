//! Request scope: id, span and timing of one request, released only once the response body is done.

use axum::body::{Body, Bytes};
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub struct RequestScope {
    request_id: Uuid,
    span: tracing::Span,
    started: Instant,
    status: StatusCode,
    bytes_sent: u64,
}

impl RequestScope {
    pub fn open(method: &Method, path: &str) -> Self {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("request", %request_id, %method, path = %path);
        RequestScope {
            request_id,
            span,
            started: Instant::now(),
            status: StatusCode::OK,
            bytes_sent: 0,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn span(&self) -> &tracing::Span {
        &self.span
    }

    /// Tag the response with the request id and move the scope into its body.
    pub fn attach(mut self, response: Response) -> Response {
        self.status = response.status();
        let (mut parts, body) = response.into_parts();
        if let Ok(value) = HeaderValue::from_str(&self.request_id.to_string()) {
            parts.headers.insert(REQUEST_ID_HEADER, value);
        }
        Response::from_parts(parts, Body::new(ScopedBody { inner: body, scope: self }))
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        let _entered = self.span.enter();
        tracing::info!(
            status = self.status.as_u16(),
            bytes = self.bytes_sent,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "request finished"
        );
    }
}

/// Response body that owns the request scope; dropping it (after the last frame
/// or on disconnect) releases the scope.
struct ScopedBody {
    inner: Body,
    scope: RequestScope,
}

impl HttpBody for ScopedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        if let Poll::Ready(Some(Ok(frame))) = &polled {
            if let Some(data) = frame.data_ref() {
                this.scope.bytes_sent += data.len() as u64;
            }
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
