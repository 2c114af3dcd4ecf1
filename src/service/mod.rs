//! Session management middleware for tower applications.
//!
//! [`SessionLayer`] gives every request a [`RequestContext`] and, once the
//! inner service has produced a response, saves every session the request
//! touched and writes the resulting `Set-Cookie` headers.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use http::{Request, Response};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::RequestContext;

/// A Tower Middleware to use [`RequestContext`].
#[derive(Clone, Debug)]
pub struct SessionService<S> {
    inner: S,
}

impl<ReqBody, ResBody, S> Service<Request<ReqBody>> for SessionService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future>;

    #[inline]
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let context = RequestContext::from_headers(req.headers());
        req.extensions_mut().insert(context.clone());

        ResponseFuture {
            future: self.inner.call(req),
            context: Some(context),
        }
    }
}

/// Layer to apply [`SessionService`] middleware.
///
/// # Example
///
/// ```rust
/// use axum::{Router, extract::State, routing::get};
/// use cookie_sessions::{CookieStore, KeyPair, RequestContext, SessionLayer, Store};
/// use std::sync::Arc;
///
/// async fn handler(State(store): State<Arc<CookieStore>>, ctx: RequestContext) -> String {
///     let session = store.get(&ctx, "session").unwrap().into_session();
///     let visits = session.get::<u32>("visits").unwrap().unwrap_or(0) + 1;
///     session.insert("visits", &visits).unwrap();
///     visits.to_string()
/// }
///
/// let store = CookieStore::new([KeyPair::new(b"hash-key".to_vec())]);
/// let app: Router = Router::new()
///     .route("/", get(handler))
///     .layer(SessionLayer::new())
///     .with_state(store);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SessionLayer {
    _priv: (),
}

impl SessionLayer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionService { inner }
    }
}

pin_project! {
    /// Response future for [`SessionService`].
    #[derive(Debug)]
    pub struct ResponseFuture<F> {
        #[pin]
        future: F,
        context: Option<RequestContext>,
    }
}

impl<F, Body, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<Response<Body>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let mut res = ready!(this.future.poll(cx)?);

        if let Some(context) = this.context.take() {
            if let Err(err) = context.save() {
                tracing::error!(err = %err, "failed to save sessions");
            }
            context.write_set_cookie_headers(res.headers_mut());
        }

        Poll::Ready(Ok(res))
    }
}
