//! The HTTP service implementing hyper's `Service` trait.
//!
//! [`StorageHttpService`] ties routing, body collection and the storage
//! façade together. Every request gets:
//!
//! 1. An `x-request-id` (UUID v4) response header
//! 2. A [`CallContext`] bounded by the configured request timeout and
//!    cancelled on server shutdown
//! 3. A JSON envelope response, or a streamed body for object downloads

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::TryStreamExt;
use http::{HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde::Serialize;
use ssostore_storage::{
    CallContext, GuardedStorage, ObjectInfo, Operation, S3Backend, StorageBackend, StorageError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::body::ResponseBody;
use crate::response::{self, error_to_response};
use crate::router::{Route, RouteError, resolve_route};

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Message served on `/api/v1/students`.
const STUDENTS_MESSAGE: &str = "Building sso and cloud storage using keycloak and minio";

/// Server version reported by the health route.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration for the HTTP service.
#[derive(Debug, Clone)]
pub struct StorageHttpConfig {
    /// Deadline applied to the storage calls of every request.
    pub request_timeout: Duration,
    /// Emit one INFO event per served request.
    pub log_requests: bool,
}

impl Default for StorageHttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            log_requests: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

/// Hyper `Service` exposing a [`GuardedStorage`] over HTTP.
#[derive(Debug)]
pub struct StorageHttpService<B = S3Backend> {
    storage: GuardedStorage<B>,
    config: Arc<StorageHttpConfig>,
    shutdown: CancellationToken,
}

impl<B: StorageBackend> StorageHttpService<B> {
    /// Create a new service over `storage`.
    pub fn new(storage: GuardedStorage<B>, config: StorageHttpConfig) -> Self {
        Self {
            storage,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancel in-flight storage calls when `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Handle one request end to end.
    pub async fn handle<Bd>(&self, req: Request<Bd>) -> Response<ResponseBody>
    where
        Bd: http_body::Body<Data = Bytes>,
        Bd::Error: Display,
    {
        let request_id = Uuid::new_v4().to_string();
        let (parts, body) = req.into_parts();
        debug!(method = %parts.method, uri = %parts.uri, request_id, "processing request");

        let mut response = match resolve_route(&parts.method, parts.uri.path()) {
            Ok(route) => {
                let ctx = CallContext::from_token(self.shutdown.child_token())
                    .child(Some(self.config.request_timeout));
                self.dispatch(route, body, &ctx, &request_id).await
            }
            Err(err) => {
                debug!(error = %err, request_id, "failed to route request");
                route_error_response(&err)
            }
        };

        if self.config.log_requests {
            info!(
                method = %parts.method,
                path = parts.uri.path(),
                status = response.status().as_u16(),
                request_id,
                "request served"
            );
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    async fn dispatch<Bd>(
        &self,
        route: Route,
        body: Bd,
        ctx: &CallContext,
        request_id: &str,
    ) -> Response<ResponseBody>
    where
        Bd: http_body::Body<Data = Bytes>,
        Bd::Error: Display,
    {
        let storage = &self.storage;
        let result = match route {
            Route::Ping => return response::message(StatusCode::OK, "Ping Server OK"),
            Route::Students => return response::message(StatusCode::OK, STUDENTS_MESSAGE),
            Route::Health => {
                let health = Health {
                    status: "running",
                    version: VERSION,
                };
                return response::envelope(StatusCode::OK, "healthy", Some(health));
            }
            Route::ListBuckets => storage
                .list_buckets(ctx)
                .await
                .map(|buckets| response::envelope(StatusCode::OK, "Buckets listed", Some(buckets))),
            Route::MakeBucket { bucket } => storage.make_bucket(ctx, &bucket).await.map(|out| {
                let status = if out.created {
                    StatusCode::CREATED
                } else {
                    StatusCode::OK
                };
                response::envelope(status, out.message.clone(), Some(out))
            }),
            Route::RemoveBucket { bucket } => storage
                .remove_bucket(ctx, &bucket)
                .await
                .map(|()| response::message(StatusCode::OK, format!("Removed bucket name {bucket} success"))),
            Route::ListObjects { bucket } => match storage.list_objects(ctx, &bucket).await {
                Ok(stream) => stream
                    .try_collect::<Vec<ObjectInfo>>()
                    .await
                    .map(|objects| response::envelope(StatusCode::OK, "Objects listed", Some(objects))),
                Err(err) => Err(err),
            },
            Route::PutObject { bucket, key } => match read_body(body, ctx).await {
                Ok(data) => storage
                    .put_object(ctx, &bucket, &key, data)
                    .await
                    .map(|info| response::envelope(StatusCode::CREATED, "Object uploaded", Some(info))),
                Err(resp) => return resp,
            },
            Route::GetObject { bucket, key } => storage
                .get_object(ctx, &bucket, &key)
                .await
                .map(response::object),
            Route::RemoveObject { bucket, key } => storage
                .remove_object(ctx, &bucket, &key)
                .await
                .map(|()| response::message(StatusCode::OK, format!("Removed object {key} success"))),
        };

        match result {
            Ok(response) => {
                debug!(request_id, status = response.status().as_u16(), "request completed");
                response
            }
            Err(err) => {
                let response = error_to_response(&err);
                warn!(request_id, status = response.status().as_u16(), error = %err, "request failed");
                response
            }
        }
    }
}

impl<B> Clone for StorageHttpService<B> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<B: StorageBackend> hyper::service::Service<Request<Incoming>> for StorageHttpService<B> {
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let svc = self.clone();
        Box::pin(async move { Ok(svc.handle(req).await) })
    }
}

/// Collect the request body under `ctx`.
async fn read_body<Bd>(body: Bd, ctx: &CallContext) -> Result<Bytes, Response<ResponseBody>>
where
    Bd: http_body::Body<Data = Bytes>,
    Bd::Error: Display,
{
    match ctx.run(body.collect()).await {
        Ok(Ok(collected)) => Ok(collected.to_bytes()),
        Ok(Err(e)) => Err(response::message(
            StatusCode::BAD_REQUEST,
            format!("failed to read request body: {e}"),
        )),
        Err(reason) => Err(error_to_response(&StorageError::interrupted(
            Operation::PutObject,
            reason,
        ))),
    }
}

fn route_error_response(err: &RouteError) -> Response<ResponseBody> {
    let status = match err {
        RouteError::NotFound(_) => StatusCode::NOT_FOUND,
        RouteError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        RouteError::Malformed(_) => StatusCode::BAD_REQUEST,
    };
    response::message(status, err.to_string())
}
