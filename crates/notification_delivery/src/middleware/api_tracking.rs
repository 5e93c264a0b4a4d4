/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

use crate::incoming_api;
use crate::tools::prometheus::INCOMING_API;
use hyper::Body;
use std::{
    pin::Pin,
    task::{Context, Poll},
    time::Instant,
};
use tonic::body::BoxBody;
use tower::{Layer, Service};

/// Records one `INCOMING_API` observation per RPC, labeled with the
/// `grpc-status`/`grpc-message` trailers when the handler set them.
#[derive(Debug, Clone, Default)]
pub struct ApiTrackingMiddlewareLayer;

impl<S> Layer<S> for ApiTrackingMiddlewareLayer {
    type Service = ApiTrackingMiddleware<S>;

    fn layer(&self, service: S) -> Self::Service {
        ApiTrackingMiddleware { inner: service }
    }
}

#[derive(Debug, Clone)]
pub struct ApiTrackingMiddleware<S> {
    inner: S,
}

type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

fn grpc_status_labels(response: &hyper::Response<BoxBody>) -> (String, String) {
    let headers = response.headers();
    let status = headers
        .get("grpc-status")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("0");
    let message = headers
        .get("grpc-message")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("OK");
    (status.to_string(), message.to_string())
}

impl<S> Service<hyper::Request<Body>> for ApiTrackingMiddleware<S>
where
    S: Service<hyper::Request<Body>, Response = hyper::Response<BoxBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: hyper::Request<Body>) -> Self::Future {
        let start_time = Instant::now();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let req_path = req.uri().path().to_string();
        let req_method = req.method().to_string();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let (status, message) = grpc_status_labels(&response);
            incoming_api!(
                req_method.as_str(),
                req_path.as_str(),
                status.as_str(),
                message.as_str(),
                start_time
            );

            Ok(response)
        })
    }
}
