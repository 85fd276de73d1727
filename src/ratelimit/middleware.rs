//! 限流中间件
//!
//! 被拒绝的请求直接返回 429，带 `Retry-After`（秒，向上取整）。

use std::rc::Rc;
use std::sync::Arc;

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::RETRY_AFTER,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde_json::json;
use tracing::debug;

use super::{RateLimitDecision, RateLimiters, client_identity_from_request};
use crate::errors::SnaplinkError;

#[derive(Clone)]
pub struct RateLimit {
    limiters: Arc<RateLimiters>,
}

impl RateLimit {
    pub fn new(limiters: Arc<RateLimiters>) -> Self {
        Self { limiters }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service: Rc::new(service),
            limiters: Arc::clone(&self.limiters),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limiters: Arc<RateLimiters>,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let limiters = Arc::clone(&self.limiters);

        Box::pin(async move {
            if limiters.is_enabled() {
                let client = client_identity_from_request(&req);
                if let RateLimitDecision::Rejected { retry_after } = limiters.check(&client).await
                {
                    debug!("Rate limited: client={} path={}", client, req.path());
                    return Ok(req.into_response(
                        too_many_requests(retry_after.map(|d| d.as_secs_f64().ceil() as u64))
                            .map_into_right_body(),
                    ));
                }
            }

            srv.call(req).await.map(ServiceResponse::map_into_left_body)
        })
    }
}

fn too_many_requests(retry_after_secs: Option<u64>) -> HttpResponse {
    let err = SnaplinkError::rate_limited("Too many requests, please try again later");
    let mut builder = HttpResponse::TooManyRequests();
    if let Some(secs) = retry_after_secs {
        builder.insert_header((RETRY_AFTER, secs.max(1).to_string()));
    }
    builder.json(json!({
        "code": err.code(),
        "error": err.error_type(),
        "message": err.message(),
        "retry_after": retry_after_secs,
    }))
}
