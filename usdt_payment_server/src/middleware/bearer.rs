//! Bearer token middleware for the order API.
//!
//! When a token is configured, every request must carry `Authorization: Bearer <token>`. Requests without it, or with
//! a different token, get a 401 with a JSON error body. With no token configured, requests pass straight through.
use std::{pin::Pin, rc::Rc};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
    ResponseError,
};
use futures::{
    future::{ok, Ready},
    Future,
};
use log::*;
use subtle::ConstantTimeEq;
use upg_common::Secret;

use crate::errors::ServerError;

pub struct BearerAuthFactory {
    token: Option<Secret<String>>,
}

impl BearerAuthFactory {
    pub fn new(token: Option<Secret<String>>) -> Self {
        BearerAuthFactory { token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BearerAuthFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = BearerAuthService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(BearerAuthService { token: self.token.clone(), service: Rc::new(service) })
    }
}

pub struct BearerAuthService<S> {
    token: Option<Secret<String>>,
    service: Rc<S>,
}

/// The token is compared in constant time.
fn is_authorised(req: &ServiceRequest, expected: &Secret<String>) -> bool {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| bool::from(t.trim().as_bytes().ct_eq(expected.reveal().as_bytes())))
        .unwrap_or(false)
}

impl<S, B> Service<ServiceRequest> for BearerAuthService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let allowed = self.token.as_ref().map(|t| is_authorised(&req, t)).unwrap_or(true);
        Box::pin(async move {
            if allowed {
                let res = service.call(req).await?;
                Ok(res.map_into_left_body())
            } else {
                debug!("💻️ Rejected {} {}: missing or invalid bearer token", req.method(), req.path());
                let response = ServerError::Unauthorized.error_response();
                Ok(req.into_response(response).map_into_right_body())
            }
        })
    }
}
