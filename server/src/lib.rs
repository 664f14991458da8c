#![allow(clippy::new_without_default)]

use app::App;
use contracts::{messages, ErrorResult, Route, UPLOADS_PREFIX};
use hyper::{
    header::{
        HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
        ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, CONTENT_LENGTH, CONTENT_TYPE,
        VARY,
    },
    Body, Method, Request, Response, StatusCode,
};
use serde::Serialize;
use std::{path::PathBuf, str::FromStr, sync::Arc};
use time::OffsetDateTime;

#[macro_use]
extern crate log;

pub mod app;
pub mod body;
pub mod controller;
pub mod upload;

#[derive(Clone, Debug)]
pub struct AppSettings {
    pub port: u16,
    pub database_addr: String,
    pub database_max_connections: u32,
    pub uploads_dir: PathBuf,
}

const ALLOWED_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

pub async fn entry_point(
    webserver: Arc<Webserver>,
    request: Request<Body>,
) -> Result<Response<Body>, hyper::Error> {
    Ok(webserver.handle_request(request).await)
}

pub struct Webserver {
    app: Arc<App>,
}

impl Webserver {
    pub fn new(app: Arc<App>) -> Self {
        Self { app }
    }

    pub async fn handle_request(&self, request: Request<Body>) -> Response<Body> {
        let timer = std::time::Instant::now();
        let method = request.method().clone();
        let path = request.uri().path().to_owned();

        let mut response = self.route(request).await;
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));

        info!(
            "{} {} -> {} in {:?}",
            method,
            path,
            response.status(),
            timer.elapsed()
        );
        response
    }

    async fn route(&self, request: Request<Body>) -> Response<Body> {
        if request.method() == Method::OPTIONS {
            return preflight_response(&request);
        }

        let path = request.uri().path().to_owned();

        if let Some(requested) = path.strip_prefix(UPLOADS_PREFIX) {
            let head_only = request.method() == Method::HEAD;
            if request.method() == Method::GET || head_only {
                if let Some(response) = self.app.uploads().serve(requested, head_only).await {
                    return response;
                }
            }
        }

        // route without trailing slash for easier matching
        let without_trailing_slash = path.trim_end_matches('/');
        trace!("matching route '{}'", without_trailing_slash);
        match Route::from_str(without_trailing_slash) {
            Ok(route) if answers(route, request.method()) => {
                self.app.handle(route, request).await
            }
            _invalid => {
                warn!(
                    "invalid http method or route: {} '{}'",
                    request.method(),
                    path
                );
                not_found()
            }
        }
    }
}

/// `HEAD` is answered wherever `GET` is.
fn answers(route: Route, method: &Method) -> bool {
    match route.method() {
        "GET" => method == Method::GET || method == Method::HEAD,
        expected => method.as_str() == expected,
    }
}

pub(crate) fn generic_json_response<T>(body: T, status: StatusCode) -> Response<Body>
where
    T: Serialize,
{
    let (bytes, status) = match serde_json::to_vec(&body) {
        Ok(bytes) => (bytes, status),
        Err(serde_error) => {
            error!("failed to serialize response body: {}", serde_error);
            (
                format!(
                    r#"{{"success":false,"message":"{}"}}"#,
                    messages::SERVER_ERROR
                )
                .into_bytes(),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Cross-origin preflight. Any origin, any requested header.
fn preflight_response(request: &Request<Body>) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;

    let headers = response.headers_mut();
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    if let Some(requested) = request.headers().get(ACCESS_CONTROL_REQUEST_HEADERS) {
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        headers.insert(VARY, HeaderValue::from_static("Access-Control-Request-Headers"));
    }
    headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    response
}

fn not_found() -> Response<Body> {
    generic_json_response(
        ErrorResult::new(messages::INVALID_ROUTE),
        StatusCode::NOT_FOUND,
    )
}

pub fn current_timestamp_ms() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / (1000 * 1000)
}
