//! `SnaplinkError` → HTTP 响应

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use tracing::error;

use crate::errors::SnaplinkError;

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'static str,
    error: &'static str,
    message: &'a str,
}

impl ResponseError for SnaplinkError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(SnaplinkError::status_code(self))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let status = ResponseError::status_code(self);
        // 服务端错误不把内部细节返回给调用方
        let message = if status.is_server_error() {
            error!("Request failed: {}", self);
            "Internal server error, please try again later"
        } else {
            self.message()
        };
        HttpResponse::build(status).json(ErrorBody {
            code: self.code(),
            error: self.error_type(),
            message,
        })
    }
}
