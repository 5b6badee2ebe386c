// APIレスポンス
//
// 全ハンドラー共通のJSONエンベロープとCORSヘッダーを構築する。

use crate::application::handler_error::HandlerError;
use lambda_http::http::StatusCode;
use lambda_http::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE, HeaderMap, HeaderValue,
};
use lambda_http::{Body, Response};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

/// JSONレスポンス
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// 成功レスポンス（`{"status": 200, ...fields, "message": ...}`）
    ///
    /// `fields`がオブジェクト以外の場合は無視する。
    pub fn success(message: impl Into<String>, fields: Value) -> Self {
        let mut body = Map::new();
        body.insert("status".to_string(), Value::from(200));
        if let Value::Object(fields) = fields {
            body.extend(fields);
        }
        body.insert("message".to_string(), Value::String(message.into()));

        Self {
            status: 200,
            body: Value::Object(body),
        }
    }

    /// エラーレスポンス（`{"status": code, "error": kind, "message": text}`）
    pub fn error(status: u16, kind: &str, message: impl Into<String>) -> Self {
        let mut body = Map::new();
        body.insert("status".to_string(), Value::from(status));
        body.insert("error".to_string(), Value::String(kind.to_string()));
        body.insert("message".to_string(), Value::String(message.into()));

        Self {
            status,
            body: Value::Object(body),
        }
    }

    /// HTTPレスポンスに変換
    pub fn into_response(self) -> Response<Body> {
        let mut response = Response::new(Body::Text(self.body.to_string()));
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        *response.headers_mut() = build_cors_headers();
        response
    }
}

impl From<&HandlerError> for ApiResponse {
    fn from(error: &HandlerError) -> Self {
        ApiResponse::error(error.status_code(), error.kind(), error.to_string())
    }
}

/// ハンドラーの結果をHTTPレスポンスに変換し、結果をログに残す
pub fn respond(result: Result<ApiResponse, HandlerError>) -> Response<Body> {
    match result {
        Ok(response) => {
            info!(status = response.status, "リクエスト処理完了");
            response.into_response()
        }
        Err(e) => {
            let response = ApiResponse::from(&e);
            if response.status >= 500 {
                error!(status = response.status, kind = e.kind(), error = %e, "リクエスト処理失敗");
            } else {
                warn!(status = response.status, kind = e.kind(), error = %e, "リクエストを拒否");
            }
            response.into_response()
        }
    }
}

/// CORSヘッダーを生成
///
/// - Content-Type: application/json
/// - Access-Control-Allow-Headers: Content-Type
/// - Access-Control-Allow-Origin: *
/// - Access-Control-Allow-Methods: OPTIONS,POST,GET
pub fn build_cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("OPTIONS,POST,GET"),
    );
    headers
}
