// リクエストパーサー
//
// API Gatewayからのリクエストを型付きの値に変換する。
// ここで失敗したリクエストはデータベースに到達しない。

use lambda_http::{Request, RequestExt};
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::time::Instant;

/// ID・ユーザー名・タイトル・メールアドレスの最大文字数（VARCHAR(64)）
pub const MAX_SHORT_TEXT_CHARS: usize = 64;

/// 質問本文・回答本文の最大文字数（VARCHAR(512)）
pub const MAX_LONG_TEXT_CHARS: usize = 512;

/// Lambdaの実行期限から差し引く余裕時間
pub const DEADLINE_SAFETY_MARGIN: Duration = Duration::from_secs(1);

/// パースエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Missing query parameter: {0}")]
    MissingQueryParameter(String),

    #[error("Missing path parameter: {0}")]
    MissingPathParameter(String),

    #[error("Missing request body")]
    MissingBody,

    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("{name} must be at most {max} characters")]
    TooLong { name: String, max: usize },

    #[error("{0} must not be empty")]
    Empty(String),
}

/// クエリパラメータを取得（空文字列は未指定扱い）
pub fn query_param(request: &Request, name: &str) -> Option<String> {
    request
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// 必須クエリパラメータを取得
pub fn required_query_param(request: &Request, name: &str) -> Result<String, ParseError> {
    query_param(request, name).ok_or_else(|| ParseError::MissingQueryParameter(name.to_string()))
}

/// 必須パスパラメータを取得
pub fn path_param(request: &Request, name: &str) -> Result<String, ParseError> {
    request
        .path_parameters_ref()
        .and_then(|params| params.first(name))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ParseError::MissingPathParameter(name.to_string()))
}

/// フラグ型クエリパラメータ（"1"のみ有効）
pub fn flag(request: &Request, name: &str) -> bool {
    query_param(request, name).as_deref() == Some("1")
}

/// 整数としてパース
pub fn parse_i64(name: &str, value: &str) -> Result<i64, ParseError> {
    value.trim().parse::<i64>().map_err(|e| ParseError::InvalidValue {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

/// 有限の浮動小数点数としてパース
pub fn parse_f64(name: &str, value: &str) -> Result<f64, ParseError> {
    let parsed = value.trim().parse::<f64>().map_err(|e| ParseError::InvalidValue {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    if !parsed.is_finite() {
        return Err(ParseError::InvalidValue {
            name: name.to_string(),
            reason: "must be a finite number".to_string(),
        });
    }
    Ok(parsed)
}

/// JSONボディをデシリアライズ
pub fn json_body<T: DeserializeOwned>(request: &Request) -> Result<T, ParseError> {
    let body: &[u8] = request.body().as_ref();
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ParseError::MissingBody);
    }
    serde_json::from_slice(body).map_err(|e| ParseError::InvalidJson(e.to_string()))
}

/// 空文字列（空白のみを含む）をチェック
pub fn check_not_empty(name: &str, value: &str) -> Result<(), ParseError> {
    if value.trim().is_empty() {
        return Err(ParseError::Empty(name.to_string()));
    }
    Ok(())
}

/// 文字数上限と空文字列をチェック
pub fn check_text(name: &str, value: &str, max_chars: usize) -> Result<(), ParseError> {
    check_not_empty(name, value)?;
    if value.chars().count() > max_chars {
        return Err(ParseError::TooLong {
            name: name.to_string(),
            max: max_chars,
        });
    }
    Ok(())
}

/// 数値または数値文字列を整数としてデシリアライズする
///
/// `{"question_id": 3}`と`{"question_id": "3"}`の両方を受け付ける。
pub fn deserialize_flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(value) => Ok(value),
        IntOrString::Str(value) => value.trim().parse::<i64>().map_err(D::Error::custom),
    }
}

/// Lambdaコンテキストの実行期限から呼び出し期限を求める
///
/// コンテキストがない場合（ローカル実行・テスト）はNone。
pub fn invocation_deadline(request: &Request) -> Option<Instant> {
    let context = request.lambda_context_ref()?;
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let remaining = remaining_until(context.deadline, now_ms)?;
    Some(Instant::now() + remaining)
}

/// 期限（エポックミリ秒）までの残り時間から余裕時間を引いたもの
///
/// 期限が0（未設定）の場合はNone。
fn remaining_until(deadline_ms: u64, now_ms: u64) -> Option<Duration> {
    if deadline_ms == 0 {
        return None;
    }
    let remaining = Duration::from_millis(deadline_ms.saturating_sub(now_ms));
    Some(remaining.saturating_sub(DEADLINE_SAFETY_MARGIN))
}
