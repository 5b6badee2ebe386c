// ハンドラーエラー
//
// 各層のエラーを集約し、HTTPステータスとエラー種別に対応付ける。

use crate::application::request_parser::ParseError;
use crate::domain::{CoordinateError, CsvTableError, EmotionScoreError, RowDecodeError};
use crate::infrastructure::{ModelError, RemoteCallError, RepositoryError};
use thiserror::Error;

/// ハンドラー処理のエラー型
#[derive(Debug, Error)]
pub enum HandlerError {
    /// リクエストの解析に失敗
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// ステートメント実行に失敗
    #[error(transparent)]
    Remote(#[from] RemoteCallError),

    /// 入力値が業務上不正
    #[error("{0}")]
    InvalidInput(String),

    /// 対象が存在しない
    #[error("{0}")]
    NotFound(String),

    /// 結果セットの形式が想定と異なる
    #[error("Unexpected result shape: {0}")]
    Decode(String),

    /// キーバリューストアへの書き込みに失敗
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// 推論モデルの呼び出しに失敗
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<RowDecodeError> for HandlerError {
    fn from(error: RowDecodeError) -> Self {
        HandlerError::Decode(error.to_string())
    }
}

impl From<CsvTableError> for HandlerError {
    fn from(error: CsvTableError) -> Self {
        HandlerError::InvalidInput(error.to_string())
    }
}

impl From<CoordinateError> for HandlerError {
    fn from(error: CoordinateError) -> Self {
        HandlerError::InvalidInput(error.to_string())
    }
}

impl From<EmotionScoreError> for HandlerError {
    fn from(error: EmotionScoreError) -> Self {
        HandlerError::Model(ModelError::InvalidResponse(error.to_string()))
    }
}

impl HandlerError {
    /// HTTPステータスコード
    pub fn status_code(&self) -> u16 {
        match self {
            HandlerError::Parse(_) | HandlerError::InvalidInput(_) => 400,
            HandlerError::Remote(error) => match error {
                RemoteCallError::InvalidRequest(_) | RemoteCallError::Terminal { .. } => 400,
                RemoteCallError::RetriesExhausted { .. } => 503,
                RemoteCallError::DeadlineExceeded { .. } => 504,
            },
            HandlerError::NotFound(_) => 404,
            HandlerError::Decode(_) => 500,
            HandlerError::Repository(_) | HandlerError::Model(_) => 502,
        }
    }

    /// レスポンスの`error`フィールドに載せる種別
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Parse(_) => "ParseError",
            HandlerError::Remote(error) => error.kind(),
            HandlerError::InvalidInput(_) => "InvalidInput",
            HandlerError::NotFound(_) => "NotFound",
            HandlerError::Decode(_) => "DataDecodeError",
            HandlerError::Repository(_) => "RepositoryError",
            HandlerError::Model(_) => "ModelError",
        }
    }
}
