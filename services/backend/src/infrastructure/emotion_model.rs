/// 感情推定モデル呼び出し
///
/// 推論モデルはコンテナLambdaとして別にデプロイされており、
/// ここではInvoke APIで呼び出してロジットを受け取るだけを担う。
use crate::domain::EMOTION_LABELS;
use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_lambda::Client as LambdaClient;
use aws_sdk_lambda::primitives::Blob;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// モデル呼び出しのエラー型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Invoke API呼び出しに失敗
    #[error("Model invocation failed: {0}")]
    InvocationFailed(String),

    /// モデル関数内でエラーが発生
    #[error("Model function error ({kind}): {message}")]
    FunctionError { kind: String, message: String },

    /// 応答の形式が不正
    #[error("Invalid model response: {0}")]
    InvalidResponse(String),
}

/// 感情推定モデル用トレイト
#[async_trait]
pub trait EmotionModel: Send + Sync {
    /// メッセージを推論してラベル順のロジットを返す
    async fn infer_logits(&self, message: &str) -> Result<Vec<f64>, ModelError>;
}

#[derive(Debug, Serialize)]
struct ModelRequest<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    logits: Vec<f64>,
}

/// モデル応答のJSONからロジットを取り出す
fn parse_logits(payload: &[u8]) -> Result<Vec<f64>, ModelError> {
    let response: ModelResponse = serde_json::from_slice(payload)
        .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

    if response.logits.len() != EMOTION_LABELS.len() {
        return Err(ModelError::InvalidResponse(format!(
            "expected {} logits, got {}",
            EMOTION_LABELS.len(),
            response.logits.len()
        )));
    }

    Ok(response.logits)
}

/// Lambda関数としてホストされたモデルの実装
#[derive(Debug, Clone)]
pub struct LambdaEmotionModel {
    client: LambdaClient,
    function_name: String,
}

impl LambdaEmotionModel {
    pub fn new(client: LambdaClient, function_name: impl Into<String>) -> Self {
        Self {
            client,
            function_name: function_name.into(),
        }
    }

    /// AWS設定からクライアントを作成
    pub fn from_sdk_config(sdk_config: &SdkConfig, function_name: impl Into<String>) -> Self {
        Self::new(LambdaClient::new(sdk_config), function_name)
    }
}

#[async_trait]
impl EmotionModel for LambdaEmotionModel {
    #[instrument(skip(self, message), fields(function_name = %self.function_name, message_len = message.chars().count()))]
    async fn infer_logits(&self, message: &str) -> Result<Vec<f64>, ModelError> {
        let payload = serde_json::to_vec(&ModelRequest { message })
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let output = self
            .client
            .invoke()
            .function_name(&self.function_name)
            .payload(Blob::new(payload))
            .send()
            .await
            .map_err(|err| {
                warn!(error = %err, "モデル呼び出しエラー");
                ModelError::InvocationFailed(err.to_string())
            })?;

        let body = output
            .payload()
            .map(|blob| blob.as_ref().to_vec())
            .unwrap_or_default();

        if let Some(kind) = output.function_error() {
            let message = String::from_utf8_lossy(&body).into_owned();
            warn!(kind, message = %message, "モデル関数がエラーを返却");
            return Err(ModelError::FunctionError {
                kind: kind.to_string(),
                message,
            });
        }

        let logits = parse_logits(&body)?;
        debug!(logit_count = logits.len(), "推論完了");
        Ok(logits)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_parse_logits_success() {
        let payload = br#"{"logits": [0.1, -0.2, 0.3, 0.0, 1.5, -1.5, 2.0, -2.0]}"#;
        let logits = parse_logits(payload).unwrap();
        assert_eq!(logits.len(), 8);
        assert_eq!(logits[4], 1.5);
    }

    #[test]
    fn test_parse_logits_wrong_length() {
        let result = parse_logits(br#"{"logits": [0.1, 0.2]}"#);
        assert_eq!(
            result,
            Err(ModelError::InvalidResponse("expected 8 logits, got 2".to_string()))
        );
    }

    #[test]
    fn test_parse_logits_invalid_json() {
        assert!(matches!(
            parse_logits(b"not json"),
            Err(ModelError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_logits(br#"{"scores": []}"#),
            Err(ModelError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_request_payload_shape() {
        let payload = serde_json::to_value(ModelRequest { message: "楽しい" }).unwrap();
        assert_eq!(payload, serde_json::json!({"message": "楽しい"}));
    }

    #[test]
    fn test_model_error_display() {
        let error = ModelError::FunctionError {
            kind: "Unhandled".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(error.to_string(), "Model function error (Unhandled): boom");
    }

    /// ユニットテスト用のモックEmotionModel
    #[derive(Debug, Clone, Default)]
    pub struct MockEmotionModel {
        logits: Arc<Mutex<Option<Result<Vec<f64>, ModelError>>>>,
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl MockEmotionModel {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_response(&self, response: Result<Vec<f64>, ModelError>) {
            *self.logits.lock().unwrap() = Some(response);
        }

        pub fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmotionModel for MockEmotionModel {
        async fn infer_logits(&self, message: &str) -> Result<Vec<f64>, ModelError> {
            self.messages.lock().unwrap().push(message.to_string());
            self.logits
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok(vec![0.0; EMOTION_LABELS.len()]))
        }
    }
}
