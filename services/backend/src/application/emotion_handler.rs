// 感情分析ハンドラー

use crate::application::api_response::ApiResponse;
use crate::application::handler_error::HandlerError;
use crate::application::request_parser::{check_not_empty, required_query_param};
use crate::domain::EmotionScores;
use crate::infrastructure::EmotionModel;
use lambda_http::Request;
use serde_json::json;
use tracing::{info, instrument};

/// 感情分析ハンドラー
pub struct EmotionHandler<M: EmotionModel> {
    model: M,
}

impl<M: EmotionModel> EmotionHandler<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    /// メッセージを8種類の感情スコアに変換
    ///
    /// DBには保存しないため文字数上限はない。長文はモデル側で切り詰められる。
    #[instrument(skip(self, message), fields(message_len = message.chars().count()))]
    pub async fn analyze(&self, message: &str) -> Result<ApiResponse, HandlerError> {
        check_not_empty("message", message)?;

        let logits = self.model.infer_logits(message).await?;
        let emotions = EmotionScores::from_logits(&logits)?;
        info!("感情分析完了");

        Ok(ApiResponse::success(
            "Multi Emotion Analysis Completed",
            json!({"emotions": emotions}),
        ))
    }

    /// GET /emotion
    pub async fn handle_get_multi_emotion(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let message = required_query_param(request, "message")?;
        self.analyze(&message).await
    }
}
