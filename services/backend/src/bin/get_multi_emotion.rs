/// 感情分析 Lambdaエントリポイント
///
/// メッセージを推論モデル関数に渡し、8種類の感情スコアを返す。
use cms_backend::application::{EmotionHandler, respond};
use cms_backend::infrastructure::{
    LambdaEmotionModel, emotion_model_function_from_env, init_logging, load_aws_config,
};
use lambda_http::{Error, Request, run, service_fn};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let function_name = emotion_model_function_from_env().inspect_err(|e| {
        error!(error = %e, "設定の読み込みに失敗");
    })?;
    let sdk_config = load_aws_config().await;
    info!(function_name = %function_name, "get_multi_emotion Lambda関数を初期化");

    let handler = EmotionHandler::new(LambdaEmotionModel::from_sdk_config(
        &sdk_config,
        function_name,
    ));

    let handler = &handler;
    run(service_fn(move |request: Request| async move {
        Ok::<_, Error>(respond(handler.handle_get_multi_emotion(&request).await))
    }))
    .await
}
