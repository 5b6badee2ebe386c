/// 質問と回答一覧の取得 Lambdaエントリポイント
///
/// API Gatewayプロキシ経由のHTTPリクエストを処理する。
/// Data APIクライアントは起動時に一度だけ構築し、各呼び出しで共有する。
use cms_backend::application::{QuestionHandler, respond};
use cms_backend::infrastructure::{DataApiConfig, init_logging, load_aws_config};
use lambda_http::{Error, Request, run, service_fn};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let config = DataApiConfig::from_env().inspect_err(|e| {
        error!(error = %e, "設定の読み込みに失敗");
    })?;
    let sdk_config = load_aws_config().await;
    let handler = QuestionHandler::new(config.executor(&sdk_config));

    info!("get_question Lambda関数を初期化");

    let handler = &handler;
    run(service_fn(move |request: Request| async move {
        Ok::<_, Error>(respond(handler.handle_get_question(&request).await))
    }))
    .await
}
