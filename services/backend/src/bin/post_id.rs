/// ID登録 Lambdaエントリポイント
///
/// IDをDynamoDBに、IDとJSONデータをAurora（Data API）に保存する。
use cms_backend::application::{IdHandler, respond};
use cms_backend::infrastructure::{
    ConfigError, DataApiConfig, DynamoIdRepository, id_table_from_env, init_logging,
    load_aws_config,
};
use lambda_http::{Error, Request, run, service_fn};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let (table_name, config) = load_config().inspect_err(|e| {
        error!(error = %e, "設定の読み込みに失敗");
    })?;
    let sdk_config = load_aws_config().await;

    let repository =
        DynamoIdRepository::new(aws_sdk_dynamodb::Client::new(&sdk_config), table_name);
    let handler = IdHandler::new(repository, config.executor(&sdk_config));

    info!("post_id Lambda関数を初期化");

    let handler = &handler;
    run(service_fn(move |request: Request| async move {
        Ok::<_, Error>(respond(handler.handle_post_id(&request).await))
    }))
    .await
}

/// IDテーブル名とData API設定を読み込む
fn load_config() -> Result<(String, DataApiConfig), ConfigError> {
    Ok((id_table_from_env()?, DataApiConfig::from_env()?))
}
