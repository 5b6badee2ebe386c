/// ルーム作成 Lambdaエントリポイント
///
/// ランダムなルームIDを発行し、room_statusテーブルとroomテーブルに書き込む。
use cms_backend::application::{RoomHandler, respond};
use cms_backend::infrastructure::{
    DynamoRoomRepository, RoomTablesConfig, init_logging, load_aws_config,
};
use lambda_http::{Error, Request, run, service_fn};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let tables = RoomTablesConfig::from_env();
    let sdk_config = load_aws_config().await;
    info!(
        room_table = %tables.room_table,
        room_status_table = %tables.room_status_table,
        "post_room Lambda関数を初期化"
    );

    let repository = DynamoRoomRepository::new(
        aws_sdk_dynamodb::Client::new(&sdk_config),
        tables.room_table,
        tables.room_status_table,
    );
    let handler = RoomHandler::new(repository);

    let handler = &handler;
    run(service_fn(move |request: Request| async move {
        Ok::<_, Error>(respond(handler.handle_post_room(&request).await))
    }))
    .await
}
