// キーバリューストア連携ハンドラー
//
// IDの二重書き込み（DynamoDB + Aurora）とルーム作成を扱う。

use crate::application::api_response::ApiResponse;
use crate::application::handler_error::HandlerError;
use crate::application::request_parser::{
    MAX_SHORT_TEXT_CHARS, check_text, invocation_deadline, json_body,
};
use crate::domain::{Room, RoomStatus, StatementRequest, generate_room_id};
use crate::infrastructure::{IdRepository, ResilientExecutor, RoomRepository, StatementClient};
use lambda_http::Request;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{info, instrument};

const INSERT_EXAMPLE_SQL: &str =
    "INSERT INTO example_table (id, json_data) VALUES (:id, :json_data)";

/// ID登録ボディ
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct IdRecord {
    pub id: String,
    pub json_data: Value,
}

/// ルーム作成ボディ
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RoomRequest {
    pub user_id: String,
}

/// ID登録ハンドラー
pub struct IdHandler<I: IdRepository, C: StatementClient> {
    repository: I,
    executor: ResilientExecutor<C>,
}

impl<I: IdRepository, C: StatementClient> IdHandler<I, C> {
    pub fn new(repository: I, executor: ResilientExecutor<C>) -> Self {
        Self {
            repository,
            executor,
        }
    }

    /// IDをDynamoDBに、IDとJSONデータをAuroraに保存
    ///
    /// DynamoDBへの書き込みに失敗した場合、Auroraには書き込まない。
    #[instrument(skip(self, record, deadline), fields(id = %record.id))]
    pub async fn save(
        &self,
        record: &IdRecord,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        check_text("id", &record.id, MAX_SHORT_TEXT_CHARS)?;

        self.repository.save_id(&record.id).await?;

        let request = StatementRequest::new(INSERT_EXAMPLE_SQL)
            .bind("id", record.id.as_str())
            .bind("json_data", record.json_data.to_string());
        self.executor.scoped(deadline).execute(&request).await?;
        info!("IDを保存");

        Ok(ApiResponse::success(
            "Data successfully saved to DynamoDB and Aurora DB",
            json!({}),
        ))
    }

    /// POST /id
    pub async fn handle_post_id(&self, request: &Request) -> Result<ApiResponse, HandlerError> {
        let record: IdRecord = json_body(request)?;
        self.save(&record, invocation_deadline(request)).await
    }
}

/// ルーム作成ハンドラー
pub struct RoomHandler<R: RoomRepository> {
    repository: R,
}

impl<R: RoomRepository> RoomHandler<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    /// 指定したIDでルームを作成
    #[instrument(skip(self))]
    pub async fn create_room(
        &self,
        room_id: &str,
        user_id: &str,
    ) -> Result<ApiResponse, HandlerError> {
        check_text("user_id", user_id, MAX_SHORT_TEXT_CHARS)?;

        let status = RoomStatus::opened(room_id);
        let room = Room::opened(room_id, user_id);
        self.repository.create_room(&status, &room).await?;

        Ok(ApiResponse::success("Registered", json!({"room_id": room_id})))
    }

    /// POST /room
    pub async fn handle_post_room(&self, request: &Request) -> Result<ApiResponse, HandlerError> {
        let body: RoomRequest = json_body(request)?;
        let room_id = generate_room_id(&mut rand::thread_rng());
        self.create_room(&room_id, &body.user_id).await
    }
}
