/// DynamoDBへのキーバリュー書き込み
///
/// IDテーブルとルーム関連テーブルへのput_itemを抽象化する。
use crate::domain::{Room, RoomStatus};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

/// リポジトリ操作のエラー型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// DynamoDBへの書き込みに失敗
    #[error("Write error: {0}")]
    WriteError(String),

    /// アイテムへのシリアライズに失敗
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// IDテーブル用トレイト
#[async_trait]
pub trait IdRepository: Send + Sync {
    /// IDを保存（`{id}`のみのアイテム）
    async fn save_id(&self, id: &str) -> Result<(), RepositoryError>;
}

/// ルームテーブル用トレイト
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// ルーム状態とルームを順に保存
    ///
    /// 状態の保存に失敗した場合、ルームは保存しない。
    async fn create_room(&self, status: &RoomStatus, room: &Room) -> Result<(), RepositoryError>;
}

fn to_attribute_map<T: Serialize>(value: &T) -> Result<HashMap<String, AttributeValue>, RepositoryError> {
    serde_dynamo::to_item(value).map_err(|e| RepositoryError::SerializationError(e.to_string()))
}

async fn put_item(
    client: &DynamoDbClient,
    table_name: &str,
    item: HashMap<String, AttributeValue>,
) -> Result<(), RepositoryError> {
    client
        .put_item()
        .table_name(table_name)
        .set_item(Some(item))
        .send()
        .await
        .map_err(|e| {
            warn!(table_name, error = %e, "put_item失敗");
            RepositoryError::WriteError(e.to_string())
        })?;
    Ok(())
}

/// IdRepositoryのDynamoDB実装
#[derive(Debug, Clone)]
pub struct DynamoIdRepository {
    client: DynamoDbClient,
    table_name: String,
}

impl DynamoIdRepository {
    pub fn new(client: DynamoDbClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }
}

#[async_trait]
impl IdRepository for DynamoIdRepository {
    async fn save_id(&self, id: &str) -> Result<(), RepositoryError> {
        let item = HashMap::from([("id".to_string(), AttributeValue::S(id.to_string()))]);
        put_item(&self.client, &self.table_name, item).await?;
        info!(table_name = %self.table_name, "IDを保存");
        Ok(())
    }
}

/// RoomRepositoryのDynamoDB実装
#[derive(Debug, Clone)]
pub struct DynamoRoomRepository {
    client: DynamoDbClient,
    room_table: String,
    room_status_table: String,
}

impl DynamoRoomRepository {
    pub fn new(
        client: DynamoDbClient,
        room_table: impl Into<String>,
        room_status_table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            room_table: room_table.into(),
            room_status_table: room_status_table.into(),
        }
    }
}

#[async_trait]
impl RoomRepository for DynamoRoomRepository {
    async fn create_room(&self, status: &RoomStatus, room: &Room) -> Result<(), RepositoryError> {
        put_item(&self.client, &self.room_status_table, to_attribute_map(status)?).await?;
        put_item(&self.client, &self.room_table, to_attribute_map(room)?).await?;
        info!(room_id = %room.id, "ルームを作成");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_room_status_item_shape() {
        let item = to_attribute_map(&RoomStatus::opened("R1")).unwrap();

        assert_eq!(item.get("id"), Some(&AttributeValue::S("R1".to_string())));
        assert_eq!(item.get("closed"), Some(&AttributeValue::N("-1".to_string())));
        assert_eq!(item.get("pushed_id"), Some(&AttributeValue::S("-1".to_string())));
        assert_eq!(item.len(), 3);
    }

    #[test]
    fn test_room_item_shape() {
        let item = to_attribute_map(&Room::opened("R1", "user-9")).unwrap();

        assert_eq!(
            item.get("empowermenter_id"),
            Some(&AttributeValue::S("user-9".to_string()))
        );
        assert_eq!(
            item.get("empowerment_result"),
            Some(&AttributeValue::N("0".to_string()))
        );
        assert_eq!(item.len(), 5);
    }

    #[test]
    fn test_repository_error_display() {
        assert_eq!(
            RepositoryError::WriteError("throttled".to_string()).to_string(),
            "Write error: throttled"
        );
    }

    /// ユニットテスト用のモックIdRepository
    #[derive(Debug, Clone, Default)]
    pub struct MockIdRepository {
        ids: Arc<Mutex<Vec<String>>>,
        next_error: Arc<Mutex<Option<RepositoryError>>>,
    }

    impl MockIdRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_next_error(&self, error: RepositoryError) {
            *self.next_error.lock().unwrap() = Some(error);
        }

        pub fn saved_ids(&self) -> Vec<String> {
            self.ids.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdRepository for MockIdRepository {
        async fn save_id(&self, id: &str) -> Result<(), RepositoryError> {
            if let Some(error) = self.next_error.lock().unwrap().take() {
                return Err(error);
            }
            self.ids.lock().unwrap().push(id.to_string());
            Ok(())
        }
    }

    /// ユニットテスト用のモックRoomRepository
    #[derive(Debug, Clone, Default)]
    pub struct MockRoomRepository {
        rooms: Arc<Mutex<Vec<(RoomStatus, Room)>>>,
        next_error: Arc<Mutex<Option<RepositoryError>>>,
    }

    impl MockRoomRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_next_error(&self, error: RepositoryError) {
            *self.next_error.lock().unwrap() = Some(error);
        }

        pub fn rooms(&self) -> Vec<(RoomStatus, Room)> {
            self.rooms.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RoomRepository for MockRoomRepository {
        async fn create_room(&self, status: &RoomStatus, room: &Room) -> Result<(), RepositoryError> {
            if let Some(error) = self.next_error.lock().unwrap().take() {
                return Err(error);
            }
            self.rooms.lock().unwrap().push((status.clone(), room.clone()));
            Ok(())
        }
    }
}
