// アイテム検索ハンドラー
//
// 組織に登録されたアイテムの存在確認・近傍検索・おすすめ検索を行う。

use crate::application::api_response::ApiResponse;
use crate::application::handler_error::HandlerError;
use crate::application::request_parser::{
    MAX_SHORT_TEXT_CHARS, check_text, flag, invocation_deadline, parse_f64, required_query_param,
};
use crate::domain::{Coordinates, ExecutionResult, NEAREST_ITEM_COUNT, Row, StatementRequest, geo};
use crate::infrastructure::{ResilientExecutor, StatementClient};
use lambda_http::Request;
use serde_json::{Map, Value, json};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

const ITEMS_EXIST_SQL: &str =
    "SELECT EXISTS (SELECT 1 FROM ITEMS WHERE organization_id = :organization_id)";

const ORGANIZATION_ITEMS_SQL: &str =
    "SELECT id, data_values, is_abstract_data FROM ITEMS WHERE organization_id = :organization_id";

const ORGANIZATION_ABSTRACT_SQL: &str =
    "SELECT is_abstract_data FROM ORGANIZATIONS WHERE id = :organization_id";

/// 公園面積が組織内平均より大きい
const SPACIOUS_CRITERIA: &str = "JSON_EXTRACT(data_values, '$.\"公園面積_m2\"') IS NOT NULL \
     AND CAST(JSON_UNQUOTE(JSON_EXTRACT(data_values, '$.\"公園面積_m2\"')) AS DECIMAL(20, 4)) > \
     (SELECT AVG(CAST(JSON_UNQUOTE(JSON_EXTRACT(data_values, '$.\"公園面積_m2\"')) AS DECIMAL(20, 4))) \
     FROM ITEMS WHERE organization_id = :organization_id AND JSON_LENGTH(data_values) > 0)";

/// 主な施設の記述が十分にある
const FACILITY_CRITERIA: &str =
    "CHAR_LENGTH(JSON_UNQUOTE(JSON_EXTRACT(data_values, '$.\"主な施設\"'))) > 10";

/// 主な遊具の記述が十分にある
const EQUIPMENT_CRITERIA: &str =
    "CHAR_LENGTH(JSON_UNQUOTE(JSON_EXTRACT(data_values, '$.\"主な遊具\"'))) > 10";

/// おすすめ検索の条件フラグ
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecommendCriteria {
    pub spacious: bool,
    pub facility: bool,
    pub equipment: bool,
}

impl RecommendCriteria {
    /// クエリパラメータから条件を読み取る
    pub fn from_request(request: &Request) -> Self {
        Self {
            spacious: flag(request, "spacious"),
            facility: flag(request, "facility"),
            equipment: flag(request, "equipment"),
        }
    }

    /// 条件を組み込んだSQLを構築
    ///
    /// 条件はすべて固定文字列で、利用者の入力は含まない。
    pub fn build_sql(&self) -> String {
        let fragments: Vec<&str> = [
            (self.spacious, SPACIOUS_CRITERIA),
            (self.facility, FACILITY_CRITERIA),
            (self.equipment, EQUIPMENT_CRITERIA),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .map(|(_, fragment)| fragment)
        .collect();

        if fragments.is_empty() {
            ORGANIZATION_ITEMS_SQL.to_string()
        } else {
            format!("{} AND ({})", ORGANIZATION_ITEMS_SQL, fragments.join(" AND "))
        }
    }
}

/// 検索結果のアイテム
#[derive(Debug, Clone, PartialEq)]
struct ItemRecord {
    data_values: Value,
    is_abstract_data: Value,
    coordinates: Option<Coordinates>,
}

impl ItemRecord {
    /// `id, data_values, is_abstract_data`の行から作成
    ///
    /// `data_values`には`item_id`を追加する。
    fn from_row(row: &Row) -> Result<Self, HandlerError> {
        let id = row.integer(0)?;
        let mut data_values = parse_json_text(row.optional_string(1)?);
        let coordinates = Coordinates::from_data_values(&data_values);
        if let Value::Object(map) = &mut data_values {
            map.insert("item_id".to_string(), Value::from(id));
        } else {
            let mut map = Map::new();
            map.insert("item_id".to_string(), Value::from(id));
            data_values = Value::Object(map);
        }

        Ok(Self {
            data_values,
            is_abstract_data: parse_json_text(row.optional_string(2)?),
            coordinates,
        })
    }

    fn into_json(self, distance: Option<f64>) -> Value {
        let mut value = json!({
            "data_values": self.data_values,
            "is_abstract_data": self.is_abstract_data,
        });
        if let (Some(distance), Value::Object(map)) = (distance, &mut value) {
            map.insert("distance".to_string(), Value::from(distance));
        }
        value
    }
}

/// JSON文字列をパース（JSONでなければ文字列のまま、NULLはnull）
pub(crate) fn parse_json_text(text: Option<String>) -> Value {
    match text {
        Some(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        None => Value::Null,
    }
}

/// 行をアイテムに変換
fn collect_items(result: &ExecutionResult) -> Result<Vec<ItemRecord>, HandlerError> {
    result.rows.iter().map(ItemRecord::from_row).collect()
}

/// 基準地点から近い順に並べる（座標のないアイテムは除外）
fn nearest_items(origin: &Coordinates, items: Vec<ItemRecord>, limit: usize) -> Vec<Value> {
    let total = items.len();
    let candidates: Vec<(ItemRecord, Coordinates)> = items
        .into_iter()
        .filter_map(|item| item.coordinates.map(|coordinates| (item, coordinates)))
        .collect();
    if candidates.len() < total {
        debug!(skipped = total - candidates.len(), "座標のないアイテムを除外");
    }

    geo::nearest(origin, candidates, limit)
        .into_iter()
        .map(|(item, distance)| item.into_json(Some(distance)))
        .collect()
}

/// 組織IDを読み取る
fn organization_id(request: &Request) -> Result<String, HandlerError> {
    let organization_id = required_query_param(request, "organization_id")?;
    check_text("organization_id", &organization_id, MAX_SHORT_TEXT_CHARS)?;
    Ok(organization_id)
}

/// 基準地点を読み取る
fn origin(request: &Request) -> Result<Coordinates, HandlerError> {
    let latitude = parse_f64("latitude", &required_query_param(request, "latitude")?)?;
    let longitude = parse_f64("longitude", &required_query_param(request, "longitude")?)?;
    Ok(Coordinates::new(latitude, longitude)?)
}

/// アイテム検索ハンドラー
pub struct ItemHandler<C: StatementClient> {
    executor: ResilientExecutor<C>,
}

impl<C: StatementClient> ItemHandler<C> {
    pub fn new(executor: ResilientExecutor<C>) -> Self {
        Self { executor }
    }

    /// 組織にアイテムが存在するか確認
    #[instrument(skip(self, deadline))]
    pub async fn items_exist(
        &self,
        organization_id: &str,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        let request =
            StatementRequest::new(ITEMS_EXIST_SQL).bind("organization_id", organization_id);
        let result = self.executor.scoped(deadline).execute(&request).await?;

        let exists = match result.first_row() {
            Some(row) => row.integer(0)? != 0,
            None => false,
        };
        info!(exists, "アイテム存在確認完了");

        let message = if exists { "Items exist" } else { "No items exist" };
        Ok(ApiResponse::success(
            message,
            json!({"items_exist": i64::from(exists)}),
        ))
    }

    /// 基準地点に近いアイテムを取得
    #[instrument(skip(self, origin, deadline))]
    pub async fn near_items(
        &self,
        organization_id: &str,
        origin: &Coordinates,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        let request =
            StatementRequest::new(ORGANIZATION_ITEMS_SQL).bind("organization_id", organization_id);
        let result = self.executor.scoped(deadline).execute(&request).await?;

        let items = nearest_items(origin, collect_items(&result)?, NEAREST_ITEM_COUNT);
        info!(row_count = result.rows.len(), returned = items.len(), "近傍検索完了");

        Ok(ApiResponse::success(
            "Successfully retrieved nearest items.",
            json!({"items": items}),
        ))
    }

    /// 条件に合うアイテムと組織の抽象データを取得
    ///
    /// 該当件数が上限を超える場合のみ近い順に絞り込む。
    #[instrument(skip(self, origin, deadline))]
    pub async fn recommend_items(
        &self,
        organization_id: &str,
        origin: &Coordinates,
        criteria: RecommendCriteria,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        let executor = self.executor.scoped(deadline);

        let request =
            StatementRequest::new(criteria.build_sql()).bind("organization_id", organization_id);
        let result = executor.execute(&request).await?;
        let records = collect_items(&result)?;

        let items: Vec<Value> = if records.len() > NEAREST_ITEM_COUNT {
            nearest_items(origin, records, NEAREST_ITEM_COUNT)
        } else {
            records
                .into_iter()
                .map(|item| {
                    let distance = item.coordinates.map(|c| origin.distance_km(&c));
                    item.into_json(distance)
                })
                .collect()
        };

        let request = StatementRequest::new(ORGANIZATION_ABSTRACT_SQL)
            .bind("organization_id", organization_id);
        let organization = executor.execute(&request).await?;
        let organization_is_abstract_data = match organization.first_row() {
            Some(row) => parse_json_text(row.optional_string(0)?),
            None => Value::Null,
        };
        info!(matched = result.rows.len(), returned = items.len(), "おすすめ検索完了");

        Ok(ApiResponse::success(
            "Successfully retrieved recommended items.",
            json!({
                "items": items,
                "organization_is_abstract_data": organization_is_abstract_data,
            }),
        ))
    }

    /// GET /items
    pub async fn handle_get_items(&self, request: &Request) -> Result<ApiResponse, HandlerError> {
        let organization_id = organization_id(request)?;
        self.items_exist(&organization_id, invocation_deadline(request))
            .await
    }

    /// GET /items/near
    pub async fn handle_get_near_items(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let organization_id = organization_id(request)?;
        let origin = origin(request)?;
        self.near_items(&organization_id, &origin, invocation_deadline(request))
            .await
    }

    /// GET /items/recommend
    pub async fn handle_get_recommend_items(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let organization_id = organization_id(request)?;
        let origin = origin(request)?;
        let criteria = RecommendCriteria::from_request(request);
        self.recommend_items(&organization_id, &origin, criteria, invocation_deadline(request))
            .await
    }
}
