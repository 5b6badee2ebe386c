// 組織ハンドラー
//
// アカウント登録、データ構造の定義、CSVからのアイテム一括登録を行う。

use crate::application::api_response::ApiResponse;
use crate::application::csv_handler::CsvUpload;
use crate::application::handler_error::HandlerError;
use crate::application::request_parser::{
    MAX_SHORT_TEXT_CHARS, check_text, invocation_deadline, json_body, path_param,
};
use crate::domain::{DataAttributes, ExecutionResult, StatementRequest};
use crate::infrastructure::{ResilientExecutor, StatementClient};
use lambda_http::Request;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{info, instrument};

const COUNT_ORGANIZATION_SQL: &str =
    "SELECT COUNT(*) AS count FROM ORGANIZATIONS WHERE id = :organization_id";

const INSERT_ORGANIZATION_SQL: &str = "INSERT INTO ORGANIZATIONS (id) VALUES (:organization_id)";

const COUNT_USER_SQL: &str = "SELECT COUNT(*) AS count FROM USERS WHERE email = :email";

const INSERT_USER_SQL: &str =
    "INSERT INTO USERS (email, organization_id) VALUES (:email, :organization_id)";

const UPDATE_DATA_STRUCTURE_SQL: &str = "UPDATE ORGANIZATIONS \
     SET data_attributes = :data_attributes, is_abstract_data = :is_abstract_data \
     WHERE id = :organization_id";

const DATA_ATTRIBUTES_SQL: &str =
    "SELECT data_attributes FROM ORGANIZATIONS WHERE id = :organization_id";

const INSERT_ITEM_SQL: &str =
    "INSERT INTO ITEMS (organization_id, data_values) VALUES (:organization_id, :data_values)";

/// アカウント登録ボディ
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccountRequest {
    pub email: String,
    pub organization_id: String,
}

/// データ構造定義ボディ
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DataStructureRequest {
    pub organization_id: String,
    pub data_attributes: Value,
    pub is_abstract_data: Value,
}

/// 組織ハンドラー
pub struct OrganizationHandler<C: StatementClient> {
    executor: ResilientExecutor<C>,
}

impl<C: StatementClient> OrganizationHandler<C> {
    pub fn new(executor: ResilientExecutor<C>) -> Self {
        Self { executor }
    }

    /// 組織とユーザーを必要に応じて登録
    ///
    /// 登録前に存在していたかを0/1で返す。
    #[instrument(skip(self, account, deadline), fields(organization_id = %account.organization_id))]
    pub async fn register_account(
        &self,
        account: &AccountRequest,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        check_text("email", &account.email, MAX_SHORT_TEXT_CHARS)?;
        check_text("organization_id", &account.organization_id, MAX_SHORT_TEXT_CHARS)?;
        let executor = self.executor.scoped(deadline);

        let count = StatementRequest::new(COUNT_ORGANIZATION_SQL)
            .bind("organization_id", account.organization_id.as_str());
        let organization_exist = count_of(&executor.execute(&count).await?)? > 0;
        if !organization_exist {
            let insert = StatementRequest::new(INSERT_ORGANIZATION_SQL)
                .bind("organization_id", account.organization_id.as_str());
            executor.execute(&insert).await?;
            info!("組織を登録");
        }

        let count = StatementRequest::new(COUNT_USER_SQL).bind("email", account.email.as_str());
        let email_exist = count_of(&executor.execute(&count).await?)? > 0;
        if !email_exist {
            let insert = StatementRequest::new(INSERT_USER_SQL)
                .bind("email", account.email.as_str())
                .bind("organization_id", account.organization_id.as_str());
            executor.execute(&insert).await?;
            info!("ユーザーを登録");
        }

        Ok(ApiResponse::success(
            "The account information has been processed.",
            json!({
                "email_exist": i64::from(email_exist),
                "organization_exist": i64::from(organization_exist),
            }),
        ))
    }

    /// 組織のデータ属性と抽象データを更新
    ///
    /// どちらもJSON文字列として保存する。
    #[instrument(skip(self, structure, deadline), fields(organization_id = %structure.organization_id))]
    pub async fn update_data_structure(
        &self,
        structure: &DataStructureRequest,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        check_text("organization_id", &structure.organization_id, MAX_SHORT_TEXT_CHARS)?;
        let attributes = DataAttributes::from_json(&structure.data_attributes)?;

        let request = StatementRequest::new(UPDATE_DATA_STRUCTURE_SQL)
            .bind("organization_id", structure.organization_id.as_str())
            .bind("data_attributes", structure.data_attributes.to_string())
            .bind("is_abstract_data", structure.is_abstract_data.to_string());
        let result = self.executor.scoped(deadline).execute(&request).await?;
        info!(
            column_count = attributes.len(),
            records_updated = result.records_updated,
            "データ構造を更新"
        );

        Ok(ApiResponse::success(
            "記録に成功しました．",
            json!({"records_updated": result.records_updated}),
        ))
    }

    /// CSVの各行をアイテムとして登録
    ///
    /// 組織のdata_attributesに定義された列だけを型変換して保存する。
    /// 行ごとに独立したINSERTのため、途中で失敗した場合はそれまでの行が残る。
    #[instrument(skip(self, upload, deadline))]
    pub async fn import_items(
        &self,
        organization_id: &str,
        upload: &CsvUpload,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        check_text("organization_id", organization_id, MAX_SHORT_TEXT_CHARS)?;
        let table = upload.decode()?;
        let executor = self.executor.scoped(deadline);

        let request =
            StatementRequest::new(DATA_ATTRIBUTES_SQL).bind("organization_id", organization_id);
        let result = executor.execute(&request).await?;
        let attributes_text = match result.first_row() {
            Some(row) => row.optional_string(0)?,
            None => {
                return Err(HandlerError::NotFound(format!(
                    "Organization {} not found",
                    organization_id
                )));
            }
        };
        let Some(attributes_text) = attributes_text else {
            return Err(HandlerError::NotFound(format!(
                "Organization {} has no data_attributes",
                organization_id
            )));
        };
        let attributes = DataAttributes::parse(&attributes_text)?;

        let rows = table.project(&attributes)?;
        let mut inserted_count = 0usize;
        for data_values in rows {
            let request = StatementRequest::new(INSERT_ITEM_SQL)
                .bind("organization_id", organization_id)
                .bind("data_values", Value::Object(data_values).to_string());
            executor.execute(&request).await?;
            inserted_count += 1;
        }
        info!(inserted_count, "アイテムを一括登録");

        Ok(ApiResponse::success(
            "Data successfully processed and saved.",
            json!({"inserted_count": inserted_count}),
        ))
    }

    /// POST /account
    pub async fn handle_post_account(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let account: AccountRequest = json_body(request)?;
        self.register_account(&account, invocation_deadline(request))
            .await
    }

    /// POST /data-structure
    pub async fn handle_post_data_structure(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let structure: DataStructureRequest = json_body(request)?;
        self.update_data_structure(&structure, invocation_deadline(request))
            .await
    }

    /// POST /organizations/{organization_id}/data
    pub async fn handle_post_data_to_organization(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let organization_id = path_param(request, "organization_id")?;
        let upload: CsvUpload = json_body(request)?;
        self.import_items(&organization_id, &upload, invocation_deadline(request))
            .await
    }
}

/// `SELECT COUNT(*)`の結果を取り出す
fn count_of(result: &ExecutionResult) -> Result<i64, HandlerError> {
    let row = result
        .first_row()
        .ok_or_else(|| HandlerError::Decode("COUNT(*) returned no rows".to_string()))?;
    Ok(row.integer(0)?)
}
