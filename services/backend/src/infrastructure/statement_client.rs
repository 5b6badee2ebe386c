// StatementClient - Aurora Data API用クライアント
//
// 1回のExecuteStatement呼び出しを行い、失敗を一時的/恒久的に分類する。
// 再試行はResilientExecutorが担当するため、ここでは行わない。

use crate::domain::{Cell, ExecutionResult, Row, SqlValue, StatementRequest};
use async_trait::async_trait;
use aws_sdk_rdsdata::Client as RdsDataClient;
use aws_sdk_rdsdata::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_rdsdata::types::{Field, SqlParameter};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Aurora Serverlessの起動待ちで返されるBadRequestExceptionのメッセージ
const COMMUNICATIONS_LINK_FAILURE: &str = "Communications link failure";

/// 一時的な障害として扱うエラーコード
const TRANSIENT_ERROR_CODES: [&str; 7] = [
    "ThrottlingException",
    "TooManyRequestsException",
    "ServiceUnavailableError",
    "InternalServerErrorException",
    "StatementTimeoutException",
    "DatabaseResumingException",
    "DatabaseUnavailableException",
];

/// 未対応の結果フィールド型を表すエラーコード
pub const UNSUPPORTED_FIELD_CODE: &str = "UnsupportedField";

/// エラー分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 再試行で回復しうる障害
    Transient,
    /// 再試行しても結果が変わらない障害
    Terminal,
}

/// ステートメント実行エラー
///
/// 根本原因のエラーコードとメッセージを保持する。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}{}", code_prefix(.code), .message)]
pub struct StatementError {
    /// 一時的/恒久的の分類
    pub class: ErrorClass,
    /// サービスのエラーコード（取得できた場合）
    pub code: Option<String>,
    /// エラーメッセージ
    pub message: String,
}

fn code_prefix(code: &Option<String>) -> String {
    code.as_deref()
        .map(|code| format!("{code}: "))
        .unwrap_or_default()
}

impl StatementError {
    /// 一時的エラーを作成
    pub fn transient(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Transient,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// 恒久的エラーを作成
    pub fn terminal(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Terminal,
            code: code.map(str::to_string),
            message: message.into(),
        }
    }

    /// 再試行可能か
    pub fn is_transient(&self) -> bool {
        self.class == ErrorClass::Transient
    }
}

/// サービスエラーコードとメッセージからエラー分類を決定
pub fn classify_error_code(code: Option<&str>, message: &str) -> ErrorClass {
    match code {
        Some(code) if TRANSIENT_ERROR_CODES.contains(&code) => ErrorClass::Transient,
        Some("BadRequestException") if message.contains(COMMUNICATIONS_LINK_FAILURE) => {
            ErrorClass::Transient
        }
        _ => ErrorClass::Terminal,
    }
}

/// ステートメント実行用トレイト
///
/// 1回のリモート呼び出しを抽象化し、異なる実装を可能にする
/// （実際のData APIクライアント、テスト用モック）。
#[async_trait]
pub trait StatementClient: Send + Sync {
    /// ステートメントを1回実行する
    ///
    /// # 戻り値
    /// * 成功時は`Ok(ExecutionResult)`
    /// * 失敗時は分類済みの`Err(StatementError)`
    async fn execute_statement(
        &self,
        request: &StatementRequest,
    ) -> Result<ExecutionResult, StatementError>;
}

#[async_trait]
impl<T: StatementClient + ?Sized> StatementClient for &T {
    async fn execute_statement(
        &self,
        request: &StatementRequest,
    ) -> Result<ExecutionResult, StatementError> {
        (**self).execute_statement(request).await
    }
}

/// SqlValueをData APIのパラメータに変換
pub fn to_sql_parameter(name: &str, value: &SqlValue) -> SqlParameter {
    let field = match value {
        SqlValue::String(v) => Field::StringValue(v.clone()),
        SqlValue::Integer(v) => Field::LongValue(*v),
        SqlValue::Boolean(v) => Field::BooleanValue(*v),
        SqlValue::Null => Field::IsNull(true),
    };
    SqlParameter::builder().name(name).value(field).build()
}

/// Data APIの結果フィールドをセルに変換
///
/// 文字列・整数・真偽値・NULL以外の型は`UnsupportedField`エラー。
pub fn field_to_cell(field: Field) -> Result<Cell, StatementError> {
    match field {
        Field::StringValue(v) => Ok(SqlValue::String(v)),
        Field::LongValue(v) => Ok(SqlValue::Integer(v)),
        Field::BooleanValue(v) => Ok(SqlValue::Boolean(v)),
        Field::IsNull(_) => Ok(SqlValue::Null),
        other => Err(StatementError::terminal(
            Some(UNSUPPORTED_FIELD_CODE),
            format!("unsupported result field: {other:?}"),
        )),
    }
}

/// SDKエラーを分類済みのStatementErrorに変換
fn classify_sdk_error<E, R>(err: &SdkError<E, R>) -> StatementError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(err).to_string();
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            StatementError::transient(None, message)
        }
        SdkError::ServiceError(context) => {
            let code = context.err().code();
            let service_message = context.err().message().unwrap_or_default();
            match classify_error_code(code, service_message) {
                ErrorClass::Transient => StatementError::transient(code, message),
                ErrorClass::Terminal => StatementError::terminal(code, message),
            }
        }
        // ConstructionFailureなど、送信前に失敗したもの
        _ => StatementError::terminal(None, message),
    }
}

/// Aurora Data API StatementClient実装
#[derive(Debug, Clone)]
pub struct RdsDataStatementClient {
    /// RDS Data APIクライアント（SDKの再試行は無効化済み）
    client: RdsDataClient,
    /// AuroraクラスターARN
    resource_arn: String,
    /// 認証情報のSecrets Manager ARN
    secret_arn: String,
    /// データベース名
    database: String,
}

impl RdsDataStatementClient {
    /// 新しいクライアントを作成
    pub fn new(
        client: RdsDataClient,
        resource_arn: impl Into<String>,
        secret_arn: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            client,
            resource_arn: resource_arn.into(),
            secret_arn: secret_arn.into(),
            database: database.into(),
        }
    }
}

#[async_trait]
impl StatementClient for RdsDataStatementClient {
    #[instrument(skip(self, request), fields(database = %self.database, parameter_count = request.parameters().len()))]
    async fn execute_statement(
        &self,
        request: &StatementRequest,
    ) -> Result<ExecutionResult, StatementError> {
        let parameters = request
            .parameters()
            .iter()
            .map(|p| to_sql_parameter(&p.name, &p.value))
            .collect::<Vec<_>>();

        let output = self
            .client
            .execute_statement()
            .resource_arn(&self.resource_arn)
            .secret_arn(&self.secret_arn)
            .database(&self.database)
            .sql(request.sql())
            .set_parameters(Some(parameters))
            .send()
            .await
            .map_err(|err| {
                let error = classify_sdk_error(&err);
                warn!(
                    code = error.code.as_deref().unwrap_or("-"),
                    transient = error.is_transient(),
                    error = %error.message,
                    "ExecuteStatement失敗"
                );
                error
            })?;

        let rows = output
            .records
            .unwrap_or_default()
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(field_to_cell)
                    .collect::<Result<Vec<_>, _>>()
                    .map(Row)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let generated_fields = output
            .generated_fields
            .unwrap_or_default()
            .into_iter()
            .map(field_to_cell)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            row_count = rows.len(),
            records_updated = output.number_of_records_updated,
            "ExecuteStatement成功"
        );

        Ok(ExecutionResult {
            rows,
            records_updated: output.number_of_records_updated,
            generated_fields,
        })
    }
}
