/// 外部サービス接続設定
///
/// 環境変数はLambda起動時に一度だけ読み込み、以降の呼び出しでは
/// 参照で共有する。
use super::resilient_executor::ResilientExecutor;
use super::statement_client::RdsDataStatementClient;
use crate::domain::RetryPolicy;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_rdsdata::Client as RdsDataClient;
use aws_sdk_rdsdata::config::retry::RetryConfig;
use aws_sdk_rdsdata::config::timeout::TimeoutConfig;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Data APIの接続タイムアウト（秒）
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Data APIの読み取りタイムアウト（秒）
const READ_TIMEOUT_SECS: u64 = 90;

/// ルームテーブル名のデフォルト値
pub const DEFAULT_ROOM_TABLE: &str = "room";

/// ルーム状態テーブル名のデフォルト値
pub const DEFAULT_ROOM_STATUS_TABLE: &str = "room_status";

/// 設定のエラー型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

/// 環境からAWS設定を読み込む（認証情報、リージョンなど）
pub async fn load_aws_config() -> SdkConfig {
    aws_config::load_defaults(BehaviorVersion::latest()).await
}

/// Aurora Data API設定
///
/// 環境変数:
/// - CLUSTER_ARN: AuroraクラスターARN
/// - SECRET_ARN: 認証情報のSecrets Manager ARN
/// - DB_NAME: データベース名
/// - RETRY_*: リトライポリシー（`RetryPolicy::from_env`を参照）
#[derive(Debug, Clone, PartialEq)]
pub struct DataApiConfig {
    cluster_arn: String,
    secret_arn: String,
    database: String,
    retry_policy: RetryPolicy,
}

impl DataApiConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        let cluster_arn = required_env("CLUSTER_ARN")?;
        let secret_arn = required_env("SECRET_ARN")?;
        let database = required_env("DB_NAME")?;
        let retry_policy = RetryPolicy::from_env();

        info!(database = %database, "DataApiConfigを読み込み");

        Ok(Self {
            cluster_arn,
            secret_arn,
            database,
            retry_policy,
        })
    }

    /// 明示的な値で設定を作成（テスト用）
    pub fn new(
        cluster_arn: impl Into<String>,
        secret_arn: impl Into<String>,
        database: impl Into<String>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            cluster_arn: cluster_arn.into(),
            secret_arn: secret_arn.into(),
            database: database.into(),
            retry_policy,
        }
    }

    pub fn cluster_arn(&self) -> &str {
        &self.cluster_arn
    }

    pub fn secret_arn(&self) -> &str {
        &self.secret_arn
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Data APIクライアントを構築
    ///
    /// 再試行はResilientExecutorが行うため、SDKの再試行は無効化する。
    pub fn statement_client(&self, sdk_config: &SdkConfig) -> RdsDataStatementClient {
        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .read_timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .build();

        let rds_config = aws_sdk_rdsdata::config::Builder::from(sdk_config)
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeout_config)
            .build();

        RdsDataStatementClient::new(
            RdsDataClient::from_conf(rds_config),
            &self.cluster_arn,
            &self.secret_arn,
            &self.database,
        )
    }

    /// 設定のリトライポリシーを持つ実行器を構築
    pub fn executor(&self, sdk_config: &SdkConfig) -> ResilientExecutor<RdsDataStatementClient> {
        info!(database = %self.database, "Data API実行器を構築");
        ResilientExecutor::new(self.statement_client(sdk_config), self.retry_policy)
    }
}

/// IDテーブル名を環境変数`TABLE_NAME`から読み込む
pub fn id_table_from_env() -> Result<String, ConfigError> {
    required_env("TABLE_NAME")
}

/// ルーム用テーブル名
///
/// 環境変数:
/// - ROOM_TABLE: ルームテーブル（デフォルト: room）
/// - ROOM_STATUS_TABLE: ルーム状態テーブル（デフォルト: room_status）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomTablesConfig {
    pub room_table: String,
    pub room_status_table: String,
}

impl RoomTablesConfig {
    pub fn from_env() -> Self {
        let room_table = std::env::var("ROOM_TABLE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROOM_TABLE.to_string());
        let room_status_table = std::env::var("ROOM_STATUS_TABLE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ROOM_STATUS_TABLE.to_string());

        Self {
            room_table,
            room_status_table,
        }
    }
}

/// 感情推定モデルのLambda関数名を環境変数`EMOTION_MODEL_FUNCTION`から読み込む
pub fn emotion_model_function_from_env() -> Result<String, ConfigError> {
    required_env("EMOTION_MODEL_FUNCTION")
}
