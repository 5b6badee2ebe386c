// Infrastructure layer modules
pub mod config;
pub mod emotion_model;
pub mod key_value_repository;
pub mod logging;
pub mod resilient_executor;
pub mod statement_client;

// Re-exports
pub use config::{
    ConfigError, DataApiConfig, RoomTablesConfig, emotion_model_function_from_env,
    id_table_from_env, load_aws_config,
};
pub use emotion_model::{EmotionModel, LambdaEmotionModel, ModelError};
pub use key_value_repository::{
    DynamoIdRepository, DynamoRoomRepository, IdRepository, RepositoryError, RoomRepository,
};
pub use logging::init_logging;
#[cfg(test)]
pub use logging::init_test_logging;
pub use resilient_executor::{AttemptOutcome, RemoteCallError, ResilientExecutor, TracedExecution};
pub use statement_client::{
    ErrorClass, RdsDataStatementClient, StatementClient, StatementError, classify_error_code,
};
