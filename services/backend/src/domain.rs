// Domain layer modules
pub mod csv_table;
pub mod emotion;
pub mod execution_result;
pub mod geo;
pub mod retry_policy;
pub mod room;
pub mod sql_value;
pub mod statement;

// Re-exports
pub use csv_table::{ColumnType, CsvTable, CsvTableError, DataAttributes};
pub use emotion::{EMOTION_LABELS, EmotionScoreError, EmotionScores};
pub use execution_result::{ExecutionResult, Row, RowDecodeError};
pub use geo::{Coordinates, CoordinateError, NEAREST_ITEM_COUNT};
pub use retry_policy::{RetryPolicy, RetryPolicyError};
pub use room::{Room, RoomStatus, generate_room_id};
pub use sql_value::{Cell, SqlValue};
pub use statement::{BoundParameter, StatementRequest, StatementValidationError};
