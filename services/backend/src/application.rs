// アプリケーション層モジュール
pub mod api_response;
pub mod csv_handler;
pub mod emotion_handler;
pub mod handler_error;
pub mod item_handler;
pub mod key_value_handler;
pub mod organization_handler;
pub mod question_handler;
pub mod request_parser;

// 再エクスポート
pub use api_response::{ApiResponse, build_cors_headers, respond};
pub use csv_handler::{CsvUpload, handle_post_csv, inspect_csv};
pub use emotion_handler::EmotionHandler;
pub use handler_error::HandlerError;
pub use item_handler::{ItemHandler, RecommendCriteria};
pub use key_value_handler::{IdHandler, IdRecord, RoomHandler, RoomRequest};
pub use organization_handler::{AccountRequest, DataStructureRequest, OrganizationHandler};
pub use question_handler::{NewAnswer, NewQuestion, QuestionFilter, QuestionHandler};
pub use request_parser::{ParseError, invocation_deadline};
