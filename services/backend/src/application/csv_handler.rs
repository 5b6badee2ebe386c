// CSVアップロードハンドラー

use crate::application::api_response::ApiResponse;
use crate::application::handler_error::HandlerError;
use crate::application::request_parser::json_body;
use crate::domain::CsvTable;
use lambda_http::Request;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// Base64エンコードされたCSVを含むボディ
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CsvUpload {
    #[serde(rename = "csvData")]
    pub csv_data: String,
}

impl CsvUpload {
    /// CSVをデコードしてパース
    pub fn decode(&self) -> Result<CsvTable, HandlerError> {
        Ok(CsvTable::from_base64(&self.csv_data)?)
    }
}

/// CSVを解析して列と行数を返す
pub fn inspect_csv(upload: &CsvUpload) -> Result<ApiResponse, HandlerError> {
    let table = upload.decode()?;
    info!(
        column_count = table.headers().len(),
        row_count = table.row_count(),
        "CSVを解析"
    );

    Ok(ApiResponse::success(
        "CSV Processing Completed",
        json!({
            "columns": table.headers(),
            "row_count": table.row_count(),
        }),
    ))
}

/// POST /csv
pub fn handle_post_csv(request: &Request) -> Result<ApiResponse, HandlerError> {
    let upload: CsvUpload = json_body(request)?;
    inspect_csv(&upload)
}
