// CSVテーブルと列型変換
//
// Base64エンコードされたCSVをデコード・パースし、組織ごとのdata_attributes
// （列名 → dtype）に従って列を絞り込み、セルをJSON値へ変換する。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Number, Value};
use std::str::FromStr;
use thiserror::Error;

/// CSV処理エラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CsvTableError {
    /// Base64デコード失敗
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(String),

    /// UTF-8として不正
    #[error("CSV payload is not valid UTF-8")]
    InvalidUtf8,

    /// CSVとしてパースできない
    #[error("Malformed CSV: {0}")]
    Malformed(String),

    /// data_attributesがJSONオブジェクトとして不正
    #[error("Invalid data_attributes: {0}")]
    InvalidDataAttributes(String),

    /// 未対応のdtype
    #[error("Unknown dtype {dtype:?} for column {column:?}")]
    UnknownDtype { column: String, dtype: String },

    /// セルを指定型に変換できない
    #[error("Row {row}, column {column:?}: cannot convert {value:?} to {dtype}")]
    InvalidCell {
        row: usize,
        column: String,
        value: String,
        dtype: &'static str,
    },
}

/// 列の型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    String,
}

impl ColumnType {
    /// 型名（エラーメッセージ用）
    pub fn name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "int",
            ColumnType::Float => "float",
            ColumnType::Boolean => "bool",
            ColumnType::String => "str",
        }
    }

    /// セル文字列をJSON値へ変換する
    ///
    /// 空セルはnull。変換できない場合はNone。
    pub fn convert(&self, raw: &str) -> Option<Value> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Some(Value::Null);
        }

        match self {
            ColumnType::Integer => parse_integer(trimmed).map(Value::from),
            ColumnType::Float => trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            ColumnType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            ColumnType::String => Some(Value::String(raw.to_string())),
        }
    }
}

/// 整数へのパース（"3.0"のような整数値の小数表記も受け付ける）
fn parse_integer(value: &str) -> Option<i64> {
    if let Ok(parsed) = value.parse::<i64>() {
        return Some(parsed);
    }
    let float = value.parse::<f64>().ok()?;
    let in_range = float.is_finite()
        && float.fract() == 0.0
        && float >= i64::MIN as f64
        && float < i64::MAX as f64;
    in_range.then_some(float as i64)
}

impl FromStr for ColumnType {
    type Err = ();

    /// pandasのdtype名から変換
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "int32" | "int64" => Ok(ColumnType::Integer),
            "float" | "float32" | "float64" => Ok(ColumnType::Float),
            "bool" => Ok(ColumnType::Boolean),
            "str" | "string" | "object" => Ok(ColumnType::String),
            _ => Err(()),
        }
    }
}

/// 組織のデータ属性定義（列名 → 型）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataAttributes {
    columns: Vec<(String, ColumnType)>,
}

impl DataAttributes {
    /// JSONオブジェクトから作成
    ///
    /// 値はdtype名の文字列である必要がある。
    pub fn from_json(value: &Value) -> Result<Self, CsvTableError> {
        let object = value.as_object().ok_or_else(|| {
            CsvTableError::InvalidDataAttributes("expected a JSON object".to_string())
        })?;

        let mut columns = Vec::with_capacity(object.len());
        for (column, dtype) in object {
            let dtype_name = dtype.as_str().ok_or_else(|| {
                CsvTableError::InvalidDataAttributes(format!(
                    "dtype of column {column:?} must be a string"
                ))
            })?;
            let column_type =
                ColumnType::from_str(dtype_name).map_err(|_| CsvTableError::UnknownDtype {
                    column: column.clone(),
                    dtype: dtype_name.to_string(),
                })?;
            columns.push((column.clone(), column_type));
        }

        Ok(Self { columns })
    }

    /// JSON文字列から作成
    pub fn parse(text: &str) -> Result<Self, CsvTableError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CsvTableError::InvalidDataAttributes(e.to_string()))?;
        Self::from_json(&value)
    }

    /// 列の型を取得
    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, column_type)| *column_type)
    }

    /// 列数
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// パース済みCSV（ヘッダー行 + データ行）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl CsvTable {
    /// Base64エンコードされたCSVをデコードしてパース
    pub fn from_base64(encoded: &str) -> Result<Self, CsvTableError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CsvTableError::InvalidBase64(e.to_string()))?;
        let text = String::from_utf8(bytes).map_err(|_| CsvTableError::InvalidUtf8)?;
        Self::parse(&text)
    }

    /// CSV文字列をパース
    ///
    /// 先頭行をヘッダーとして扱う。列数の揃わない行はエラー。
    pub fn parse(text: &str) -> Result<Self, CsvTableError> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|e| CsvTableError::Malformed(e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        if headers.iter().all(String::is_empty) {
            return Err(CsvTableError::Malformed("missing header row".to_string()));
        }

        let records = reader
            .records()
            .map(|record| {
                record
                    .map(|r| r.iter().map(str::to_string).collect::<Vec<_>>())
                    .map_err(|e| CsvTableError::Malformed(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { headers, records })
    }

    /// ヘッダー（列名）
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// データ行数
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// data_attributesに含まれる列だけを残し、型変換したJSONオブジェクトを行ごとに返す
    ///
    /// CSVにない属性列は無視される。
    pub fn project(&self, attributes: &DataAttributes) -> Result<Vec<Map<String, Value>>, CsvTableError> {
        let selected: Vec<(usize, &String, ColumnType)> = self
            .headers
            .iter()
            .enumerate()
            .filter_map(|(index, header)| {
                attributes
                    .column_type(header)
                    .map(|column_type| (index, header, column_type))
            })
            .collect();

        self.records
            .iter()
            .enumerate()
            .map(|(row_index, record)| {
                let mut object = Map::new();
                for (index, header, column_type) in &selected {
                    let raw = record.get(*index).map(String::as_str).unwrap_or("");
                    let value =
                        column_type
                            .convert(raw)
                            .ok_or_else(|| CsvTableError::InvalidCell {
                                row: row_index + 1,
                                column: (*header).clone(),
                                value: raw.to_string(),
                                dtype: column_type.name(),
                            })?;
                    object.insert((*header).clone(), value);
                }
                Ok(object)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PARKS_CSV: &str = "名称,緯度,経度,公園面積_m2,トイレ\n\
                             中央公園,35.1,136.9,1200,true\n\
                             \"北公園, 第二\",35.2,136.8,,0\n";

    // ==================== dtype変換テスト ====================

    #[test]
    fn test_column_type_from_pandas_names() {
        assert_eq!("int64".parse::<ColumnType>(), Ok(ColumnType::Integer));
        assert_eq!("int32".parse::<ColumnType>(), Ok(ColumnType::Integer));
        assert_eq!("float64".parse::<ColumnType>(), Ok(ColumnType::Float));
        assert_eq!("bool".parse::<ColumnType>(), Ok(ColumnType::Boolean));
        assert_eq!("object".parse::<ColumnType>(), Ok(ColumnType::String));
        assert_eq!("str".parse::<ColumnType>(), Ok(ColumnType::String));
        assert!("datetime64".parse::<ColumnType>().is_err());
    }

    #[test]
    fn test_convert_cells() {
        assert_eq!(ColumnType::Integer.convert("42"), Some(json!(42)));
        assert_eq!(ColumnType::Integer.convert("3.0"), Some(json!(3)));
        assert_eq!(ColumnType::Integer.convert("3.5"), None);
        // 2^63はi64に収まらない
        assert_eq!(ColumnType::Integer.convert("9223372036854775808.0"), None);
        assert_eq!(
            ColumnType::Integer.convert("-9223372036854775808.0"),
            Some(json!(i64::MIN))
        );
        assert_eq!(ColumnType::Float.convert("1.25"), Some(json!(1.25)));
        assert_eq!(ColumnType::Float.convert("NaN"), None);
        assert_eq!(ColumnType::Boolean.convert("TRUE"), Some(json!(true)));
        assert_eq!(ColumnType::Boolean.convert("0"), Some(json!(false)));
        assert_eq!(ColumnType::Boolean.convert("yes"), None);
        assert_eq!(ColumnType::String.convert("abc"), Some(json!("abc")));
        assert_eq!(ColumnType::Integer.convert("  "), Some(Value::Null));
    }

    // ==================== data_attributesテスト ====================

    #[test]
    fn test_data_attributes_parse() {
        let attributes = DataAttributes::parse(r#"{"名称": "str", "緯度": "float64"}"#).unwrap();
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes.column_type("緯度"), Some(ColumnType::Float));
        assert_eq!(attributes.column_type("経度"), None);
    }

    #[test]
    fn test_data_attributes_unknown_dtype() {
        let result = DataAttributes::parse(r#"{"開園日": "datetime64"}"#);
        assert_eq!(
            result,
            Err(CsvTableError::UnknownDtype {
                column: "開園日".to_string(),
                dtype: "datetime64".to_string(),
            })
        );
    }

    #[test]
    fn test_data_attributes_not_object() {
        assert!(matches!(
            DataAttributes::parse("[1, 2]"),
            Err(CsvTableError::InvalidDataAttributes(_))
        ));
        assert!(matches!(
            DataAttributes::parse(r#"{"a": 1}"#),
            Err(CsvTableError::InvalidDataAttributes(_))
        ));
    }

    // ==================== CSVパーステスト ====================

    #[test]
    fn test_parse_headers_and_rows() {
        let table = CsvTable::parse(PARKS_CSV).unwrap();
        assert_eq!(
            table.headers(),
            &["名称", "緯度", "経度", "公園面積_m2", "トイレ"]
        );
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_parse_from_base64() {
        let encoded = STANDARD.encode(PARKS_CSV);
        let table = CsvTable::from_base64(&encoded).unwrap();
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_parse_invalid_base64() {
        assert!(matches!(
            CsvTable::from_base64("***"),
            Err(CsvTableError::InvalidBase64(_))
        ));
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let encoded = STANDARD.encode([0xff, 0xfe, 0x00]);
        assert_eq!(CsvTable::from_base64(&encoded), Err(CsvTableError::InvalidUtf8));
    }

    #[test]
    fn test_parse_ragged_rows() {
        let result = CsvTable::parse("a,b\n1,2,3\n");
        assert!(matches!(result, Err(CsvTableError::Malformed(_))));
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(CsvTable::parse(""), Err(CsvTableError::Malformed(_))));
    }

    // ==================== 列射影テスト ====================

    #[test]
    fn test_project_filters_and_converts() {
        let table = CsvTable::parse(PARKS_CSV).unwrap();
        let attributes = DataAttributes::from_json(&json!({
            "名称": "str",
            "緯度": "float64",
            "公園面積_m2": "int64",
            "トイレ": "bool",
            "存在しない列": "str"
        }))
        .unwrap();

        let rows = table.project(&attributes).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({"名称": "中央公園", "緯度": 35.1, "公園面積_m2": 1200, "トイレ": true})
        );
        assert_eq!(
            Value::Object(rows[1].clone()),
            json!({"名称": "北公園, 第二", "緯度": 35.2, "公園面積_m2": null, "トイレ": false})
        );
    }

    #[test]
    fn test_project_invalid_cell() {
        let table = CsvTable::parse("名称,面積\nA,広い\n").unwrap();
        let attributes = DataAttributes::from_json(&json!({"面積": "int"})).unwrap();

        assert_eq!(
            table.project(&attributes),
            Err(CsvTableError::InvalidCell {
                row: 1,
                column: "面積".to_string(),
                value: "広い".to_string(),
                dtype: "int",
            })
        );
    }
}
