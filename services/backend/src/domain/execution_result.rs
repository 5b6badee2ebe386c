// ステートメント実行結果
//
// Data APIから返された行データ・更新件数・生成キーを保持する。
// 行は位置以外の識別子を持たない。

use super::sql_value::Cell;
use thiserror::Error;

/// 行デコードエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowDecodeError {
    /// 指定した列が存在しない
    #[error("Column {index} out of range (row has {len} columns)")]
    ColumnOutOfRange { index: usize, len: usize },

    /// 列の型が期待と異なる
    #[error("Column {index} type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
}

/// 結果セットの1行
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row(pub Vec<Cell>);

impl Row {
    /// 列数を取得
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 列が空かどうか
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// セルを取得
    pub fn cell(&self, index: usize) -> Result<&Cell, RowDecodeError> {
        self.0.get(index).ok_or(RowDecodeError::ColumnOutOfRange {
            index,
            len: self.0.len(),
        })
    }

    /// 文字列列を取得（NULL不可）
    pub fn string(&self, index: usize) -> Result<String, RowDecodeError> {
        let cell = self.cell(index)?;
        cell.as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch(index, "string", cell))
    }

    /// 整数列を取得（NULL不可）
    pub fn integer(&self, index: usize) -> Result<i64, RowDecodeError> {
        let cell = self.cell(index)?;
        cell.as_i64().ok_or_else(|| mismatch(index, "integer", cell))
    }

    /// 真偽値列を取得（NULL不可）
    pub fn boolean(&self, index: usize) -> Result<bool, RowDecodeError> {
        let cell = self.cell(index)?;
        cell.as_bool().ok_or_else(|| mismatch(index, "boolean", cell))
    }

    /// NULL許容の文字列列を取得
    pub fn optional_string(&self, index: usize) -> Result<Option<String>, RowDecodeError> {
        if self.cell(index)?.is_null() {
            return Ok(None);
        }
        self.string(index).map(Some)
    }

    /// NULL許容の整数列を取得
    pub fn optional_integer(&self, index: usize) -> Result<Option<i64>, RowDecodeError> {
        if self.cell(index)?.is_null() {
            return Ok(None);
        }
        self.integer(index).map(Some)
    }
}

fn mismatch(index: usize, expected: &'static str, actual: &Cell) -> RowDecodeError {
    RowDecodeError::TypeMismatch {
        index,
        expected,
        actual: actual.type_name(),
    }
}

impl From<Vec<Cell>> for Row {
    fn from(cells: Vec<Cell>) -> Self {
        Row(cells)
    }
}

/// ステートメント実行結果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    /// 返却された行（SELECT以外では空）
    pub rows: Vec<Row>,
    /// 更新された行数（numberOfRecordsUpdated）
    pub records_updated: i64,
    /// INSERTで生成されたキー
    pub generated_fields: Vec<Cell>,
}

impl ExecutionResult {
    /// 行のみを持つ結果を作成
    pub fn with_rows(rows: Vec<Row>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    /// 更新件数のみを持つ結果を作成
    pub fn with_records_updated(records_updated: i64) -> Self {
        Self {
            records_updated,
            ..Default::default()
        }
    }

    /// 先頭行を取得
    pub fn first_row(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// 先頭の生成キーを整数として取得
    pub fn generated_id(&self) -> Option<i64> {
        self.generated_fields.first().and_then(Cell::as_i64)
    }
}
