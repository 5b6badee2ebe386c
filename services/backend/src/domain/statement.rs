// SQLステートメントとバインドパラメータ
//
// Data APIに送信するステートメント文字列と名前付きパラメータを保持し、
// リモート呼び出し前にプレースホルダーとパラメータの対応を検証する。

use super::sql_value::SqlValue;
use std::collections::HashSet;
use thiserror::Error;

/// ステートメント検証エラー
///
/// いずれもリモート呼び出しを行う前に検出される呼び出し側の入力誤り。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatementValidationError {
    /// ステートメント文字列が空
    #[error("Statement is empty")]
    EmptyStatement,

    /// パラメータ名が識別子として不正
    #[error("Invalid parameter name: {0:?}")]
    InvalidParameterName(String),

    /// 同じ名前のパラメータが複数バインドされている
    #[error("Duplicate parameter: {0}")]
    DuplicateParameter(String),

    /// プレースホルダーに対応するパラメータがない
    #[error("Missing parameter for placeholder :{0}")]
    MissingParameter(String),

    /// どのプレースホルダーからも参照されないパラメータ
    #[error("Parameter {0} is not referenced by the statement")]
    UnusedParameter(String),
}

/// 名前付きの型付きパラメータ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundParameter {
    /// パラメータ名（先頭のコロンを含まない）
    pub name: String,
    /// バインドする値
    pub value: SqlValue,
}

impl BoundParameter {
    /// 新しいパラメータを作成
    pub fn new(name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// ステートメント実行リクエスト
///
/// SQL文字列と、そこに現れる`:name`プレースホルダーに対応する
/// パラメータの順序付きリスト。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRequest {
    sql: String,
    parameters: Vec<BoundParameter>,
}

impl StatementRequest {
    /// パラメータなしのリクエストを作成
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    /// パラメータを追加
    ///
    /// # 使用例
    /// ```ignore
    /// let request = StatementRequest::new("SELECT * FROM ITEMS WHERE id = :id")
    ///     .bind("id", 42i64);
    /// ```
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.parameters.push(BoundParameter::new(name, value));
        self
    }

    /// SQL文字列を取得
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// バインドパラメータを取得
    pub fn parameters(&self) -> &[BoundParameter] {
        &self.parameters
    }

    /// 名前でパラメータ値を取得
    pub fn parameter(&self, name: &str) -> Option<&SqlValue> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// プレースホルダーとパラメータの対応を検証
    ///
    /// 各プレースホルダーにちょうど1つのパラメータが対応し、
    /// 参照されないパラメータが存在しないことを確認する。
    pub fn validate(&self) -> Result<(), StatementValidationError> {
        if self.sql.trim().is_empty() {
            return Err(StatementValidationError::EmptyStatement);
        }

        let mut bound = HashSet::new();
        for parameter in &self.parameters {
            if !is_identifier(&parameter.name) {
                return Err(StatementValidationError::InvalidParameterName(
                    parameter.name.clone(),
                ));
            }
            if !bound.insert(parameter.name.as_str()) {
                return Err(StatementValidationError::DuplicateParameter(
                    parameter.name.clone(),
                ));
            }
        }

        let placeholders = placeholder_names(&self.sql);
        for name in &placeholders {
            if !bound.contains(name.as_str()) {
                return Err(StatementValidationError::MissingParameter(name.clone()));
            }
        }

        let referenced: HashSet<&str> = placeholders.iter().map(String::as_str).collect();
        if let Some(unused) = self
            .parameters
            .iter()
            .find(|p| !referenced.contains(p.name.as_str()))
        {
            return Err(StatementValidationError::UnusedParameter(unused.name.clone()));
        }

        Ok(())
    }
}

/// SQL文字列から`:name`プレースホルダー名を出現順に抽出する
///
/// 引用符（'...'、"..."、`...`）の内側、`--`と`/* */`のコメント、`::`キャストは無視する。
/// 同じ名前が複数回現れた場合も出現ごとに返す。
pub fn placeholder_names(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut names = Vec::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if let Some(q) = quote {
            if c == '\\' && q != '`' {
                i += 2;
                continue;
            }
            if c == q {
                // 連続した引用符はエスケープ
                if next == Some(q) {
                    i += 2;
                    continue;
                }
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' | '`' => quote = Some(c),
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if next == Some('*') => {
                // 閉じていないコメントは末尾まで
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 2;
                continue;
            }
            ':' if next == Some(':') => {
                i += 2;
                continue;
            }
            ':' if next.is_some_and(is_identifier_start) => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_identifier_char(chars[end]) {
                    end += 1;
                }
                names.push(chars[start..end].iter().collect());
                i = end;
                continue;
            }
            _ => {}
        }
        i += 1;
    }

    names
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_identifier_start(first) => chars.all(is_identifier_char),
        _ => false,
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
