// 質問・回答ハンドラー

use crate::application::api_response::ApiResponse;
use crate::application::handler_error::HandlerError;
use crate::application::request_parser::{
    MAX_LONG_TEXT_CHARS, MAX_SHORT_TEXT_CHARS, check_text, deserialize_flexible_i64,
    invocation_deadline, json_body, parse_i64, path_param, query_param,
};
use crate::domain::StatementRequest;
use crate::infrastructure::{ResilientExecutor, StatementClient};
use lambda_http::Request;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::{info, instrument};

const QUESTION_WITH_ANSWERS_SQL: &str = "SELECT q.question_title, q.question_text, \
     a.id AS answer_id, a.answer_text \
     FROM QUESTIONS q LEFT JOIN ANSWERS a ON q.id = a.question_id \
     WHERE q.id = :question_id";

const QUESTIONS_SQL: &str = "SELECT id, question_title FROM QUESTIONS";

const INSERT_QUESTION_SQL: &str = "INSERT INTO QUESTIONS \
     (item_id, question_user, question_title, question_text) \
     VALUES (:item_id, :question_user, :question_title, :question_text)";

const INSERT_ANSWER_SQL: &str = "INSERT INTO ANSWERS (question_id, answer_user, answer_text) \
     VALUES (:question_id, :answer_user, :answer_text)";

/// 質問投稿ボディ
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NewQuestion {
    pub question_user: String,
    pub question_title: String,
    pub question_text: String,
}

impl NewQuestion {
    fn validate(&self) -> Result<(), HandlerError> {
        check_text("question_user", &self.question_user, MAX_SHORT_TEXT_CHARS)?;
        check_text("question_title", &self.question_title, MAX_SHORT_TEXT_CHARS)?;
        check_text("question_text", &self.question_text, MAX_LONG_TEXT_CHARS)?;
        Ok(())
    }
}

/// 回答投稿ボディ
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct NewAnswer {
    #[serde(deserialize_with = "deserialize_flexible_i64")]
    pub question_id: i64,
    pub answer_user: String,
    pub answer_text: String,
}

impl NewAnswer {
    fn validate(&self) -> Result<(), HandlerError> {
        check_text("answer_user", &self.answer_user, MAX_SHORT_TEXT_CHARS)?;
        check_text("answer_text", &self.answer_text, MAX_LONG_TEXT_CHARS)?;
        Ok(())
    }
}

/// 質問一覧の絞り込み条件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub item_id: Option<i64>,
    pub organization_id: Option<String>,
}

impl QuestionFilter {
    /// 条件付きのステートメントを構築
    pub fn build_request(&self) -> StatementRequest {
        let mut conditions = Vec::new();
        if self.item_id.is_some() {
            conditions.push("item_id = :item_id");
        }
        if self.organization_id.is_some() {
            conditions.push("organization_id = :organization_id");
        }

        let sql = if conditions.is_empty() {
            QUESTIONS_SQL.to_string()
        } else {
            format!("{} WHERE {}", QUESTIONS_SQL, conditions.join(" AND "))
        };

        let mut request = StatementRequest::new(sql);
        if let Some(item_id) = self.item_id {
            request = request.bind("item_id", item_id);
        }
        if let Some(organization_id) = &self.organization_id {
            request = request.bind("organization_id", organization_id.as_str());
        }
        request
    }
}

/// 質問・回答ハンドラー
pub struct QuestionHandler<C: StatementClient> {
    executor: ResilientExecutor<C>,
}

impl<C: StatementClient> QuestionHandler<C> {
    pub fn new(executor: ResilientExecutor<C>) -> Self {
        Self { executor }
    }

    /// 質問と回答一覧を取得
    ///
    /// 質問が存在しない場合はNotFound。
    #[instrument(skip(self, deadline))]
    pub async fn question(
        &self,
        question_id: i64,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        let request =
            StatementRequest::new(QUESTION_WITH_ANSWERS_SQL).bind("question_id", question_id);
        let result = self.executor.scoped(deadline).execute(&request).await?;

        let Some(first) = result.first_row() else {
            return Err(HandlerError::NotFound(format!(
                "Question {} not found",
                question_id
            )));
        };
        let question_title = first.optional_string(0)?.unwrap_or_default();
        let question_text = first.optional_string(1)?.unwrap_or_default();

        // LEFT JOINで回答がない行はanswer_idがNULL
        let mut answers = Vec::new();
        for row in &result.rows {
            if let Some(answer_id) = row.optional_integer(2)? {
                answers.push(json!({
                    "answer_id": answer_id,
                    "answer_text": row.optional_string(3)?,
                }));
            }
        }
        info!(answer_count = answers.len(), "質問を取得");

        Ok(ApiResponse::success(
            "Successfully fetched question and answers",
            json!({
                "question_title": question_title,
                "question_text": question_text,
                "answers": answers,
            }),
        ))
    }

    /// 質問一覧を取得
    #[instrument(skip(self, deadline))]
    pub async fn questions(
        &self,
        filter: &QuestionFilter,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        let request = filter.build_request();
        let result = self.executor.scoped(deadline).execute(&request).await?;

        let questions = result
            .rows
            .iter()
            .map(|row| -> Result<Value, HandlerError> {
                Ok(json!({
                    "question_id": row.integer(0)?,
                    "question_title": row.optional_string(1)?,
                }))
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!(question_count = questions.len(), "質問一覧を取得");

        Ok(ApiResponse::success(
            "Questions fetched successfully",
            json!({"questions": questions}),
        ))
    }

    /// アイテムに質問を投稿
    #[instrument(skip(self, question, deadline))]
    pub async fn post_question(
        &self,
        item_id: i64,
        question: &NewQuestion,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        question.validate()?;

        let request = StatementRequest::new(INSERT_QUESTION_SQL)
            .bind("item_id", item_id)
            .bind("question_user", question.question_user.as_str())
            .bind("question_title", question.question_title.as_str())
            .bind("question_text", question.question_text.as_str());
        let result = self.executor.scoped(deadline).execute(&request).await?;

        let question_id = result.generated_id();
        info!(?question_id, "質問を保存");

        Ok(ApiResponse::success(
            "質問を保存しました。",
            match question_id {
                Some(id) => json!({"question_id": id}),
                None => json!({}),
            },
        ))
    }

    /// 質問に回答を投稿
    #[instrument(skip(self, answer, deadline), fields(question_id = answer.question_id))]
    pub async fn post_answer(
        &self,
        answer: &NewAnswer,
        deadline: Option<Instant>,
    ) -> Result<ApiResponse, HandlerError> {
        answer.validate()?;

        let request = StatementRequest::new(INSERT_ANSWER_SQL)
            .bind("question_id", answer.question_id)
            .bind("answer_user", answer.answer_user.as_str())
            .bind("answer_text", answer.answer_text.as_str());
        let result = self.executor.scoped(deadline).execute(&request).await?;

        let answer_id = result.generated_id();
        info!(?answer_id, "回答を保存");

        Ok(ApiResponse::success(
            "記録に成功しました．",
            match answer_id {
                Some(id) => json!({"answer_id": id}),
                None => json!({}),
            },
        ))
    }

    /// GET /questions/{id}
    pub async fn handle_get_question(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let question_id = parse_i64("id", &path_param(request, "id")?)?;
        self.question(question_id, invocation_deadline(request))
            .await
    }

    /// GET /questions
    pub async fn handle_get_questions(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let item_id = query_param(request, "item_id")
            .map(|value| parse_i64("item_id", &value))
            .transpose()?;
        let organization_id = query_param(request, "organization_id");
        if let Some(organization_id) = &organization_id {
            check_text("organization_id", organization_id, MAX_SHORT_TEXT_CHARS)?;
        }

        let filter = QuestionFilter {
            item_id,
            organization_id,
        };
        self.questions(&filter, invocation_deadline(request)).await
    }

    /// POST /items/{id}/questions
    pub async fn handle_post_question_to_item(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let item_id = parse_i64("id", &path_param(request, "id")?)?;
        let question: NewQuestion = json_body(request)?;
        self.post_question(item_id, &question, invocation_deadline(request))
            .await
    }

    /// POST /answers
    pub async fn handle_post_answer_to_question(
        &self,
        request: &Request,
    ) -> Result<ApiResponse, HandlerError> {
        let answer: NewAnswer = json_body(request)?;
        self.post_answer(&answer, invocation_deadline(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::request_parser::tests::request;
    use crate::domain::{ExecutionResult, RetryPolicy, SqlValue};
    use crate::infrastructure::StatementError;
    use crate::infrastructure::statement_client::tests::MockStatementClient;

    fn handler(mock: &MockStatementClient) -> QuestionHandler<MockStatementClient> {
        QuestionHandler::new(ResilientExecutor::new(mock.clone(), RetryPolicy::default()))
    }

    fn generated(id: i64) -> ExecutionResult {
        ExecutionResult {
            records_updated: 1,
            generated_fields: vec![SqlValue::Integer(id)],
            ..Default::default()
        }
    }

    // ==================== 質問取得テスト ====================

    /// 質問と回答がまとめて返る
    #[tokio::test]
    async fn test_get_question_with_answers() {
        let mock = MockStatementClient::new();
        mock.push_rows(vec![
            vec![
                SqlValue::from("遊具について"),
                SqlValue::from("ブランコはありますか"),
                SqlValue::Integer(10),
                SqlValue::from("あります"),
            ],
            vec![
                SqlValue::from("遊具について"),
                SqlValue::from("ブランコはありますか"),
                SqlValue::Integer(11),
                SqlValue::Null,
            ],
        ]);

        let req = request(&[], &[("id", "3")], None);
        let response = handler(&mock).handle_get_question(&req).await.unwrap();

        assert_eq!(
            response.body,
            json!({
                "status": 200,
                "question_title": "遊具について",
                "question_text": "ブランコはありますか",
                "answers": [
                    {"answer_id": 10, "answer_text": "あります"},
                    {"answer_id": 11, "answer_text": null}
                ],
                "message": "Successfully fetched question and answers"
            })
        );
        assert_eq!(
            mock.requests()[0].parameter("question_id"),
            Some(&SqlValue::Integer(3))
        );
    }

    /// 回答のない質問は空配列
    #[tokio::test]
    async fn test_get_question_without_answers() {
        let mock = MockStatementClient::new();
        mock.push_rows(vec![vec![
            SqlValue::from("タイトル"),
            SqlValue::from("本文"),
            SqlValue::Null,
            SqlValue::Null,
        ]]);

        let req = request(&[], &[("id", "3")], None);
        let response = handler(&mock).handle_get_question(&req).await.unwrap();

        assert_eq!(response.body["answers"], json!([]));
    }

    /// 存在しない質問は404
    #[tokio::test]
    async fn test_get_question_not_found() {
        let mock = MockStatementClient::new();
        mock.push_rows(vec![]);

        let req = request(&[], &[("id", "404")], None);
        let error = handler(&mock).handle_get_question(&req).await.unwrap_err();

        assert_eq!(error.status_code(), 404);
    }

    /// 数値でないIDはDBを呼ばずに400
    #[tokio::test]
    async fn test_get_question_invalid_id() {
        let mock = MockStatementClient::new();
        let req = request(&[], &[("id", "abc")], None);

        let error = handler(&mock).handle_get_question(&req).await.unwrap_err();

        assert_eq!(error.kind(), "ParseError");
        assert_eq!(mock.call_count(), 0);
    }

    // ==================== 質問一覧テスト ====================

    #[test]
    fn test_question_filter_sql() {
        let request = QuestionFilter::default().build_request();
        assert_eq!(request.sql(), QUESTIONS_SQL);
        assert!(request.parameters().is_empty());

        let request = QuestionFilter {
            item_id: Some(5),
            organization_id: Some("org-1".to_string()),
        }
        .build_request();
        assert_eq!(
            request.sql(),
            "SELECT id, question_title FROM QUESTIONS WHERE item_id = :item_id AND organization_id = :organization_id"
        );
        assert!(request.validate().is_ok());
    }

    #[tokio::test]
    async fn test_get_questions() {
        let mock = MockStatementClient::new();
        mock.push_rows(vec![
            vec![SqlValue::Integer(1), SqlValue::from("トイレ")],
            vec![SqlValue::Integer(2), SqlValue::from("駐車場")],
        ]);

        let req = request(&[("item_id", "5")], &[], None);
        let response = handler(&mock).handle_get_questions(&req).await.unwrap();

        assert_eq!(
            response.body["questions"],
            json!([
                {"question_id": 1, "question_title": "トイレ"},
                {"question_id": 2, "question_title": "駐車場"}
            ])
        );
        assert_eq!(response.body["message"], "Questions fetched successfully");
        assert_eq!(
            mock.requests()[0].parameter("item_id"),
            Some(&SqlValue::Integer(5))
        );
    }

    #[tokio::test]
    async fn test_get_questions_invalid_item_id() {
        let mock = MockStatementClient::new();
        let req = request(&[("item_id", "five")], &[], None);

        let error = handler(&mock).handle_get_questions(&req).await.unwrap_err();

        assert_eq!(error.status_code(), 400);
        assert_eq!(mock.call_count(), 0);
    }

    // ==================== 質問投稿テスト ====================

    #[tokio::test]
    async fn test_post_question_to_item() {
        let mock = MockStatementClient::new();
        mock.push_ok(generated(42));

        let req = request(
            &[],
            &[("id", "7")],
            Some(r#"{"question_user": "花子", "question_title": "開園時間", "question_text": "何時から開いていますか"}"#),
        );
        let response = handler(&mock)
            .handle_post_question_to_item(&req)
            .await
            .unwrap();

        assert_eq!(
            response.body,
            json!({"status": 200, "question_id": 42, "message": "質問を保存しました。"})
        );
        let statement = &mock.requests()[0];
        assert_eq!(statement.sql(), INSERT_QUESTION_SQL);
        assert_eq!(statement.parameter("item_id"), Some(&SqlValue::Integer(7)));
        assert_eq!(
            statement.parameter("question_user"),
            Some(&SqlValue::from("花子"))
        );
    }

    /// 文字数上限を超える場合はDBを呼ばずに400
    #[tokio::test]
    async fn test_post_question_too_long() {
        let mock = MockStatementClient::new();
        let body = json!({
            "question_user": "花子",
            "question_title": "t".repeat(65),
            "question_text": "本文",
        })
        .to_string();

        let req = request(&[], &[("id", "7")], Some(&body));
        let error = handler(&mock)
            .handle_post_question_to_item(&req)
            .await
            .unwrap_err();

        assert_eq!(error.status_code(), 400);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_post_question_missing_field() {
        let mock = MockStatementClient::new();
        let req = request(&[], &[("id", "7")], Some(r#"{"question_user": "花子"}"#));

        let error = handler(&mock)
            .handle_post_question_to_item(&req)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), "ParseError");
    }

    // ==================== 回答投稿テスト ====================

    #[tokio::test]
    async fn test_post_answer_to_question() {
        let mock = MockStatementClient::new();
        mock.push_ok(generated(9));

        let req = request(
            &[],
            &[],
            Some(r#"{"question_id": "3", "answer_user": "管理者", "answer_text": "9時からです"}"#),
        );
        let response = handler(&mock)
            .handle_post_answer_to_question(&req)
            .await
            .unwrap();

        assert_eq!(response.body["answer_id"], 9);
        assert_eq!(response.body["message"], "記録に成功しました．");
        assert_eq!(
            mock.requests()[0].parameter("question_id"),
            Some(&SqlValue::Integer(3))
        );
    }

    /// 生成IDがない場合はanswer_idを含めない
    #[tokio::test]
    async fn test_post_answer_without_generated_id() {
        let mock = MockStatementClient::new();
        mock.push_ok(ExecutionResult::with_records_updated(1));

        let req = request(
            &[],
            &[],
            Some(r#"{"question_id": 3, "answer_user": "管理者", "answer_text": "はい"}"#),
        );
        let response = handler(&mock)
            .handle_post_answer_to_question(&req)
            .await
            .unwrap();

        assert!(response.body.get("answer_id").is_none());
    }

    /// 外部キー違反などの恒久的エラーは400
    #[tokio::test]
    async fn test_post_answer_terminal_error() {
        let mock = MockStatementClient::new();
        mock.push_error(StatementError::terminal(
            Some("BadRequestException"),
            "Cannot add or update a child row",
        ));

        let req = request(
            &[],
            &[],
            Some(r#"{"question_id": 999, "answer_user": "管理者", "answer_text": "はい"}"#),
        );
        let error = handler(&mock)
            .handle_post_answer_to_question(&req)
            .await
            .unwrap_err();

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.kind(), "RemoteTerminal");
        assert_eq!(mock.call_count(), 1);
    }
}
