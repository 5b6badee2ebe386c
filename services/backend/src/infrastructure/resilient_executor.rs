// ResilientExecutor - 再試行付きステートメント実行
//
// すべてのハンドラーはこの実行器を通してデータベースにアクセスする。
// リクエストを検証し、一時的な障害に対してジッター付き指数バックオフで再試行する。

use super::statement_client::{StatementClient, StatementError};
use crate::domain::{ExecutionResult, RetryPolicy, StatementRequest, StatementValidationError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// リモート呼び出しエラー
///
/// 試行回数と、取得できた場合は最後の根本原因を保持する。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteCallError {
    /// リクエストが不正（リモート呼び出しは行っていない）
    #[error("Invalid statement request: {0}")]
    InvalidRequest(#[from] StatementValidationError),

    /// 再試行しても回復しないエラー
    #[error("Statement failed after {attempts} attempt(s): {source}")]
    Terminal {
        attempts: u32,
        source: StatementError,
    },

    /// 最大試行回数に到達
    #[error("Retries exhausted after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: StatementError,
    },

    /// 呼び出し期限を超過
    #[error("Deadline exceeded after {attempts} attempt(s){}", last_cause(.last_error))]
    DeadlineExceeded {
        attempts: u32,
        last_error: Option<StatementError>,
    },
}

fn last_cause(last_error: &Option<StatementError>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(": {e}"))
        .unwrap_or_default()
}

impl RemoteCallError {
    /// エラー種別名（レスポンスの`error`フィールド用）
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteCallError::InvalidRequest(_) => "CallerInputInvalid",
            RemoteCallError::Terminal { .. } => "RemoteTerminal",
            RemoteCallError::RetriesExhausted { .. } => "PolicyExhausted",
            RemoteCallError::DeadlineExceeded { .. } => "DeadlineExceeded",
        }
    }

    /// 実際に行ったリモート呼び出しの回数
    pub fn attempts(&self) -> u32 {
        match self {
            RemoteCallError::InvalidRequest(_) => 0,
            RemoteCallError::Terminal { attempts, .. }
            | RemoteCallError::RetriesExhausted { attempts, .. }
            | RemoteCallError::DeadlineExceeded { attempts, .. } => *attempts,
        }
    }

    /// 最後の根本原因
    pub fn last_error(&self) -> Option<&StatementError> {
        match self {
            RemoteCallError::InvalidRequest(_) => None,
            RemoteCallError::Terminal { source, .. } => Some(source),
            RemoteCallError::RetriesExhausted { last_error, .. } => Some(last_error),
            RemoteCallError::DeadlineExceeded { last_error, .. } => last_error.as_ref(),
        }
    }
}

/// 1回の試行の記録（診断用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    /// 試行番号（1始まり）
    pub attempt_number: u32,
    /// 失敗した場合のエラー概要
    pub error: Option<String>,
    /// 次の試行までの待機時間（再試行する場合のみ）
    pub next_delay: Option<Duration>,
}

/// 試行記録付きの実行結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracedExecution {
    /// 各試行の記録
    pub outcomes: Vec<AttemptOutcome>,
    /// 最終結果
    pub result: Result<ExecutionResult, RemoteCallError>,
}

/// 再試行付きステートメント実行器
///
/// クライアント・デフォルトのリトライポリシー・呼び出し期限を保持する。
/// 呼び出しごとに`&client`から安価に構築できる。
#[derive(Debug, Clone)]
pub struct ResilientExecutor<C: StatementClient> {
    client: C,
    policy: RetryPolicy,
    deadline: Option<Instant>,
}

impl<C: StatementClient> ResilientExecutor<C> {
    /// 期限なしの実行器を作成
    pub fn new(client: C, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            deadline: None,
        }
    }

    /// 呼び出し期限を設定
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// クライアントを借用し、呼び出し期限を設定した実行器を作成
    ///
    /// Lambda起動時に作った実行器から、呼び出しごとに作る。
    pub fn scoped(&self, deadline: Option<Instant>) -> ResilientExecutor<&C> {
        ResilientExecutor {
            client: &self.client,
            policy: self.policy,
            deadline,
        }
    }

    /// デフォルトポリシーでステートメントを実行
    pub async fn execute(
        &self,
        request: &StatementRequest,
    ) -> Result<ExecutionResult, RemoteCallError> {
        self.execute_with(request, &self.policy).await
    }

    /// 指定ポリシーでステートメントを実行
    pub async fn execute_with(
        &self,
        request: &StatementRequest,
        policy: &RetryPolicy,
    ) -> Result<ExecutionResult, RemoteCallError> {
        self.execute_traced(request, policy).await.result
    }

    /// 指定ポリシーでステートメントを実行し、各試行の記録も返す
    ///
    /// 1. リクエストを検証（失敗時はリモート呼び出しなしで`InvalidRequest`）
    /// 2. 成功したら即座に返す
    /// 3. 恒久的エラーは`attempts = attempt + 1`で`Terminal`
    /// 4. 一時的エラーは`attempt`を進め、`max_attempts`に達したら`RetriesExhausted`
    /// 5. `min(max_delay, base_delay * 2^attempt)`（ジッター付き）待機して再試行
    pub async fn execute_traced(
        &self,
        request: &StatementRequest,
        policy: &RetryPolicy,
    ) -> TracedExecution {
        let mut outcomes = Vec::new();
        let result = self.run(request, policy, &mut outcomes).await;
        TracedExecution { outcomes, result }
    }

    async fn run(
        &self,
        request: &StatementRequest,
        policy: &RetryPolicy,
        outcomes: &mut Vec<AttemptOutcome>,
    ) -> Result<ExecutionResult, RemoteCallError> {
        if let Err(e) = request.validate() {
            warn!(error = %e, "ステートメントリクエストが不正");
            return Err(RemoteCallError::InvalidRequest(e));
        }

        let max_attempts = policy.max_attempts();
        let mut attempt: u32 = 0;
        let mut last_error: Option<StatementError> = None;

        loop {
            let attempt_number = attempt + 1;

            let call = self.client.execute_statement(request);
            let outcome = match self.deadline {
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        warn!(attempt = attempt_number, "呼び出し期限を超過");
                        return Err(RemoteCallError::DeadlineExceeded {
                            attempts: attempt,
                            last_error,
                        });
                    }
                    match tokio::time::timeout_at(deadline, call).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            warn!(attempt = attempt_number, "試行中に呼び出し期限を超過");
                            outcomes.push(AttemptOutcome {
                                attempt_number,
                                error: Some("deadline exceeded".to_string()),
                                next_delay: None,
                            });
                            return Err(RemoteCallError::DeadlineExceeded {
                                attempts: attempt_number,
                                last_error,
                            });
                        }
                    }
                }
                None => call.await,
            };

            let err = match outcome {
                Ok(result) => {
                    if attempt > 0 {
                        info!(attempt = attempt_number, "再試行後にステートメント実行成功");
                    } else {
                        debug!("ステートメント実行成功");
                    }
                    outcomes.push(AttemptOutcome {
                        attempt_number,
                        error: None,
                        next_delay: None,
                    });
                    return Ok(result);
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                error!(
                    attempt = attempt_number,
                    max_attempts,
                    error = %err,
                    "恒久的エラーのため再試行しません"
                );
                outcomes.push(AttemptOutcome {
                    attempt_number,
                    error: Some(err.to_string()),
                    next_delay: None,
                });
                return Err(RemoteCallError::Terminal {
                    attempts: attempt_number,
                    source: err,
                });
            }

            attempt += 1;
            if attempt >= max_attempts {
                error!(
                    attempt = attempt_number,
                    max_attempts,
                    error = %err,
                    "最大試行回数に到達"
                );
                outcomes.push(AttemptOutcome {
                    attempt_number,
                    error: Some(err.to_string()),
                    next_delay: None,
                });
                return Err(RemoteCallError::RetriesExhausted {
                    attempts: attempt,
                    last_error: err,
                });
            }

            let delay = policy.delay_for_attempt(attempt, &mut rand::thread_rng());

            if let Some(deadline) = self.deadline {
                if Instant::now() + delay >= deadline {
                    warn!(
                        attempt = attempt_number,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "待機が呼び出し期限を超えるため再試行を中止"
                    );
                    outcomes.push(AttemptOutcome {
                        attempt_number,
                        error: Some(err.to_string()),
                        next_delay: None,
                    });
                    return Err(RemoteCallError::DeadlineExceeded {
                        attempts: attempt,
                        last_error: Some(err),
                    });
                }
            }

            warn!(
                attempt = attempt_number,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                code = err.code.as_deref().unwrap_or("-"),
                error = %err,
                "一時的エラー、再試行します"
            );
            outcomes.push(AttemptOutcome {
                attempt_number,
                error: Some(err.to_string()),
                next_delay: Some(delay),
            });
            last_error = Some(err);

            tokio::time::sleep(delay).await;
        }
    }
}
