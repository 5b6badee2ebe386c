// リトライポリシー
//
// 一時的な障害に対する再試行回数と指数バックオフの上下限を保持する。
// 構築後は不変で、環境変数からの読み込みとデフォルト値を提供する。

use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

// ===========================================
// デフォルト値定義
// ===========================================

/// 最大試行回数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// バックオフの基準遅延（ミリ秒）
pub const DEFAULT_BASE_DELAY_MS: u64 = 2000;

/// バックオフの最大遅延（ミリ秒）
pub const DEFAULT_MAX_DELAY_MS: u64 = 30000;

/// ジッターを有効にするか
pub const DEFAULT_JITTER: bool = true;

// ===========================================
// 環境変数名定義
// ===========================================

/// 環境変数名: max_attempts
pub const ENV_MAX_ATTEMPTS: &str = "RETRY_MAX_ATTEMPTS";

/// 環境変数名: base_delay
pub const ENV_BASE_DELAY_MS: &str = "RETRY_BASE_DELAY_MS";

/// 環境変数名: max_delay
pub const ENV_MAX_DELAY_MS: &str = "RETRY_MAX_DELAY_MS";

/// 環境変数名: jitter
pub const ENV_JITTER: &str = "RETRY_JITTER";

/// リトライポリシー構築エラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetryPolicyError {
    /// 最大試行回数が0
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
}

/// リトライポリシー
///
/// `max_attempts`は最初の試行を含む総試行回数で、常に1以上。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            jitter: DEFAULT_JITTER,
        }
    }
}

impl RetryPolicy {
    /// 新しいポリシーを作成
    ///
    /// # Errors
    /// `max_attempts`が0の場合は`RetryPolicyError::ZeroAttempts`
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        jitter: bool,
    ) -> Result<Self, RetryPolicyError> {
        if max_attempts == 0 {
            return Err(RetryPolicyError::ZeroAttempts);
        }
        Ok(Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter,
        })
    }

    /// 最大試行回数
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 基準遅延
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// 最大遅延
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// ジッターが有効か
    pub fn jitter(&self) -> bool {
        self.jitter
    }

    /// ジッター適用前のバックオフ遅延
    ///
    /// `min(max_delay, base_delay * 2^attempt)`。オーバーフロー時は`max_delay`。
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// 再試行前に待機する遅延
    ///
    /// ジッター有効時は`[d/2, d]`から一様に選ぶ（`d = backoff_delay(attempt)`）。
    pub fn delay_for_attempt<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let delay = self.backoff_delay(attempt);
        if !self.jitter {
            return delay;
        }

        let upper = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        let lower = upper / 2;
        Duration::from_nanos(rng.gen_range(lower..=upper))
    }

    /// 環境変数から設定を読み込み
    ///
    /// 未設定またはパースエラーの場合はデフォルト値を使用する。
    /// `RETRY_MAX_ATTEMPTS=0`もパースエラーとして扱う。
    ///
    /// # 環境変数
    /// - RETRY_MAX_ATTEMPTS: 最大試行回数
    /// - RETRY_BASE_DELAY_MS: 基準遅延（ミリ秒）
    /// - RETRY_MAX_DELAY_MS: 最大遅延（ミリ秒）
    /// - RETRY_JITTER: ジッター有効/無効（true/false/1/0）
    pub fn from_env() -> Self {
        let max_attempts = parse_env(ENV_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS, |v| {
            v.parse::<u32>().ok().filter(|n| *n >= 1)
        });
        let base_delay_ms = parse_env(ENV_BASE_DELAY_MS, DEFAULT_BASE_DELAY_MS, |v| {
            v.parse::<u64>().ok()
        });
        let max_delay_ms = parse_env(ENV_MAX_DELAY_MS, DEFAULT_MAX_DELAY_MS, |v| {
            v.parse::<u64>().ok()
        });
        let jitter = parse_env(ENV_JITTER, DEFAULT_JITTER, parse_bool);

        info!(
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            jitter,
            "RetryPolicy loaded"
        );

        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            jitter,
        }
    }
}

/// 環境変数を読み込んでパースする
///
/// 未設定の場合はデフォルト値、パースできない場合は警告を出してデフォルト値を返す。
fn parse_env<T, F>(key: &str, default: T, parse: F) -> T
where
    T: std::fmt::Debug,
    F: Fn(&str) -> Option<T>,
{
    match std::env::var(key) {
        Ok(value) => match parse(value.trim()) {
            Some(parsed) => parsed,
            None => {
                warn!(
                    key,
                    value = %value,
                    default = ?default,
                    "Environment variable parse error, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
