// 感情推定スコア
//
// 推論モデルが返すロジットを8感情ラベルごとのシグモイドスコアに変換する。

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;

/// 感情ラベル（モデル出力の並び順）
pub const EMOTION_LABELS: [&str; 8] = [
    "joy",
    "sadness",
    "anticipation",
    "surprise",
    "anger",
    "fear",
    "disgust",
    "trust",
];

/// ロジット変換エラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmotionScoreError {
    /// ロジット数がラベル数と一致しない
    #[error("Expected {expected} logits, got {actual}")]
    LogitCountMismatch { expected: usize, actual: usize },
}

/// シグモイド関数
pub fn sigmoid(value: f64) -> f64 {
    1.0 / (1.0 + (-value).exp())
}

/// ラベルごとの感情スコア（0.0〜1.0）
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionScores {
    scores: Vec<(&'static str, f64)>,
}

impl EmotionScores {
    /// ロジットからスコアを作成
    pub fn from_logits(logits: &[f64]) -> Result<Self, EmotionScoreError> {
        if logits.len() != EMOTION_LABELS.len() {
            return Err(EmotionScoreError::LogitCountMismatch {
                expected: EMOTION_LABELS.len(),
                actual: logits.len(),
            });
        }

        let scores = EMOTION_LABELS
            .iter()
            .zip(logits)
            .map(|(label, logit)| (*label, sigmoid(*logit)))
            .collect();

        Ok(Self { scores })
    }

    /// ラベルのスコアを取得
    pub fn get(&self, label: &str) -> Option<f64> {
        self.scores
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, score)| *score)
    }

    /// ラベル順にスコアを走査
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.scores.iter().copied()
    }
}

impl Serialize for EmotionScores {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.scores.len()))?;
        for (label, score) in &self.scores {
            map.serialize_entry(label, score)?;
        }
        map.end()
    }
}
