//! converge 出力の成否判定
//!
//! 状態適用の結果サマリーをパターンマッチで判定します。
//! バックエンドによって出力形式が揺れるため、失敗と変更の
//! 2つの判定は独立した正規表現として差し替え可能です。

use regex::Regex;

/// 既定の失敗判定パターン（結果サマリーの失敗カウントが非ゼロ）
pub const DEFAULT_FAILURE_PATTERN: &str = r"Failed:\s*[1-9]";

/// 既定の変更判定パターン（冪等性チェックで使用）
pub const DEFAULT_CHANGES_PATTERN: &str = r"changed=[1-9]";

#[derive(Debug, Clone)]
pub struct ConvergeCriteria {
    failure: Regex,
    changes: Regex,
}

impl ConvergeCriteria {
    pub fn new(failure: &str, changes: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            failure: Regex::new(failure)?,
            changes: Regex::new(changes)?,
        })
    }

    /// 状態適用が失敗したか
    pub fn is_failure(&self, output: &str) -> bool {
        self.failure.is_match(output)
    }

    /// 再適用で変更が発生したか（冪等性違反）
    pub fn has_changes(&self, output: &str) -> bool {
        self.changes.is_match(output)
    }
}

impl Default for ConvergeCriteria {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_PATTERN, DEFAULT_CHANGES_PATTERN)
            .expect("既定のパターンは有効")
    }
}
