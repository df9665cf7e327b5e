use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("lint が失敗しました (終了コード {0})")]
    LintFailed(i32),

    #[error("インスタンス '{instance}' の状態適用が失敗しました")]
    ConvergeFailed { instance: String },

    #[error("インスタンス '{instance}' の再適用で変更が発生しました（冪等性違反）")]
    NotIdempotent { instance: String },

    #[error("検証が失敗しました (終了コード {0})")]
    VerifyFailed(i32),

    #[error("不明なフェーズです: '{0}'")]
    UnknownPhase(String),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl RunnerError {
    /// プロセス終了コードへの対応付け
    ///
    /// 外部ツールの失敗はそのツールの終了コードをそのまま使います。
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerError::LintFailed(code) | RunnerError::VerifyFailed(code) => *code,
            _ => 1,
        }
    }
}
