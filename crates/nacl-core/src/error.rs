use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("必須キー '{0}' がありません")]
    MissingKey(String),

    #[error("キー '{key}' の型が不正です: \"{actual}\" (期待: {expected})")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("インスタンス '{instance}' に必須キー '{key}' がありません")]
    MissingInstanceKey { instance: String, key: String },

    #[error(
        "インスタンス '{instance}' のキー '{key}' の型が不正です: \"{actual}\" (期待: {expected})"
    )]
    InstanceTypeMismatch {
        instance: String,
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("インスタンス名 '{0}' が重複しています")]
    DuplicateInstance(String),

    #[error("不明なプロバイダーです: '{0}' (利用可能: docker, vagrant)")]
    UnknownProvider(String),

    #[error("不明なベリファイアです: '{0}' (利用可能: testinfra)")]
    UnknownVerifier(String),

    #[error("salt_exec_mode が不正です: '{0}' (salt-ssh / salt-master のいずれか)")]
    InvalidExecMode(String),

    #[error(
        "シナリオ '{0}' の記述ファイルが見つかりません\nヒント: nacl/<scenario>/nacl.yml を作成してください"
    )]
    DescriptorNotFound(String),

    #[error(
        "プロジェクトルートが見つかりません\n探索開始位置: {0}\nヒント: nacl/ ディレクトリを含むフォーミュラのルートで実行してください"
    )]
    ProjectRootNotFound(PathBuf),

    #[error("YAMLパースエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
