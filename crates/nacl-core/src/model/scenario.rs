use crate::error::ConfigError;
use crate::model::{InstanceSpec, Phase};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

/// リモート実行モード
///
/// converge がインスタンスへ状態を適用する方法を決定します。
/// `SaltMaster` は各インスタンス内で直接 `salt-call` を実行し、
/// `SaltSsh` はホストを制御ノードとして `salt-ssh` で一括適用します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    SaltSsh,
    SaltMaster,
}

impl FromStr for ExecMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "salt-ssh" => Ok(ExecMode::SaltSsh),
            "salt-master" => Ok(ExecMode::SaltMaster),
            other => Err(ConfigError::InvalidExecMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for ExecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecMode::SaltSsh => write!(f, "salt-ssh"),
            ExecMode::SaltMaster => write!(f, "salt-master"),
        }
    }
}

/// 正規化済みのシナリオ設定
///
/// ユーザーが記述した nacl.yml を検証・展開した結果です。
/// 正規化後は変更されず、ランナーが所有し各コンポーネントへ
/// 参照で渡されます。1回の実行につき1つだけ存在します。
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// テスト対象のフォーミュラ名
    pub formula: String,
    /// シナリオ名
    pub scenario: String,
    /// プロバイダー識別子 (docker / vagrant)
    pub provider: String,
    /// ベリファイア識別子 (testinfra)
    pub verifier: String,
    /// インスタンス定義（順序保持）
    pub instances: Vec<InstanceSpec>,
    /// 実行するフェーズのリスト（省略時は既定の順序）
    pub phases: Vec<Phase>,
    /// インスタンス名 → grains マップ
    pub grains: HashMap<String, serde_yaml::Mapping>,
    /// 追加の file_roots（ホスト側パス）
    pub extra_file_roots: Vec<PathBuf>,
    /// Salt のルート設定（minion/master 設定へマージされる）
    pub master_config: serde_yaml::Mapping,
    /// リモート実行モード
    pub exec_mode: ExecMode,
    /// シナリオごとの一時状態ディレクトリ
    pub state_root: PathBuf,
    /// フォーミュラのソースディレクトリ（プロジェクトルート）
    pub formula_path: PathBuf,
}

impl ScenarioConfig {
    /// シナリオのネットワーク名（プロバイダーの分離境界）
    pub fn network_name(&self) -> String {
        format!("nacl_{}_{}", self.formula, self.scenario)
    }

    /// シナリオのテストディレクトリ (nacl/<scenario>/tests/)
    pub fn tests_dir(&self) -> PathBuf {
        self.formula_path
            .join("nacl")
            .join(&self.scenario)
            .join("tests")
    }

    /// 論理名からインスタンスを引く
    pub fn instance(&self, name: &str) -> Option<&InstanceSpec> {
        self.instances.iter().find(|i| i.name == name)
    }
}
