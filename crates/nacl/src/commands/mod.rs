pub mod converge;
pub mod create;
pub mod destroy;
pub mod init;
pub mod login;
pub mod sync;
pub mod verify;

use anyhow::Result;
use nacl_core::{ConfigError, ScenarioConfig, statedir};
use serde_yaml::Value;

/// シナリオ記述ファイルを読み込み、正規化済み設定を返す
///
/// プロバイダーのスキーマ解決を含むため、ここを通った設定は
/// バックエンドに触れる前に完全に検証されています。
pub fn load_scenario(scenario: &str) -> Result<ScenarioConfig> {
    let root = nacl_core::find_project_root()?;
    let raw = nacl_core::load_descriptor(&root, scenario)?;

    let provider = raw
        .get("provider")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::MissingKey("provider".to_string()))?;
    let schema = nacl_provider::instance_schema(provider)?;

    let formula = raw
        .get("formula")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::MissingKey("formula".to_string()))?;
    let state_root = statedir::scenario_state_root(formula, scenario);

    Ok(nacl_core::normalize(&raw, schema, state_root, root)?)
}
