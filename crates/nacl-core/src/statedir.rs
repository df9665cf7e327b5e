//! 一時状態ディレクトリの管理
//!
//! シナリオごとの作業ディレクトリを構築します。フォーミュラのコピー、
//! 生成された Salt 設定、prepare の完了マーカーがここに置かれ、
//! ディレクトリ全体が各インスタンスへ読み書き可能でマウントされます。
//!
//! ルートパスは環境変数からではなく [`ScenarioConfig`] 経由で
//! 明示的に引き回されます。

use crate::error::Result;
use crate::model::ScenarioConfig;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// インスタンス内でのマウント先
pub const GUEST_MOUNT: &str = "/srv/nacl";

/// 追加 file_roots のマウント先プレフィックス
pub const GUEST_EXTRA_MOUNT: &str = "/srv/nacl/extra";

/// ユーザーごとの一時状態ルート
pub fn default_state_root() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::cache_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join("nacl")
}

/// シナリオの一時状態ディレクトリ
pub fn scenario_state_root(formula: &str, scenario: &str) -> PathBuf {
    default_state_root().join(formula).join(scenario)
}

/// prepare 完了マーカーのパス
pub fn marker_path(config: &ScenarioConfig, instance: &str) -> PathBuf {
    config.state_root.join(format!("prepared_{instance}"))
}

/// インスタンス内から見た file_roots (base)
pub fn guest_file_roots(config: &ScenarioConfig) -> Vec<String> {
    let mut roots = vec![format!("{GUEST_MOUNT}/formulas")];
    for (index, _) in config.extra_file_roots.iter().enumerate() {
        roots.push(format!("{GUEST_EXTRA_MOUNT}/{index}"));
    }
    roots
}

/// フォーミュラソースを状態ディレクトリへコピーする
pub fn sync(config: &ScenarioConfig) -> Result<()> {
    let dest = config.state_root.join("formulas").join(&config.formula);
    fs::create_dir_all(&dest)?;
    copy_dir(&config.formula_path, &dest)?;
    tracing::debug!("formula synced: {}", dest.display());
    Ok(())
}

/// シナリオの作業ディレクトリを構築する
///
/// フォーミュラのコピー、top.sls、minion/master 設定、grains を生成し、
/// 各インスタンスの完了マーカーを書き込みます。再実行しても安全です。
pub fn prepare(config: &ScenarioConfig) -> Result<()> {
    fs::create_dir_all(&config.state_root)?;
    sync(config)?;

    // top.sls — 全インスタンスにフォーミュラを適用する
    let top = format!("base:\n  '*':\n    - {}\n", config.formula);
    fs::write(config.state_root.join("formulas").join("top.sls"), top)?;

    // minion / master 設定 — master_config に file_roots をマージして生成
    let salt_dir = config.state_root.join("etc").join("salt");
    fs::create_dir_all(&salt_dir)?;
    let rendered = serde_yaml::to_string(&render_salt_config(config))?;
    fs::write(salt_dir.join("minion"), &rendered)?;
    fs::write(salt_dir.join("master"), &rendered)?;

    // インスタンスごとの grains
    let grains_dir = config.state_root.join("grains");
    fs::create_dir_all(&grains_dir)?;
    for instance in &config.instances {
        if let Some(grains) = config.grains.get(&instance.name) {
            fs::write(
                grains_dir.join(format!("{}.yml", instance.name)),
                serde_yaml::to_string(grains)?,
            )?;
        }
    }

    // 完了マーカー — インベントリが Prepared を導出する根拠
    for instance in &config.instances {
        fs::write(marker_path(config, &instance.name), b"")?;
    }
    Ok(())
}

/// シナリオの一時状態を削除する（存在しなければ何もしない）
pub fn remove(config: &ScenarioConfig) -> Result<()> {
    if config.state_root.exists() {
        fs::remove_dir_all(&config.state_root)?;
    }
    Ok(())
}

/// master_config に file_roots を重ねた Salt 設定を組み立てる
fn render_salt_config(config: &ScenarioConfig) -> Mapping {
    let mut rendered = config.master_config.clone();
    let mut base = Mapping::new();
    base.insert(
        Value::String("base".to_string()),
        Value::Sequence(
            guest_file_roots(config)
                .into_iter()
                .map(Value::String)
                .collect(),
        ),
    );
    rendered.insert(
        Value::String("file_roots".to_string()),
        Value::Mapping(base),
    );
    rendered
}

fn copy_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        // VCSメタデータは持ち込まない
        if name == ".git" {
            continue;
        }
        let target = dest.join(&name);
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&target)?;
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecMode, InstanceSpec, default_phases};
    use std::collections::HashMap;

    fn test_config(state_root: PathBuf, formula_path: PathBuf) -> ScenarioConfig {
        let mut grains = HashMap::new();
        grains.insert(
            "box1".to_string(),
            serde_yaml::from_str("role: webserver").unwrap(),
        );
        ScenarioConfig {
            formula: "nacl-test".to_string(),
            scenario: "default".to_string(),
            provider: "docker".to_string(),
            verifier: "testinfra".to_string(),
            instances: vec![
                InstanceSpec {
                    name: "box1".to_string(),
                    prov_name: "nacl_nacl-test_default_box1".to_string(),
                    attributes: Mapping::new(),
                },
                InstanceSpec {
                    name: "box2".to_string(),
                    prov_name: "nacl_nacl-test_default_box2".to_string(),
                    attributes: Mapping::new(),
                },
            ],
            phases: default_phases(),
            grains,
            extra_file_roots: vec![],
            master_config: serde_yaml::from_str("state_verbose: false").unwrap(),
            exec_mode: ExecMode::SaltMaster,
            state_root,
            formula_path,
        }
    }

    #[test]
    fn test_prepare_builds_state_dir() {
        let state = tempfile::tempdir().unwrap();
        let formula = tempfile::tempdir().unwrap();
        fs::write(formula.path().join("init.sls"), "pkg.installed: []").unwrap();

        let config = test_config(state.path().to_path_buf(), formula.path().to_path_buf());
        prepare(&config).unwrap();

        // フォーミュラがコピーされる
        assert!(
            state
                .path()
                .join("formulas/nacl-test/init.sls")
                .exists()
        );
        // top.sls がフォーミュラを適用する
        let top = fs::read_to_string(state.path().join("formulas/top.sls")).unwrap();
        assert!(top.contains("- nacl-test"));
        // マーカーが全インスタンス分できる
        assert!(marker_path(&config, "box1").exists());
        assert!(marker_path(&config, "box2").exists());
        // grains は定義のあるインスタンスのみ
        assert!(state.path().join("grains/box1.yml").exists());
        assert!(!state.path().join("grains/box2.yml").exists());
    }

    #[test]
    fn test_prepare_merges_master_config() {
        let state = tempfile::tempdir().unwrap();
        let formula = tempfile::tempdir().unwrap();
        let config = test_config(state.path().to_path_buf(), formula.path().to_path_buf());
        prepare(&config).unwrap();

        let minion: Mapping = serde_yaml::from_str(
            &fs::read_to_string(state.path().join("etc/salt/minion")).unwrap(),
        )
        .unwrap();
        // ユーザー設定が引き継がれる
        assert_eq!(minion.get("state_verbose").unwrap().as_bool(), Some(false));
        // file_roots はマウント先を指す
        let base = minion
            .get("file_roots")
            .and_then(|v| v.as_mapping())
            .and_then(|m| m.get("base"))
            .and_then(|v| v.as_sequence())
            .unwrap();
        assert_eq!(base[0].as_str(), Some("/srv/nacl/formulas"));
    }

    #[test]
    fn test_guest_file_roots_with_extras() {
        let mut config = test_config(PathBuf::from("/tmp/x"), PathBuf::from("/tmp/y"));
        config.extra_file_roots = vec![PathBuf::from("/srv/pillar-extra")];
        assert_eq!(
            guest_file_roots(&config),
            vec![
                "/srv/nacl/formulas".to_string(),
                "/srv/nacl/extra/0".to_string()
            ]
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let state = tempfile::tempdir().unwrap();
        let scenario_dir = state.path().join("gone");
        let config = test_config(scenario_dir, PathBuf::from("/nonexistent"));
        // 存在しない状態で呼んでもエラーにならない
        remove(&config).unwrap();
        remove(&config).unwrap();
    }
}
