//! シナリオの自動発見
//!
//! 規約ベースのディレクトリ構造 (`<フォーミュラルート>/nacl/<scenario>/nacl.yml`)
//! からシナリオ記述ファイルを発見します。

use crate::error::{ConfigError, Result};
use serde_yaml::Mapping;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 記述ファイルの規約名
pub const DESCRIPTOR_FILE: &str = "nacl.yml";

/// プロジェクトルート（フォーミュラのルート）を検出する
///
/// カレントディレクトリから上に向かって `nacl/` ディレクトリを
/// 含むディレクトリを探します。
pub fn find_project_root() -> Result<PathBuf> {
    let start_dir = std::env::current_dir()?;
    let mut current = start_dir.clone();

    loop {
        debug!(checking = %current.display(), "nacl/ を探索中");
        if current.join("nacl").is_dir() {
            return Ok(current);
        }
        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Err(ConfigError::ProjectRootNotFound(start_dir)),
        }
    }
}

/// シナリオ記述ファイルのパス
pub fn descriptor_path(root: &Path, scenario: &str) -> PathBuf {
    root.join("nacl").join(scenario).join(DESCRIPTOR_FILE)
}

/// 定義済みシナリオの一覧（名前順）
pub fn list_scenarios(root: &Path) -> Result<Vec<String>> {
    let mut scenarios = Vec::new();
    for entry in fs::read_dir(root.join("nacl"))? {
        let entry = entry?;
        if entry.file_type()?.is_dir()
            && entry.path().join(DESCRIPTOR_FILE).is_file()
            && let Some(name) = entry.file_name().to_str()
        {
            scenarios.push(name.to_string());
        }
    }
    scenarios.sort();
    Ok(scenarios)
}

/// 記述ファイルを読み込み、生のマッピングとして返す
pub fn load_descriptor(root: &Path, scenario: &str) -> Result<Mapping> {
    let path = descriptor_path(root, scenario);
    if !path.is_file() {
        return Err(ConfigError::DescriptorNotFound(scenario.to_string()));
    }
    let content = fs::read_to_string(&path)?;
    Ok(serde_yaml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaffold(root: &Path, scenario: &str, content: &str) {
        let dir = root.join("nacl").join(scenario);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(DESCRIPTOR_FILE), content).unwrap();
    }

    #[test]
    fn test_list_scenarios_sorted() {
        let root = tempfile::tempdir().unwrap();
        scaffold(root.path(), "upgrade", "scenario: upgrade");
        scaffold(root.path(), "default", "scenario: default");
        // 記述ファイルのないディレクトリは無視される
        fs::create_dir_all(root.path().join("nacl/empty")).unwrap();

        let scenarios = list_scenarios(root.path()).unwrap();
        assert_eq!(scenarios, vec!["default", "upgrade"]);
    }

    #[test]
    fn test_load_descriptor_missing() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("nacl")).unwrap();
        let err = load_descriptor(root.path(), "default").unwrap_err();
        assert!(matches!(err, ConfigError::DescriptorNotFound(name) if name == "default"));
    }

    #[test]
    fn test_load_descriptor_ok() {
        let root = tempfile::tempdir().unwrap();
        scaffold(root.path(), "default", "formula: nacl-test");
        let raw = load_descriptor(root.path(), "default").unwrap();
        assert_eq!(raw.get("formula").unwrap().as_str(), Some("nacl-test"));
    }
}
