//! init サブコマンド — シナリオ雛形の生成

use crate::templates;
use anyhow::{Result, bail};
use colored::Colorize;
use nacl_core::{ConfigError, discovery};
use std::fs;

pub fn handle(scenario: &str) -> Result<()> {
    // 既存プロジェクトならそのルートへ、なければカレントに新規作成
    let root = match nacl_core::find_project_root() {
        Ok(root) => root,
        Err(ConfigError::ProjectRootNotFound(_)) => std::env::current_dir()?,
        Err(e) => return Err(e.into()),
    };

    let scenario_dir = root.join("nacl").join(scenario);
    if scenario_dir.join(discovery::DESCRIPTOR_FILE).exists() {
        bail!("シナリオ '{scenario}' は既に存在します: {}", scenario_dir.display());
    }

    let formula = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("formula")
        .to_string();

    fs::create_dir_all(scenario_dir.join("tests"))?;
    fs::write(
        scenario_dir.join(discovery::DESCRIPTOR_FILE),
        templates::descriptor(&formula, scenario),
    )?;
    fs::write(
        scenario_dir.join("tests").join("test_default.py"),
        templates::TEST_TEMPLATE,
    )?;

    println!(
        "{}",
        format!("✓ シナリオ '{}' を作成しました", scenario)
            .green()
            .bold()
    );
    println!("  {}", scenario_dir.join(discovery::DESCRIPTOR_FILE).display());
    println!("  {}", scenario_dir.join("tests/test_default.py").display());
    println!("\n次のコマンドでテストを実行できます:");
    println!("  {} test -s {}", "nacl".cyan(), scenario);
    Ok(())
}
