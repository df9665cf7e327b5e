//! sync サブコマンド — フォーミュラの再同期
//!
//! インスタンスを作り直さずに編集中のフォーミュラを
//! 作業ディレクトリへ反映します。

use crate::commands::load_scenario;
use anyhow::Result;
use colored::Colorize;
use nacl_core::statedir;

pub fn handle(scenario: &str) -> Result<()> {
    let config = load_scenario(scenario)?;
    statedir::sync(&config)?;
    println!(
        "{}",
        format!(
            "✓ フォーミュラを同期しました: {}",
            config.state_root.display()
        )
        .green()
    );
    Ok(())
}
