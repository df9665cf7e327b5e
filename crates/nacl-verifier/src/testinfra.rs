//! testinfra ベリファイア
//!
//! プロバイダーのインベントリから `--hosts` 引数を組み立て、
//! シナリオのテストディレクトリに対して py.test を実行します。

use anyhow::Result;
use async_trait::async_trait;
use colored::Colorize;
use nacl_core::model::{InstanceState, InventoryEntry, ScenarioConfig};
use nacl_core::Verifier;

#[derive(Debug)]
pub struct Testinfra;

/// 生存しているインスタンスの接続URIをカンマ区切りで連結する
///
/// 未作成のインスタンスは検証対象から外れます。
pub fn hosts_arg(inventory: &[InventoryEntry]) -> String {
    inventory
        .iter()
        .filter(|entry| entry.state != InstanceState::NotCreated)
        .map(|entry| entry.endpoint.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl Verifier for Testinfra {
    async fn run(&self, config: &ScenarioConfig, inventory: &[InventoryEntry]) -> Result<i32> {
        let hosts = hosts_arg(inventory);
        if hosts.is_empty() {
            println!("{}", "⚠ 検証対象のインスタンスがありません".yellow());
            return Ok(0);
        }

        let tests_dir = config.tests_dir();
        println!(
            "{}",
            format!("▶ testinfra を実行中: {}", tests_dir.display())
                .green()
                .bold()
        );
        tracing::debug!(hosts, "py.test を起動");

        // 出力はそのまま端末へ流す
        let status = tokio::process::Command::new("py.test")
            .arg(format!("--hosts={hosts}"))
            .arg(&tests_dir)
            .status()
            .await?;
        Ok(status.code().unwrap_or(-1))
    }
}
