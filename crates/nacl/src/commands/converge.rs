//! converge サブコマンド — 状態適用のみ

use crate::commands::load_scenario;
use anyhow::Result;
use colored::Colorize;
use nacl_runner::{ConvergeCriteria, RunnerError};

pub async fn handle(scenario: &str) -> Result<()> {
    let config = load_scenario(scenario)?;
    let provider = nacl_provider::create_provider(&config).await?;
    let criteria = ConvergeCriteria::default();

    let outputs = provider.converge().await?;
    if outputs.is_empty() {
        println!("{}", "⚠ 稼働中のインスタンスがありません".yellow());
        println!("ヒント: 先に `nacl create -s {}` を実行してください", scenario);
        return Ok(());
    }

    for (instance, output) in &outputs {
        if criteria.is_failure(output) {
            return Err(RunnerError::ConvergeFailed {
                instance: instance.clone(),
            }
            .into());
        }
        println!("{}", format!("✓ {}", instance).green());
    }
    Ok(())
}
