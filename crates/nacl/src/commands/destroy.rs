//! destroy サブコマンド — インスタンスと一時状態の破棄

use crate::commands::load_scenario;
use anyhow::Result;
use colored::Colorize;

pub async fn handle(scenario: &str) -> Result<()> {
    let config = load_scenario(scenario)?;
    let provider = nacl_provider::create_provider(&config).await?;
    provider.cleanup().await?;
    println!(
        "{}",
        format!("✓ シナリオ '{}' を破棄しました", scenario)
            .green()
            .bold()
    );
    Ok(())
}
