//! create サブコマンド — インスタンスの作成

use crate::commands::load_scenario;
use anyhow::Result;
use colored::Colorize;
use nacl_core::statedir;

pub async fn handle(scenario: &str) -> Result<()> {
    let config = load_scenario(scenario)?;
    let provider = nacl_provider::create_provider(&config).await?;

    // 作業ディレクトリを先に構築する（インスタンスへマウントされるため）
    statedir::prepare(&config)?;
    let names = provider.orchestrate().await?;

    println!(
        "\n{}",
        format!("✓ {} インスタンスを作成しました", names.len())
            .green()
            .bold()
    );
    for name in names {
        println!("  • {}", name.cyan());
    }
    Ok(())
}
