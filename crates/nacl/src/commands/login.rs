//! login サブコマンド — インスタンスへの対話シェル

use crate::commands::load_scenario;
use anyhow::Result;

pub async fn handle(scenario: &str, host: Option<&str>) -> Result<()> {
    let config = load_scenario(scenario)?;
    let provider = nacl_provider::create_provider(&config).await?;
    provider.login(host).await
}
