//! verify サブコマンド — 検証のみ

use crate::commands::load_scenario;
use anyhow::Result;
use nacl_runner::RunnerError;

pub async fn handle(scenario: &str) -> Result<()> {
    let config = load_scenario(scenario)?;
    let provider = nacl_provider::create_provider(&config).await?;
    let verifier = nacl_verifier::create_verifier(&config.verifier)?;

    let inventory = provider.get_inventory().await?;
    let code = verifier.run(&config, &inventory).await?;
    if code != 0 {
        return Err(RunnerError::VerifyFailed(code).into());
    }
    Ok(())
}
