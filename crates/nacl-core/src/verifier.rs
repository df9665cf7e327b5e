use crate::model::{InventoryEntry, ScenarioConfig};
use anyhow::Result;
use async_trait::async_trait;

/// ベリファイアのケーパビリティ
///
/// プロバイダーのインベントリから接続URIを組み立て、外部の検証ツールを
/// シナリオのテストディレクトリに対して実行します。
#[async_trait]
pub trait Verifier: Send + Sync + std::fmt::Debug {
    /// 検証を実行し、終了コードを返す
    ///
    /// 非ゼロはシナリオ失敗としてそのまま伝播します。
    async fn run(&self, config: &ScenarioConfig, inventory: &[InventoryEntry]) -> Result<i32>;
}
