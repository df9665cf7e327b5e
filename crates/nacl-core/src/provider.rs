use crate::model::{ConvergeOutput, InventoryEntry};
use anyhow::Result;
use async_trait::async_trait;

/// プロバイダーアダプターのケーパビリティセット
///
/// バックエンドごと（コンテナ / VM）に実装され、レジストリ経由で
/// 設定に束縛されたインスタンスとして解決されます。呼び出し側を
/// 変えずに新しいバックエンドを追加できます。
#[async_trait]
pub trait Provider: Send + Sync {
    /// ベリファイアが接続URIに使うスキーム (docker / ssh など)
    fn connection_scheme(&self) -> &'static str;

    /// インスタンス群をプロビジョニングする
    ///
    /// 冪等です: 同じプロビジョニング名のリソースが既に存在する場合は
    /// 再作成せず再利用します。ブートストラップ失敗時は部分状態を
    /// 残したまま中断します（自己修復しません）。
    async fn orchestrate(&self) -> Result<Vec<String>>;

    /// 全ライブインスタンスへ状態を適用し、生出力を返す
    ///
    /// 状態適用コマンドの非ゼロ終了はここでは失敗とせず、
    /// 出力として返します。成否の判定はフェーズランナーの方針です。
    async fn converge(&self) -> Result<ConvergeOutput>;

    /// ライブなバックエンドからインベントリを導出する（キャッシュなし）
    async fn get_inventory(&self) -> Result<Vec<InventoryEntry>>;

    /// シナリオのラベルが付いた全リソースと一時状態を削除する
    ///
    /// 何も存在しない状態で呼んでもエラーになりません。
    async fn cleanup(&self) -> Result<()>;

    /// 指定インスタンスへ対話シェルを開く
    ///
    /// `host` が未指定でインスタンスが複数ある場合はエラーです。
    /// 曖昧なターゲットを暗黙に解決することはありません。
    async fn login(&self, host: Option<&str>) -> Result<()>;
}
