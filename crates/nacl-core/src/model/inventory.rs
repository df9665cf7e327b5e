use std::collections::BTreeMap;

/// インスタンスのライフサイクル状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// バックエンドにリソースが存在しない
    NotCreated,
    /// リソースは存在するが prepare 未完了
    Created,
    /// prepare の完了マーカーが存在する
    Prepared,
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceState::NotCreated => write!(f, "not created"),
            InstanceState::Created => write!(f, "created"),
            InstanceState::Prepared => write!(f, "prepared"),
        }
    }
}

/// インベントリエントリ
///
/// バックエンドへの問い合わせ結果から毎回導出され、キャッシュされません。
/// `endpoint` はベリファイアがそのまま使える接続URIです
/// (例: `docker://nacl_formula_default_box1`)。
#[derive(Debug, Clone)]
pub struct InventoryEntry {
    /// 論理名
    pub name: String,
    /// 接続URI
    pub endpoint: String,
    /// ライフサイクル状態
    pub state: InstanceState,
}

/// converge の生出力（インスタンス名 → テキスト）
///
/// 冪等性チェックが一時的に消費するだけで、永続化されません。
pub type ConvergeOutput = BTreeMap<String, String>;
