/// 1つの論理コンピュートノード
///
/// `attributes` にはプロバイダーのスキーマで宣言されたキーのみが
/// 正規化時にコピーされます（デフォルト値適用済み）。
#[derive(Debug, Clone)]
pub struct InstanceSpec {
    /// 論理名
    pub name: String,
    /// プロビジョニング名 `nacl_<formula>_<scenario>_<name>`
    ///
    /// シナリオ内で一意、かつ再実行しても変わりません
    /// （再作成ではなく再アタッチするための鍵）。
    pub prov_name: String,
    /// プロバイダー固有の属性
    pub attributes: serde_yaml::Mapping,
}

impl InstanceSpec {
    pub fn attr(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.attributes.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(|v| v.as_str())
    }

    pub fn attr_bool(&self, key: &str) -> Option<bool> {
        self.attr(key).and_then(|v| v.as_bool())
    }

    pub fn attr_seq(&self, key: &str) -> Option<&serde_yaml::Sequence> {
        self.attr(key).and_then(|v| v.as_sequence())
    }

    /// 文字列シーケンス属性を Vec<String> として取り出す
    pub fn attr_str_seq(&self, key: &str) -> Vec<String> {
        self.attr_seq(key)
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}
