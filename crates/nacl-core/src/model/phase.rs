/// ライフサイクルフェーズ
///
/// ランナーはこのリストを設定された順に1つずつ実行します。
/// 不明な名前はパース時にエラーとせず `Unknown` として保持し、
/// 実行時にランナーが失敗として報告します。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Destroy,
    Lint,
    Create,
    Prepare,
    Converge,
    Idempotence,
    Verify,
    Unknown(String),
}

impl Phase {
    pub fn parse(name: &str) -> Phase {
        match name {
            "destroy" => Phase::Destroy,
            "lint" => Phase::Lint,
            "create" => Phase::Create,
            "prepare" => Phase::Prepare,
            "converge" => Phase::Converge,
            "idempotence" => Phase::Idempotence,
            "verify" => Phase::Verify,
            other => Phase::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Destroy => write!(f, "destroy"),
            Phase::Lint => write!(f, "lint"),
            Phase::Create => write!(f, "create"),
            Phase::Prepare => write!(f, "prepare"),
            Phase::Converge => write!(f, "converge"),
            Phase::Idempotence => write!(f, "idempotence"),
            Phase::Verify => write!(f, "verify"),
            Phase::Unknown(name) => write!(f, "{}", name),
        }
    }
}

/// 既定のフェーズ順
pub fn default_phases() -> Vec<Phase> {
    vec![
        Phase::Destroy,
        Phase::Lint,
        Phase::Create,
        Phase::Prepare,
        Phase::Converge,
        Phase::Idempotence,
        Phase::Verify,
    ]
}
