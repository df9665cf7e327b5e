//! フェーズランナー
//!
//! シナリオのライフサイクルフェーズを設定された順に実行します。
//! 失敗時は方針に従ってクリーンアップし、短絡します。

pub mod criteria;
pub mod error;
pub mod runner;

pub use criteria::ConvergeCriteria;
pub use error::RunnerError;
pub use runner::ScenarioRunner;
