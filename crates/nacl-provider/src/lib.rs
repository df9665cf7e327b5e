//! プロバイダーアダプター
//!
//! インスタンスのライフサイクル（プロビジョニング、状態適用、
//! インベントリ、ログイン、破棄）をバックエンドごとに実装します。
//! 現在はコンテナベース (Docker) と VM ベース (Vagrant) の2種類です。

pub mod converter;
pub mod docker;
pub mod error;
pub mod exec;
pub mod registry;
pub mod vagrant;

pub use converter::*;
pub use docker::DockerProvider;
pub use error::{ProviderError, Result};
pub use registry::{create_provider, instance_schema};
pub use vagrant::VagrantProvider;
