//! nacl のコア機能
//!
//! シナリオ設定のスキーマ検証・正規化、プロバイダー/ベリファイアの
//! ケーパビリティトレイト、一時状態ディレクトリの管理を提供します。

pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod provider;
pub mod schema;
pub mod statedir;
pub mod verifier;

pub use config::{normalize, provisioned_name, validate};
pub use discovery::{descriptor_path, find_project_root, list_scenarios, load_descriptor};
pub use error::{ConfigError, Result};
pub use model::*;
pub use provider::Provider;
pub use schema::{
    DefaultValue, FieldSpec, Kind, TOP_SCHEMA, apply_defaults, validate_against,
    validate_instance,
};
pub use verifier::Verifier;
