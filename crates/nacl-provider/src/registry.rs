//! プロバイダーの登録と解決

use crate::docker::DockerProvider;
use crate::vagrant::VagrantProvider;
use nacl_core::error::ConfigError;
use nacl_core::schema::FieldSpec;
use nacl_core::{Provider, ScenarioConfig};

/// プロバイダーIDからインスタンス属性スキーマを解決する
///
/// 設定の検証はプロビジョニングより前に行うため、
/// この関数はプロバイダーの生成とは独立しています。
pub fn instance_schema(provider: &str) -> Result<&'static [FieldSpec], ConfigError> {
    match provider {
        "docker" => Ok(DockerProvider::schema()),
        "vagrant" => Ok(VagrantProvider::schema()),
        other => Err(ConfigError::UnknownProvider(other.to_string())),
    }
}

/// 設定に束縛されたプロバイダーを生成する
pub async fn create_provider(config: &ScenarioConfig) -> anyhow::Result<Box<dyn Provider>> {
    match config.provider.as_str() {
        "docker" => Ok(Box::new(DockerProvider::connect(config).await?)),
        "vagrant" => Ok(Box::new(VagrantProvider::new(config))),
        other => Err(ConfigError::UnknownProvider(other.to_string()).into()),
    }
}
