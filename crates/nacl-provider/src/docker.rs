//! Docker プロバイダー
//!
//! シナリオのインスタンスをコンテナとしてプロビジョニングします。
//! すべてのリソースにフォーミュラ+シナリオのラベルを付け、
//! クリーンアップとインベントリはラベルだけでフィルタします。

// Bollard 0.19 の非推奨APIを一時的に使用
#![allow(deprecated)]

use crate::converter::{
    DOCKER_SCHEMA, derived_image_tag, instance_image, instance_to_container_config, label_filters,
    parse_image_tag, scenario_labels,
};
use crate::error::{ProviderError, Result};
use crate::exec::{self, DirectExec, RosterEntry, SaltSshExec};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::InspectContainerOptions;
use colored::Colorize;
use futures_util::stream::StreamExt;
use nacl_core::model::{ConvergeOutput, ExecMode, InstanceSpec, InstanceState, InventoryEntry};
use nacl_core::{Provider, ScenarioConfig, statedir};
use std::collections::{HashMap, HashSet};

pub struct DockerProvider {
    docker: Docker,
    config: ScenarioConfig,
}

impl DockerProvider {
    /// インスタンス属性のスキーマ
    pub fn schema() -> &'static [nacl_core::FieldSpec] {
        DOCKER_SCHEMA
    }

    /// Docker へ接続し、設定に束縛されたアダプターを返す
    pub async fn connect(config: &ScenarioConfig) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| ProviderError::DockerConnectionFailed(e.to_string()))?;
        docker
            .ping()
            .await
            .map_err(|e| ProviderError::DockerConnectionFailed(e.to_string()))?;
        Ok(Self {
            docker,
            config: config.clone(),
        })
    }

    /// 各インスタンスのイメージを準備する
    ///
    /// dockerfile を持つインスタンスは派生イメージをビルドし、
    /// それ以外はベースイメージの取得を保証します。どちらも冪等です。
    async fn realize_images(&self) -> Result<()> {
        println!("{}", "> コンテナイメージを準備中".blue());
        for instance in &self.config.instances {
            if instance.attr_str("dockerfile").is_some() {
                self.build_derived_image(instance).await?;
            } else {
                self.ensure_image(&instance_image(instance)).await?;
            }
        }
        Ok(())
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        match self.docker.inspect_image(image).await {
            Ok(_) => return Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(e.into()),
        }

        println!("==> イメージを取得中: {}", image.cyan());
        let (name, tag) = parse_image_tag(image);
        let options = bollard::image::CreateImageOptions {
            from_image: name,
            tag,
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(info) = stream.next().await {
            let info = info?;
            if let Some(status) = info.status {
                tracing::debug!(image, "{}", status);
            }
        }
        Ok(())
    }

    async fn build_derived_image(&self, instance: &InstanceSpec) -> Result<()> {
        let tag = derived_image_tag(instance);
        // 既にビルド済みなら再利用する
        match self.docker.inspect_image(&tag).await {
            Ok(_) => {
                println!("  ℹ 派生イメージは既に存在します: {}", tag.cyan());
                return Ok(());
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {}
            Err(e) => return Err(e.into()),
        }

        let Some(dockerfile) = instance.attr_str("dockerfile") else {
            return Ok(());
        };
        let dockerfile_path = self.config.formula_path.join(dockerfile);
        let context = build_context(&dockerfile_path)?;

        println!("==> イメージをビルド中: {}", tag.cyan());
        let options = bollard::image::BuildImageOptions {
            dockerfile: "Dockerfile",
            t: tag.as_str(),
            rm: true,
            forcerm: true,
            ..Default::default()
        };

        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context));
        let mut stream = self.docker.build_image(options, None, Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            let output = msg?;
            if let Some(line) = output.stream {
                print!("{}", line);
            }
            if let Some(error) = output.error {
                return Err(ProviderError::BuildFailed(error));
            }
        }
        Ok(())
    }

    /// シナリオの分離ネットワークを保証する
    async fn ensure_network(&self) -> Result<()> {
        let network_name = self.config.network_name();
        let network_config = bollard::models::NetworkCreateRequest {
            name: network_name.clone(),
            driver: Some("bridge".to_string()),
            labels: Some(scenario_labels(&self.config)),
            ..Default::default()
        };
        match self.docker.create_network(network_config).await {
            Ok(_) => println!("  ✓ ネットワーク作成: {}", network_name.cyan()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 409, ..
            }) => println!("  ℹ ネットワークは既に存在します"),
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// インスタンスを起動する（既存のものは再作成せず再利用）
    async fn start_instances(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for instance in &self.config.instances {
            println!(
                "{}",
                format!("▶ {} を起動中...", instance.name).green().bold()
            );
            match self
                .docker
                .inspect_container(&instance.prov_name, None::<InspectContainerOptions>)
                .await
            {
                Ok(_) => {
                    // プロビジョニング名が既に存在する → 再アタッチ
                    match self
                        .docker
                        .start_container(
                            &instance.prov_name,
                            None::<bollard::query_parameters::StartContainerOptions>,
                        )
                        .await
                    {
                        Ok(_) => println!("  ✓ 既存コンテナを起動"),
                        Err(bollard::errors::Error::DockerResponseServerError {
                            status_code: 304,
                            ..
                        }) => println!("  ℹ コンテナは既に起動中です"),
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {
                    let (container_config, options) =
                        instance_to_container_config(&self.config, instance);
                    self.docker
                        .create_container(Some(options), container_config)
                        .await?;
                    self.docker
                        .start_container(
                            &instance.prov_name,
                            None::<bollard::query_parameters::StartContainerOptions>,
                        )
                        .await?;
                    println!("  ✓ 起動完了");
                }
                Err(e) => return Err(e.into()),
            }
            names.push(instance.prov_name.clone());
        }
        Ok(names)
    }

    /// Salt エージェントをブートストラップする
    ///
    /// 稼働確認が取れたインスタンスはスキップするため、
    /// orchestrate 全体を安全に再実行できます。
    async fn bootstrap_instances(&self) -> Result<()> {
        let exec = DirectExec::new(&self.docker);
        for instance in &self.config.instances {
            let probe: Vec<String> = exec::SALT_PROBE.iter().map(|s| s.to_string()).collect();
            let (code, _) = exec.run(&instance.prov_name, probe).await?;
            if code == 0 {
                println!("  ℹ {} は既にブートストラップ済み", instance.name);
                continue;
            }
            println!("  ▶ {} をブートストラップ中...", instance.name.cyan());
            let (code, output) = exec.run(&instance.prov_name, exec::bootstrap_cmd()).await?;
            if code != 0 {
                // 部分状態は残したまま中断する（明示的な destroy で回収）
                return Err(ProviderError::Bootstrap {
                    instance: instance.name.clone(),
                    output,
                });
            }
            println!("  ✓ ブートストラップ完了");
        }
        Ok(())
    }

    /// ラベルに一致するコンテナのプロビジョニング名を列挙する
    async fn labeled_container_names(&self, all: bool) -> Result<HashSet<String>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), label_filters(&self.config));
        let options = bollard::container::ListContainersOptions {
            all,
            filters,
            ..Default::default()
        };
        let containers = self.docker.list_containers(Some(options)).await?;
        Ok(containers
            .iter()
            .flat_map(|c| c.names.iter().flatten())
            .map(|name| name.trim_start_matches('/').to_string())
            .collect())
    }

    async fn container_ip(&self, prov_name: &str) -> Result<String> {
        let inspect = self
            .docker
            .inspect_container(prov_name, None::<InspectContainerOptions>)
            .await?;
        inspect
            .network_settings
            .and_then(|s| s.networks)
            .and_then(|mut nets| nets.remove(&self.config.network_name()))
            .and_then(|endpoint| endpoint.ip_address)
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| {
                ProviderError::DockerApi(format!("'{prov_name}' のIPアドレスが取得できません"))
            })
    }
}

/// ログイン対象を解決する
///
/// ホスト未指定でインスタンスが複数ある場合はエラーです。
pub(crate) fn login_target<'a>(
    config: &'a ScenarioConfig,
    host: Option<&str>,
) -> Result<&'a InstanceSpec> {
    match host {
        Some(name) => config
            .instance(name)
            .ok_or_else(|| ProviderError::InstanceNotFound(name.to_string())),
        None if config.instances.len() == 1 => Ok(&config.instances[0]),
        None => Err(ProviderError::NoHostSpecified {
            available: config
                .instances
                .iter()
                .map(|i| i.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// Dockerfile の親ディレクトリからビルドコンテキスト (tar.gz) を作成
fn build_context(dockerfile_path: &std::path::Path) -> Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Read;

    let context_dir = dockerfile_path
        .parent()
        .ok_or_else(|| ProviderError::Io(std::io::Error::other("Dockerfileの親がありません")))?;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut tar = tar::Builder::new(encoder);
    tar.append_dir_all(".", context_dir)?;

    // 指定されたファイルを "Dockerfile" として追加
    let mut content = Vec::new();
    std::fs::File::open(dockerfile_path)?.read_to_end(&mut content)?;
    let mut header = tar::Header::new_gnu();
    header.set_path("Dockerfile").map_err(ProviderError::Io)?;
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    tar.append(&header, &content[..])?;

    Ok(tar.into_inner()?.finish()?)
}

#[async_trait]
impl Provider for DockerProvider {
    fn connection_scheme(&self) -> &'static str {
        "docker"
    }

    async fn orchestrate(&self) -> anyhow::Result<Vec<String>> {
        self.realize_images().await?;
        self.ensure_network().await?;
        let names = self.start_instances().await?;
        self.bootstrap_instances().await?;
        Ok(names)
    }

    async fn converge(&self) -> anyhow::Result<ConvergeOutput> {
        let live = self.labeled_container_names(false).await?;
        let targets: Vec<&InstanceSpec> = self
            .config
            .instances
            .iter()
            .filter(|i| live.contains(&i.prov_name))
            .collect();

        let mut outputs = ConvergeOutput::new();
        match self.config.exec_mode {
            ExecMode::SaltMaster => {
                let exec = DirectExec::new(&self.docker);
                for instance in targets {
                    println!(
                        "{}",
                        format!("▶ {} へ状態を適用中...", instance.name)
                            .green()
                            .bold()
                    );
                    let (code, output) =
                        exec.run(&instance.prov_name, exec::salt_apply_cmd()).await?;
                    if code != 0 {
                        // 成否の判定はフェーズランナーの方針
                        println!("  ⚠ 状態適用の終了コード: {}", code);
                    }
                    outputs.insert(instance.name.clone(), output);
                }
            }
            ExecMode::SaltSsh => {
                let mut entries = Vec::new();
                for instance in &targets {
                    entries.push(RosterEntry {
                        name: instance.name.clone(),
                        host: self.container_ip(&instance.prov_name).await?,
                        user: "root".to_string(),
                        port: None,
                        priv_key: None,
                    });
                }
                let names: Vec<String> = targets.iter().map(|i| i.name.clone()).collect();

                println!("{}", "▶ salt-ssh で一括適用中...".green().bold());
                let ssh = SaltSshExec::new(&self.config.state_root);
                ssh.write_roster(&entries)?;
                let (code, output) = ssh.apply_all().await?;
                if code != 0 {
                    println!("  ⚠ salt-ssh の終了コード: {}", code);
                }
                outputs = exec::split_batch_output(&output, &names);
            }
        }
        Ok(outputs)
    }

    async fn get_inventory(&self) -> anyhow::Result<Vec<InventoryEntry>> {
        let existing = self.labeled_container_names(true).await?;
        let mut inventory = Vec::new();
        for instance in &self.config.instances {
            let state = if !existing.contains(&instance.prov_name) {
                InstanceState::NotCreated
            } else if statedir::marker_path(&self.config, &instance.name).exists() {
                InstanceState::Prepared
            } else {
                InstanceState::Created
            };
            inventory.push(InventoryEntry {
                name: instance.name.clone(),
                endpoint: format!("docker://{}", instance.prov_name),
                state,
            });
        }
        Ok(inventory)
    }

    async fn cleanup(&self) -> anyhow::Result<()> {
        // コンテナ → ネットワーク → 一時状態の順に削除
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), label_filters(&self.config));
        let options = bollard::container::ListContainersOptions {
            all: true,
            filters: filters.clone(),
            ..Default::default()
        };
        for container in self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(ProviderError::from)?
        {
            let Some(id) = container.id else { continue };
            match self
                .docker
                .remove_container(
                    &id,
                    Some(bollard::query_parameters::RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await
            {
                Ok(_) | Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    ..
                }) => {}
                Err(e) => return Err(ProviderError::from(e).into()),
            }
        }

        let options = bollard::network::ListNetworksOptions { filters };
        for network in self
            .docker
            .list_networks(Some(options))
            .await
            .map_err(ProviderError::from)?
        {
            let Some(name) = network.name else { continue };
            match self.docker.remove_network(&name).await {
                Ok(_) | Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404,
                    ..
                }) => {}
                Err(e) => return Err(ProviderError::from(e).into()),
            }
        }

        statedir::remove(&self.config)?;
        Ok(())
    }

    async fn login(&self, host: Option<&str>) -> anyhow::Result<()> {
        let instance = login_target(&self.config, host)?;
        println!(
            "{}",
            format!("▶ {} へ接続中...", instance.name).green().bold()
        );
        std::process::Command::new("docker")
            .args(["exec", "-it", &instance.prov_name, "/bin/sh"])
            .status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nacl_core::model::default_phases;
    use std::path::PathBuf;

    fn test_config(instance_names: &[&str]) -> ScenarioConfig {
        ScenarioConfig {
            formula: "nacl-test".to_string(),
            scenario: "default".to_string(),
            provider: "docker".to_string(),
            verifier: "testinfra".to_string(),
            instances: instance_names
                .iter()
                .map(|name| InstanceSpec {
                    name: name.to_string(),
                    prov_name: format!("nacl_nacl-test_default_{name}"),
                    attributes: serde_yaml::Mapping::new(),
                })
                .collect(),
            phases: default_phases(),
            grains: Default::default(),
            extra_file_roots: vec![],
            master_config: serde_yaml::Mapping::new(),
            exec_mode: ExecMode::SaltMaster,
            state_root: PathBuf::from("/tmp/nacl-test"),
            formula_path: PathBuf::from("/src/nacl-test"),
        }
    }

    #[test]
    fn test_login_target_explicit_host() {
        let config = test_config(&["box1", "box2"]);
        let instance = login_target(&config, Some("box2")).unwrap();
        assert_eq!(instance.prov_name, "nacl_nacl-test_default_box2");
    }

    #[test]
    fn test_login_target_single_instance() {
        let config = test_config(&["box1"]);
        let instance = login_target(&config, None).unwrap();
        assert_eq!(instance.name, "box1");
    }

    #[test]
    fn test_login_target_ambiguous() {
        // 曖昧なターゲットは暗黙に解決しない
        let config = test_config(&["box1", "box2"]);
        let err = login_target(&config, None).unwrap_err();
        assert!(matches!(err, ProviderError::NoHostSpecified { .. }));
    }

    #[test]
    fn test_login_target_unknown_instance() {
        let config = test_config(&["box1"]);
        let err = login_target(&config, Some("box9")).unwrap_err();
        assert!(matches!(err, ProviderError::InstanceNotFound(name) if name == "box9"));
    }

    #[test]
    fn test_build_context_includes_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile.box1"), "FROM debian:12").unwrap();
        std::fs::write(dir.path().join("extra.txt"), "data").unwrap();

        let archive = build_context(&dir.path().join("Dockerfile.box1")).unwrap();
        assert!(!archive.is_empty());

        // "Dockerfile" という名前で展開されることを確認
        let decoder = flate2::read::GzDecoder::new(std::io::Cursor::new(archive));
        let mut tar = tar::Archive::new(decoder);
        let extract = tempfile::tempdir().unwrap();
        tar.unpack(extract.path()).unwrap();
        assert!(extract.path().join("Dockerfile").exists());
        assert!(extract.path().join("extra.txt").exists());
    }
}
