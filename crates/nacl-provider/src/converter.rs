//! InstanceSpec から Docker API パラメータへの変換

// Bollard 0.19 の非推奨APIを一時的に使用
#![allow(deprecated)]

use bollard::container::{Config, CreateContainerOptions, NetworkingConfig};
use bollard::models::{EndpointSettings, HostConfig, PortBinding};
use nacl_core::schema::{DefaultValue, FieldSpec, Kind};
use nacl_core::statedir::{GUEST_EXTRA_MOUNT, GUEST_MOUNT};
use nacl_core::{InstanceSpec, ScenarioConfig};
use std::collections::HashMap;

/// Docker プロバイダーが認識するインスタンス属性
pub const DOCKER_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("name", Kind::Str),
    FieldSpec::required("image", Kind::Str),
    FieldSpec::optional("dockerfile", Kind::Str),
    FieldSpec::optional("command", Kind::Str),
    FieldSpec::optional("cap_add", Kind::Seq),
    FieldSpec::optional("environment", Kind::Seq),
    FieldSpec::optional("volumes", Kind::Seq),
    FieldSpec::optional("ports", Kind::Map),
    FieldSpec::optional("extra_hosts", Kind::Map),
    FieldSpec::optional("dns_search", Kind::Str),
    FieldSpec::optional_with("privileged", Kind::Bool, DefaultValue::Bool(false)),
];

/// シナリオのリソースに付けるラベル
///
/// クリーンアップとインベントリはこのラベルだけでフィルタします。
pub fn scenario_labels(config: &ScenarioConfig) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    labels.insert("nacl.formula".to_string(), config.formula.clone());
    labels.insert("nacl.scenario".to_string(), config.scenario.clone());
    labels
}

/// list API 用のラベルフィルタ
pub fn label_filters(config: &ScenarioConfig) -> Vec<String> {
    vec![
        format!("nacl.formula={}", config.formula),
        format!("nacl.scenario={}", config.scenario),
    ]
}

/// イメージ名とタグを分離
/// 例: "debian:12" -> ("debian", "12")
///     "debian" -> ("debian", "latest")
pub fn parse_image_tag(image: &str) -> (&str, &str) {
    if let Some((name, tag)) = image.split_once(':') {
        (name, tag)
    } else {
        (image, "latest")
    }
}

/// カスタマイズされたインスタンスの派生イメージタグ
pub fn derived_image_tag(instance: &InstanceSpec) -> String {
    format!("nacl/{}:latest", instance.prov_name)
}

/// インスタンスが実際に使うイメージ名
///
/// dockerfile を指定したインスタンスは派生イメージ、
/// それ以外は宣言されたベースイメージ（タグ省略時は latest）。
pub fn instance_image(instance: &InstanceSpec) -> String {
    if instance.attr_str("dockerfile").is_some() {
        return derived_image_tag(instance);
    }
    let image = instance.attr_str("image").unwrap_or_default();
    let (name, tag) = parse_image_tag(image);
    format!("{}:{}", name, tag)
}

/// InstanceSpec をコンテナ設定に変換
pub fn instance_to_container_config(
    config: &ScenarioConfig,
    instance: &InstanceSpec,
) -> (Config<String>, CreateContainerOptions<String>) {
    // 環境変数 ("KEY=VALUE" 形式のリスト)
    let env = instance.attr_str_seq("environment");

    // ボリューム: ユーザー定義 + 状態ディレクトリ + 追加 file_roots
    let mut binds: Vec<String> = instance.attr_str_seq("volumes");
    binds.push(format!(
        "{}:{}:rw",
        config.state_root.display(),
        GUEST_MOUNT
    ));
    for (index, root) in config.extra_file_roots.iter().enumerate() {
        binds.push(format!(
            "{}:{}/{}:ro",
            root.display(),
            GUEST_EXTRA_MOUNT,
            index
        ));
    }

    // ポートバインディング ("80/tcp": 8080 形式のマップ)
    let mut port_bindings = HashMap::new();
    let mut exposed_ports = HashMap::new();
    if let Some(ports) = instance.attr("ports").and_then(|v| v.as_mapping()) {
        for (container_port, host_port) in ports {
            let (Some(container_port), Some(host_port)) =
                (container_port.as_str(), host_port.as_i64())
            else {
                continue;
            };
            let key = if container_port.contains('/') {
                container_port.to_string()
            } else {
                format!("{}/tcp", container_port)
            };
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(host_port.to_string()),
                }]),
            );
        }
    }

    // extra_hosts ("host": "ip" マップ)
    let extra_hosts: Vec<String> = instance
        .attr("extra_hosts")
        .and_then(|v| v.as_mapping())
        .map(|hosts| {
            hosts
                .iter()
                .filter_map(|(host, ip)| {
                    Some(format!("{}:{}", host.as_str()?, ip.as_str()?))
                })
                .collect()
        })
        .unwrap_or_default();

    let host_config = Some(HostConfig {
        binds: Some(binds),
        port_bindings: Some(port_bindings),
        privileged: instance.attr_bool("privileged"),
        cap_add: Some(instance.attr_str_seq("cap_add")),
        extra_hosts: Some(extra_hosts),
        dns_search: instance
            .attr_str("dns_search")
            .map(|s| vec![s.to_string()]),
        network_mode: Some(config.network_name()),
        ..Default::default()
    });

    // シナリオのネットワークに論理名でエイリアス登録
    let mut endpoints = HashMap::new();
    endpoints.insert(
        config.network_name(),
        EndpointSettings {
            aliases: Some(vec![instance.name.clone()]),
            ..Default::default()
        },
    );

    let container_config = Config {
        image: Some(instance_image(instance)),
        env: Some(env),
        exposed_ports: Some(exposed_ports),
        host_config,
        labels: Some(scenario_labels(config)),
        cmd: instance
            .attr_str("command")
            .map(|c| c.split_whitespace().map(String::from).collect()),
        networking_config: Some(NetworkingConfig {
            endpoints_config: endpoints,
        }),
        ..Default::default()
    };

    let options = CreateContainerOptions {
        name: instance.prov_name.clone(),
        platform: None,
    };

    (container_config, options)
}
