//! Vagrant プロバイダー
//!
//! VM が必要なシナリオ（カーネルモジュール、systemd まわり等）向け。
//! 状態ディレクトリに Vagrantfile を生成し、`vagrant` CLI を
//! サブプロセスとして駆動します。

use crate::docker::login_target;
use crate::error::{ProviderError, Result};
use crate::exec::{self, RosterEntry, SaltSshExec, split_batch_output};
use async_trait::async_trait;
use colored::Colorize;
use nacl_core::model::{ConvergeOutput, ExecMode, InstanceSpec, InstanceState, InventoryEntry};
use nacl_core::schema::{DefaultValue, FieldSpec, Kind};
use nacl_core::statedir::GUEST_MOUNT;
use nacl_core::{Provider, ScenarioConfig, statedir};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Vagrant プロバイダーが認識するインスタンス属性
pub const VAGRANT_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("name", Kind::Str),
    FieldSpec::required("box", Kind::Str),
    FieldSpec::optional_with("memory", Kind::Int, DefaultValue::Int(2048)),
    FieldSpec::optional_with("cpus", Kind::Int, DefaultValue::Int(2)),
    FieldSpec::optional("provider_raw_config_args", Kind::Seq),
];

pub struct VagrantProvider {
    config: ScenarioConfig,
}

impl VagrantProvider {
    pub fn schema() -> &'static [FieldSpec] {
        VAGRANT_SCHEMA
    }

    pub fn new(config: &ScenarioConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn vagrantfile_path(&self) -> PathBuf {
        self.config.state_root.join("Vagrantfile")
    }

    /// vagrant サブコマンドを状態ディレクトリで実行し、
    /// 出力を表示しながらキャプチャする
    async fn vagrant(&self, args: &[&str]) -> Result<(i32, String)> {
        let mut command = tokio::process::Command::new("vagrant");
        command.args(args).current_dir(&self.config.state_root);
        exec::run_streamed(&mut command).await
    }

    /// 失敗を即エラーにするバリアント
    async fn vagrant_checked(&self, args: &[&str]) -> Result<String> {
        let (code, output) = self.vagrant(args).await?;
        if code != 0 {
            return Err(ProviderError::CommandFailed {
                program: format!("vagrant {}", args.join(" ")),
                code,
                output,
            });
        }
        Ok(output)
    }

    /// ゲスト内でコマンドを実行する（`vagrant ssh -c`）
    async fn ssh_run(&self, machine: &str, command: &str) -> Result<(i32, String)> {
        self.vagrant(&["ssh", machine, "-c", command]).await
    }

    /// Salt エージェントのブートストラップ（導入済みならスキップ）
    async fn bootstrap_instances(&self) -> Result<()> {
        for instance in &self.config.instances {
            let probe = exec::SALT_PROBE.join(" ");
            let (code, _) = self.ssh_run(&instance.name, &probe).await?;
            if code == 0 {
                println!("  ℹ {} は既にブートストラップ済み", instance.name);
                continue;
            }
            println!("  ▶ {} をブートストラップ中...", instance.name.cyan());
            let script = format!("sudo sh -c '{}'", exec::BOOTSTRAP_SCRIPT);
            let (code, output) = self.ssh_run(&instance.name, &script).await?;
            if code != 0 {
                return Err(ProviderError::Bootstrap {
                    instance: instance.name.clone(),
                    output,
                });
            }
            println!("  ✓ ブートストラップ完了");
        }
        Ok(())
    }

    /// `vagrant ssh-config` からロースターエントリを組み立てる
    async fn roster_entries(&self, names: &[&str]) -> Result<Vec<RosterEntry>> {
        let mut entries = Vec::new();
        for name in names {
            let output = self.vagrant_checked(&["ssh-config", name]).await?;
            entries.push(parse_ssh_config(name, &output)?);
        }
        Ok(entries)
    }

    /// マシンごとの状態マップ（machine-readable 形式を解析）
    async fn machine_states(&self) -> Result<HashMap<String, String>> {
        if !self.vagrantfile_path().exists() {
            return Ok(HashMap::new());
        }
        let (_, output) = self.vagrant(&["status", "--machine-readable"]).await?;
        Ok(parse_machine_states(&output))
    }
}

/// シナリオの Vagrantfile を生成する
pub fn generate_vagrantfile(config: &ScenarioConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Vagrant.configure(\"2\") do |config|");
    for instance in &config.instances {
        let box_name = instance.attr_str("box").unwrap_or_default();
        let memory = instance
            .attr("memory")
            .and_then(|v| v.as_i64())
            .unwrap_or(2048);
        let cpus = instance.attr("cpus").and_then(|v| v.as_i64()).unwrap_or(2);

        let _ = writeln!(out, "  config.vm.define \"{}\" do |machine|", instance.name);
        let _ = writeln!(out, "    machine.vm.box = \"{}\"", box_name);
        let _ = writeln!(out, "    machine.vm.hostname = \"{}\"", instance.name);
        let _ = writeln!(
            out,
            "    machine.vm.synced_folder \"{}\", \"{}\"",
            config.state_root.display(),
            GUEST_MOUNT
        );
        for (index, root) in config.extra_file_roots.iter().enumerate() {
            let _ = writeln!(
                out,
                "    machine.vm.synced_folder \"{}\", \"{}/{}\", mount_options: [\"ro\"]",
                root.display(),
                statedir::GUEST_EXTRA_MOUNT,
                index
            );
        }
        let _ = writeln!(out, "    machine.vm.provider \"virtualbox\" do |vb|");
        let _ = writeln!(out, "      vb.name = \"{}\"", instance.prov_name);
        let _ = writeln!(out, "      vb.memory = {}", memory);
        let _ = writeln!(out, "      vb.cpus = {}", cpus);
        for arg in instance.attr_str_seq("provider_raw_config_args") {
            let _ = writeln!(out, "      vb.customize [{}]", arg);
        }
        let _ = writeln!(out, "    end");
        let _ = writeln!(out, "  end");
    }
    let _ = writeln!(out, "end");
    out
}

/// `vagrant ssh-config <name>` の出力を解析する
fn parse_ssh_config(name: &str, output: &str) -> Result<RosterEntry> {
    let mut host = None;
    let mut user = None;
    let mut port = None;
    let mut priv_key = None;
    for line in output.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("HostName ") {
            host = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("User ") {
            user = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Port ") {
            port = value.trim().parse().ok();
        } else if let Some(value) = line.strip_prefix("IdentityFile ") {
            priv_key = Some(PathBuf::from(value.trim()));
        }
    }
    let host = host.ok_or_else(|| {
        ProviderError::CommandFailed {
            program: format!("vagrant ssh-config {name}"),
            code: 0,
            output: output.to_string(),
        }
    })?;
    Ok(RosterEntry {
        name: name.to_string(),
        host,
        user: user.unwrap_or_else(|| "vagrant".to_string()),
        port,
        priv_key,
    })
}

/// `vagrant status --machine-readable` からマシン名→状態を抽出
///
/// 各行は `timestamp,target,type,data` 形式です。
fn parse_machine_states(output: &str) -> HashMap<String, String> {
    let mut states = HashMap::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.splitn(4, ',').collect();
        if let [_, target, "state", data] = fields[..]
            && !target.is_empty()
        {
            states.insert(target.to_string(), data.to_string());
        }
    }
    states
}

#[async_trait]
impl Provider for VagrantProvider {
    fn connection_scheme(&self) -> &'static str {
        "ssh"
    }

    async fn orchestrate(&self) -> anyhow::Result<Vec<String>> {
        // create は prepare より先に走るため、状態ディレクトリはここで保証する
        std::fs::create_dir_all(&self.config.state_root).map_err(ProviderError::Io)?;
        std::fs::write(self.vagrantfile_path(), generate_vagrantfile(&self.config))
            .map_err(ProviderError::Io)?;
        println!("{}", "▶ 仮想マシンを起動中...".green().bold());
        self.vagrant_checked(&["up"]).await?;
        self.bootstrap_instances().await?;
        Ok(self
            .config
            .instances
            .iter()
            .map(|i| i.prov_name.clone())
            .collect())
    }

    async fn converge(&self) -> anyhow::Result<ConvergeOutput> {
        let states = self.machine_states().await?;
        let targets: Vec<&InstanceSpec> = self
            .config
            .instances
            .iter()
            .filter(|i| states.get(&i.name).map(String::as_str) == Some("running"))
            .collect();

        let mut outputs = ConvergeOutput::new();
        match self.config.exec_mode {
            ExecMode::SaltMaster => {
                let apply = format!("sudo {}", exec::salt_apply_cmd().join(" "));
                for instance in targets {
                    println!(
                        "{}",
                        format!("▶ {} へ状態を適用中...", instance.name)
                            .green()
                            .bold()
                    );
                    let (code, output) = self.ssh_run(&instance.name, &apply).await?;
                    if code != 0 {
                        println!("  ⚠ 状態適用の終了コード: {}", code);
                    }
                    outputs.insert(instance.name.clone(), output);
                }
            }
            ExecMode::SaltSsh => {
                let names: Vec<&str> = targets.iter().map(|i| i.name.as_str()).collect();
                let entries = self.roster_entries(&names).await?;
                println!("{}", "▶ salt-ssh で一括適用中...".green().bold());
                let ssh = SaltSshExec::new(&self.config.state_root);
                ssh.write_roster(&entries)?;
                let (code, output) = ssh.apply_all().await?;
                if code != 0 {
                    println!("  ⚠ salt-ssh の終了コード: {}", code);
                }
                let names: Vec<String> = targets.iter().map(|i| i.name.clone()).collect();
                outputs = split_batch_output(&output, &names);
            }
        }
        Ok(outputs)
    }

    async fn get_inventory(&self) -> anyhow::Result<Vec<InventoryEntry>> {
        let states = self.machine_states().await?;
        let mut inventory = Vec::new();
        for instance in &self.config.instances {
            let state = match states.get(&instance.name).map(String::as_str) {
                None | Some("not_created") => InstanceState::NotCreated,
                Some(_) if statedir::marker_path(&self.config, &instance.name).exists() => {
                    InstanceState::Prepared
                }
                Some(_) => InstanceState::Created,
            };
            inventory.push(InventoryEntry {
                name: instance.name.clone(),
                endpoint: format!("ssh://{}", instance.prov_name),
                state,
            });
        }
        Ok(inventory)
    }

    async fn cleanup(&self) -> anyhow::Result<()> {
        if self.vagrantfile_path().exists() {
            // 破棄は冪等: 既に存在しないマシンは vagrant 側が無視する
            let (code, output) = self.vagrant(&["destroy", "-f"]).await?;
            if code != 0 {
                return Err(ProviderError::CommandFailed {
                    program: "vagrant destroy -f".to_string(),
                    code,
                    output,
                }
                .into());
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
        std::process::Command::new("vagrant")
            .args(["ssh", &instance.name])
            .current_dir(&self.config.state_root)
            .status()
            .map_err(ProviderError::Io)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nacl_core::model::default_phases;
    use nacl_core::schema::apply_defaults;

    fn test_config() -> ScenarioConfig {
        let raw: serde_yaml::Mapping =
            serde_yaml::from_str("name: box1\nbox: debian/bookworm64").unwrap();
        ScenarioConfig {
            formula: "nacl-test".to_string(),
            scenario: "default".to_string(),
            provider: "vagrant".to_string(),
            verifier: "testinfra".to_string(),
            instances: vec![InstanceSpec {
                name: "box1".to_string(),
                prov_name: "nacl_nacl-test_default_box1".to_string(),
                attributes: apply_defaults(VAGRANT_SCHEMA, &raw),
            }],
            phases: default_phases(),
            grains: Default::default(),
            extra_file_roots: vec![],
            master_config: serde_yaml::Mapping::new(),
            exec_mode: ExecMode::SaltSsh,
            state_root: PathBuf::from("/home/user/.local/state/nacl/nacl-test/default"),
            formula_path: PathBuf::from("/src/nacl-test"),
        }
    }

    #[test]
    fn test_generate_vagrantfile() {
        let vagrantfile = generate_vagrantfile(&test_config());
        assert!(vagrantfile.contains("config.vm.define \"box1\""));
        assert!(vagrantfile.contains("machine.vm.box = \"debian/bookworm64\""));
        assert!(vagrantfile.contains("vb.name = \"nacl_nacl-test_default_box1\""));
        // スキーマのデフォルト値が反映される
        assert!(vagrantfile.contains("vb.memory = 2048"));
        assert!(vagrantfile.contains("vb.cpus = 2"));
        assert!(vagrantfile.contains(
            "machine.vm.synced_folder \"/home/user/.local/state/nacl/nacl-test/default\", \"/srv/nacl\""
        ));
    }

    #[test]
    fn test_parse_ssh_config() {
        let output = "\
Host box1
  HostName 127.0.0.1
  User vagrant
  Port 2222
  IdentityFile /home/user/.local/state/nacl/nacl-test/default/.vagrant/machines/box1/virtualbox/private_key
";
        let entry = parse_ssh_config("box1", output).unwrap();
        assert_eq!(entry.host, "127.0.0.1");
        assert_eq!(entry.user, "vagrant");
        assert_eq!(entry.port, Some(2222));
        assert!(entry.priv_key.unwrap().ends_with("private_key"));
    }

    #[test]
    fn test_parse_ssh_config_missing_host() {
        assert!(parse_ssh_config("box1", "Host box1\n").is_err());
    }

    #[test]
    fn test_parse_machine_states() {
        let output = "\
1700000000,box1,metadata,provider:virtualbox
1700000000,box1,state,running
1700000000,box2,state,not_created
1700000000,,ui,info,some message
";
        let states = parse_machine_states(output);
        assert_eq!(states.get("box1").map(String::as_str), Some("running"));
        assert_eq!(states.get("box2").map(String::as_str), Some("not_created"));
        assert_eq!(states.len(), 2);
    }
}
