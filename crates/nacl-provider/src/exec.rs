//! リモート実行
//!
//! 状態適用とブートストラップの実体です。実行モードごとに2つの
//! バリアントがあります: 起動中のインスタンスへ直接 exec する方式と、
//! ホストを制御ノードとして `salt-ssh` で一括実行する方式。
//! シェルスクリプトのリテラルはすべてこのモジュールが所有します。

use crate::error::{ProviderError, Result};
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use futures_util::stream::StreamExt;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Salt エージェントの死活確認コマンド
pub const SALT_PROBE: &[&str] = &["salt-call", "--version"];

/// Salt エージェントのブートストラップスクリプト
///
/// 既に導入済みであれば何もしません。
pub const BOOTSTRAP_SCRIPT: &str = "\
if ! command -v salt-call >/dev/null 2>&1; then \
  curl -L https://github.com/saltstack/salt-bootstrap/releases/latest/download/bootstrap-salt.sh \
    -o /tmp/bootstrap-salt.sh && sh /tmp/bootstrap-salt.sh -X -d stable; \
fi";

/// インスタンス内で実行する状態適用コマンド
pub fn salt_apply_cmd() -> Vec<String> {
    vec![
        "salt-call".to_string(),
        "--local".to_string(),
        "--config-dir".to_string(),
        "/srv/nacl/etc/salt".to_string(),
        "--retcode-passthrough".to_string(),
        "state.apply".to_string(),
    ]
}

/// ブートストラップ用の exec コマンド
pub fn bootstrap_cmd() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        BOOTSTRAP_SCRIPT.to_string(),
    ]
}

/// サブプロセスを実行し、(終了コード, 全出力) を返す
///
/// stdout と stderr は到着順に表示しつつ、両方を並行にドレインします。
/// 片方だけを EOF まで読む方式だと、もう片方のパイプバッファが
/// 埋まった時点で子プロセスと互いに待ち合ってハングします。
pub async fn run_streamed(command: &mut tokio::process::Command) -> Result<(i32, String)> {
    let mut child = command
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let drain_stdout = async {
        let mut captured = String::new();
        if let Some(stdout) = stdout {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                println!("{}", line);
                captured.push_str(&line);
                captured.push('\n');
            }
        }
        Ok::<_, std::io::Error>(captured)
    };
    let drain_stderr = async {
        let mut captured = String::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                eprintln!("{}", line);
                captured.push_str(&line);
                captured.push('\n');
            }
        }
        Ok::<_, std::io::Error>(captured)
    };

    let (mut captured, err_captured) = tokio::try_join!(drain_stdout, drain_stderr)?;
    let status = child.wait().await?;

    captured.push_str(&err_captured);
    Ok((status.code().unwrap_or(-1), captured))
}

/// 起動中のコンテナへの直接実行
pub struct DirectExec<'a> {
    docker: &'a Docker,
}

impl<'a> DirectExec<'a> {
    pub fn new(docker: &'a Docker) -> Self {
        Self { docker }
    }

    /// コンテナ内でコマンドを実行し、(終了コード, 出力) を返す
    ///
    /// 出力は到着するたびに表示しつつ、全文をキャプチャします。
    pub async fn run(&self, container: &str, cmd: Vec<String>) -> Result<(i64, String)> {
        let exec_config = CreateExecOptions {
            cmd: Some(cmd),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let message = self.docker.create_exec(container, exec_config).await?;

        let mut captured = String::new();
        if let StartExecResults::Attached { mut output, .. } = self
            .docker
            .start_exec(&message.id, Some(StartExecOptions::default()))
            .await?
        {
            while let Some(msg) = output.next().await {
                match msg? {
                    LogOutput::StdOut { message } | LogOutput::Console { message } => {
                        let text = String::from_utf8_lossy(&message);
                        print!("{}", text);
                        captured.push_str(&text);
                    }
                    LogOutput::StdErr { message } => {
                        let text = String::from_utf8_lossy(&message);
                        eprint!("{}", text);
                        captured.push_str(&text);
                    }
                    LogOutput::StdIn { .. } => {}
                }
            }
        }

        let inspect = self.docker.inspect_exec(&message.id).await?;
        Ok((inspect.exit_code.unwrap_or(0), captured))
    }
}

/// salt-ssh ロースターの1エントリ
#[derive(Debug, Clone)]
pub struct RosterEntry {
    /// ミニオンID（論理名をそのまま使う）
    pub name: String,
    pub host: String,
    pub user: String,
    pub port: Option<u16>,
    pub priv_key: Option<PathBuf>,
}

/// ホストを制御ノードとした salt-ssh 一括実行
pub struct SaltSshExec {
    state_root: PathBuf,
}

impl SaltSshExec {
    pub fn new(state_root: &Path) -> Self {
        Self {
            state_root: state_root.to_path_buf(),
        }
    }

    fn roster_path(&self) -> PathBuf {
        self.state_root.join("roster")
    }

    /// ロースターファイルを生成する
    pub fn write_roster(&self, entries: &[RosterEntry]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.state_root)?;
        let path = self.roster_path();
        std::fs::write(&path, render_roster(entries))?;
        Ok(path)
    }

    /// 全ターゲットへ一括で状態を適用し、(終了コード, 全出力) を返す
    pub async fn apply_all(&self) -> Result<(i32, String)> {
        let config_dir = self.state_root.join("etc").join("salt");
        let mut command = tokio::process::Command::new("salt-ssh");
        command
            .arg("--roster-file")
            .arg(self.roster_path())
            .arg("--config-dir")
            .arg(&config_dir)
            .arg("--ignore-host-keys")
            .arg("-i")
            .arg("*")
            .arg("state.apply")
            .current_dir(&self.state_root);
        run_streamed(&mut command).await
    }
}

fn render_roster(entries: &[RosterEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{}:", entry.name);
        let _ = writeln!(out, "  host: {}", entry.host);
        let _ = writeln!(out, "  user: {}", entry.user);
        if let Some(port) = entry.port {
            let _ = writeln!(out, "  port: {}", port);
        }
        if let Some(key) = &entry.priv_key {
            let _ = writeln!(out, "  priv: {}", key.display());
        }
    }
    out
}

/// salt-ssh の一括出力をミニオンIDごとに分割する
///
/// 出力はミニオンIDだけの行 (`<id>:`) でブロックが始まります。
/// どのブロックにも一致しなかった場合は全文を各インスタンスへ返します
/// （成功判定のパターンマッチには全文で十分なため）。
pub fn split_batch_output(output: &str, names: &[String]) -> BTreeMap<String, String> {
    let mut sections: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<&String> = None;

    for line in output.lines() {
        if let Some(name) = names.iter().find(|n| line.trim_end() == format!("{n}:")) {
            current = Some(name);
            sections.entry(name.clone()).or_default();
            continue;
        }
        if let Some(name) = current {
            let section = sections.entry(name.clone()).or_default();
            section.push_str(line);
            section.push('\n');
        }
    }

    if sections.is_empty() {
        for name in names {
            sections.insert(name.clone(), output.to_string());
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_roster() {
        let entries = vec![
            RosterEntry {
                name: "box1".to_string(),
                host: "172.20.0.2".to_string(),
                user: "root".to_string(),
                port: None,
                priv_key: None,
            },
            RosterEntry {
                name: "box2".to_string(),
                host: "127.0.0.1".to_string(),
                user: "vagrant".to_string(),
                port: Some(2222),
                priv_key: Some(PathBuf::from("/tmp/key")),
            },
        ];
        let roster = render_roster(&entries);
        assert!(roster.contains("box1:\n  host: 172.20.0.2\n  user: root\n"));
        assert!(roster.contains("  port: 2222\n"));
        assert!(roster.contains("  priv: /tmp/key\n"));
    }

    #[test]
    fn test_split_batch_output() {
        let output = "\
box1:
----------
          ID: vim
    Function: pkg.installed
      Result: True
Summary for box1
box2:
----------
          ID: vim
      Result: True
Summary for box2
";
        let names = vec!["box1".to_string(), "box2".to_string()];
        let sections = split_batch_output(output, &names);
        assert_eq!(sections.len(), 2);
        assert!(sections["box1"].contains("Summary for box1"));
        assert!(!sections["box1"].contains("Summary for box2"));
        assert!(sections["box2"].contains("Summary for box2"));
    }

    #[test]
    fn test_split_batch_output_no_match_falls_back() {
        let output = "salt-ssh: some global failure";
        let names = vec!["box1".to_string()];
        let sections = split_batch_output(output, &names);
        assert_eq!(sections["box1"], output);
    }

    #[tokio::test]
    async fn test_run_streamed_drains_large_stderr() {
        // stderr がパイプバッファを大きく超えても完走すること
        let mut command = tokio::process::Command::new("sh");
        command.args(["-c", "head -c 1048576 /dev/zero | tr '\\0' e >&2; echo done"]);
        let (code, output) =
            tokio::time::timeout(std::time::Duration::from_secs(10), run_streamed(&mut command))
                .await
                .expect("stderr のドレインが止まっている")
                .unwrap();
        assert_eq!(code, 0);
        assert!(output.contains("done"));
        assert!(output.contains("eeee"));
    }

    #[tokio::test]
    async fn test_run_streamed_reports_exit_code() {
        let mut command = tokio::process::Command::new("sh");
        command.args(["-c", "echo out; echo err >&2; exit 3"]);
        let (code, output) = run_streamed(&mut command).await.unwrap();
        assert_eq!(code, 3);
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }

    #[test]
    fn test_salt_apply_cmd_uses_mounted_config() {
        let cmd = salt_apply_cmd();
        assert_eq!(cmd[0], "salt-call");
        assert!(cmd.contains(&"/srv/nacl/etc/salt".to_string()));
        assert_eq!(cmd.last().unwrap(), "state.apply");
    }
}
