//! シナリオの実行本体

use crate::criteria::ConvergeCriteria;
use crate::error::RunnerError;
use colored::Colorize;
use nacl_core::model::Phase;
use nacl_core::{Provider, ScenarioConfig, Verifier, statedir};
use std::path::{Path, PathBuf};

/// フェーズランナー
///
/// 正規化済みの設定を所有し、プロバイダーとベリファイアを
/// 設定されたフェーズ順に駆動します。失敗は短絡し、リトライしません。
pub struct ScenarioRunner {
    config: ScenarioConfig,
    provider: Box<dyn Provider>,
    verifier: Box<dyn Verifier>,
    criteria: ConvergeCriteria,
    cleanup: bool,
}

impl ScenarioRunner {
    pub fn new(
        config: ScenarioConfig,
        provider: Box<dyn Provider>,
        verifier: Box<dyn Verifier>,
    ) -> Self {
        Self {
            config,
            provider,
            verifier,
            criteria: ConvergeCriteria::default(),
            cleanup: true,
        }
    }

    /// 成否判定のパターンを差し替える
    pub fn with_criteria(mut self, criteria: ConvergeCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// 成功時もインスタンスを残す（デバッグ用）
    pub fn keep_instances(mut self) -> Self {
        self.cleanup = false;
        self
    }

    /// 設定されたフェーズを順に実行する
    ///
    /// converge / idempotence / verify と不明なフェーズの失敗は
    /// クリーンアップしてから返します。lint と create / prepare で
    /// 発生したエラーは環境をそのまま残します（調査のため）。
    pub async fn run(&self) -> anyhow::Result<()> {
        println!(
            "{}",
            format!(
                "■ シナリオ実行: {} / {}",
                self.config.formula, self.config.scenario
            )
            .blue()
            .bold()
        );

        for phase in &self.config.phases {
            println!("\n{}", format!("▶ フェーズ: {}", phase).green().bold());
            if let Err(err) = self.run_phase(phase).await {
                if cleanup_on_failure(phase) {
                    println!("{}", "▶ 失敗につきクリーンアップ中...".yellow());
                    if let Err(cleanup_err) = self.provider.cleanup().await {
                        tracing::warn!("クリーンアップに失敗: {cleanup_err:#}");
                    }
                }
                println!("{}", format!("✗ フェーズ '{}' で失敗", phase).red().bold());
                return Err(err);
            }
        }

        if self.cleanup {
            println!("\n{}", "▶ インスタンスを破棄中...".green().bold());
            self.provider.cleanup().await?;
        }
        println!("\n{}", "✓ 全フェーズが完了しました".green().bold());
        Ok(())
    }

    async fn run_phase(&self, phase: &Phase) -> anyhow::Result<()> {
        match phase {
            Phase::Destroy => self.provider.cleanup().await,
            Phase::Lint => self.lint().await,
            Phase::Create => {
                self.provider.orchestrate().await?;
                Ok(())
            }
            Phase::Prepare => {
                statedir::prepare(&self.config)?;
                println!("  ✓ 作業ディレクトリを構築: {}", self.config.state_root.display());
                Ok(())
            }
            Phase::Converge => self.converge(false).await,
            Phase::Idempotence => self.converge(true).await,
            Phase::Verify => self.verify().await,
            Phase::Unknown(name) => Err(RunnerError::UnknownPhase(name.clone()).into()),
        }
    }

    /// 状態を適用し、出力のサマリーで成否を判定する
    ///
    /// `check_idempotence` が真の場合は変更の発生も失敗扱いです。
    async fn converge(&self, check_idempotence: bool) -> anyhow::Result<()> {
        let outputs = self.provider.converge().await?;
        for (instance, output) in &outputs {
            if self.criteria.is_failure(output) {
                return Err(RunnerError::ConvergeFailed {
                    instance: instance.clone(),
                }
                .into());
            }
            if check_idempotence && self.criteria.has_changes(output) {
                return Err(RunnerError::NotIdempotent {
                    instance: instance.clone(),
                }
                .into());
            }
            println!("  ✓ {}", instance);
        }
        Ok(())
    }

    async fn verify(&self) -> anyhow::Result<()> {
        let inventory = self.provider.get_inventory().await?;
        let code = self.verifier.run(&self.config, &inventory).await?;
        if code != 0 {
            return Err(RunnerError::VerifyFailed(code).into());
        }
        Ok(())
    }

    /// フォーミュラの .sls を salt-lint にかける
    async fn lint(&self) -> anyhow::Result<()> {
        let files = collect_sls(&self.config.formula_path)?;
        if files.is_empty() {
            println!("  ℹ lint対象の .sls がありません");
            return Ok(());
        }
        let status = tokio::process::Command::new("salt-lint")
            .args(&files)
            .status()
            .await
            .map_err(RunnerError::Io)?;
        if !status.success() {
            return Err(RunnerError::LintFailed(status.code().unwrap_or(-1)).into());
        }
        println!("  ✓ {} ファイルを検査", files.len());
        Ok(())
    }
}

/// このフェーズの失敗でクリーンアップするか
fn cleanup_on_failure(phase: &Phase) -> bool {
    matches!(
        phase,
        Phase::Converge | Phase::Idempotence | Phase::Verify | Phase::Unknown(_)
    )
}

/// フォーミュラ配下の .sls を再帰的に集める（シナリオ定義とVCSは除外）
fn collect_sls(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if name == ".git" || (dir == root && name == "nacl") {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "sls") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_sls_skips_scenario_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("init.sls"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/extra.sls"), "").unwrap();
        std::fs::create_dir_all(dir.path().join("nacl/default")).unwrap();
        std::fs::write(dir.path().join("nacl/default/ignored.sls"), "").unwrap();

        let files = collect_sls(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| !f.to_string_lossy().contains("nacl/")));
    }

    #[test]
    fn test_cleanup_policy() {
        assert!(cleanup_on_failure(&Phase::Converge));
        assert!(cleanup_on_failure(&Phase::Idempotence));
        assert!(cleanup_on_failure(&Phase::Verify));
        assert!(cleanup_on_failure(&Phase::Unknown("fnord".to_string())));
        // lint は何もプロビジョニングしていないので対象外
        assert!(!cleanup_on_failure(&Phase::Lint));
        assert!(!cleanup_on_failure(&Phase::Create));
        assert!(!cleanup_on_failure(&Phase::Prepare));
        assert!(!cleanup_on_failure(&Phase::Destroy));
    }
}
