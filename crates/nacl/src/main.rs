mod commands;
mod templates;

use clap::{Parser, Subcommand};
use colored::Colorize;
use nacl_runner::RunnerError;

#[derive(Parser)]
#[command(name = "nacl")]
#[command(about = "Saltフォーミュラの使い捨て統合テストハーネス", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 全フェーズを実行（destroy → lint → create → prepare → converge → idempotence → verify）
    Test {
        /// シナリオ名（省略時は全シナリオを順に実行）
        #[arg(short, long)]
        scenario: Option<String>,
        /// 並列実行数
        #[arg(short, long, default_value_t = 1)]
        parallelism: usize,
        /// 成功後もインスタンスを残す（デバッグ用）
        #[arg(long)]
        no_cleanup: bool,
    },
    /// インスタンスを作成
    Create {
        /// シナリオ名
        #[arg(short, long, default_value = "default")]
        scenario: String,
    },
    /// 状態を適用
    Converge {
        /// シナリオ名
        #[arg(short, long, default_value = "default")]
        scenario: String,
    },
    /// 検証のみ実行
    Verify {
        /// シナリオ名
        #[arg(short, long, default_value = "default")]
        scenario: String,
    },
    /// インスタンスと一時状態を破棄
    Destroy {
        /// シナリオ名
        #[arg(short, long, default_value = "default")]
        scenario: String,
    },
    /// インスタンスへログイン
    Login {
        /// シナリオ名
        #[arg(short, long, default_value = "default")]
        scenario: String,
        /// 接続先のインスタンス名（単一インスタンスなら省略可）
        #[arg(long)]
        host: Option<String>,
    },
    /// フォーミュラを作業ディレクトリへ同期
    Sync {
        /// シナリオ名
        #[arg(short, long, default_value = "default")]
        scenario: String,
    },
    /// シナリオの雛形を生成
    Init {
        /// シナリオ名
        #[arg(short, long, default_value = "default")]
        scenario: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Test {
            scenario,
            parallelism,
            no_cleanup,
        } => commands::test::handle(scenario, parallelism, no_cleanup).await,
        Commands::Create { scenario } => commands::create::handle(&scenario).await,
        Commands::Converge { scenario } => commands::converge::handle(&scenario).await,
        Commands::Verify { scenario } => commands::verify::handle(&scenario).await,
        Commands::Destroy { scenario } => commands::destroy::handle(&scenario).await,
        Commands::Login { scenario, host } => {
            commands::login::handle(&scenario, host.as_deref()).await
        }
        Commands::Sync { scenario } => commands::sync::handle(&scenario),
        Commands::Init { scenario } => commands::init::handle(&scenario),
    };

    if let Err(err) = result {
        eprintln!("{} {:#}", "エラー:".red().bold(), err);
        // 外部ツールの失敗はその終了コードをそのまま返す
        let code = err
            .downcast_ref::<RunnerError>()
            .map(RunnerError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
