use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error(
        "Dockerに接続できません: {0}\n\nヒント:\n  • Dockerが起動しているか確認してください\n  • docker ps コマンドが正常に動作するか確認してください"
    )]
    DockerConnectionFailed(String),

    #[error(
        "インスタンス '{instance}' のブートストラップに失敗しました\n--- 出力 ---\n{output}"
    )]
    Bootstrap { instance: String, output: String },

    #[error(
        "ログイン対象のホストを特定できません。インスタンスが複数あります: {available}\nヒント: --host でインスタンスを指定してください"
    )]
    NoHostSpecified { available: String },

    #[error("インスタンス '{0}' はこのシナリオに定義されていません")]
    InstanceNotFound(String),

    #[error("Docker APIエラー: {0}")]
    DockerApi(String),

    #[error("イメージのビルドに失敗しました: {0}")]
    BuildFailed(String),

    #[error("コマンド '{program}' が失敗しました (終了コード {code})\n{output}")]
    CommandFailed {
        program: String,
        code: i32,
        output: String,
    },

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bollard::errors::Error> for ProviderError {
    fn from(err: bollard::errors::Error) -> Self {
        let err_str = err.to_string();
        // 接続エラーの可能性をチェック
        if err_str.contains("Connection refused") || err_str.contains("No such file or directory")
        {
            ProviderError::DockerConnectionFailed(err_str)
        } else {
            ProviderError::DockerApi(err_str)
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;
