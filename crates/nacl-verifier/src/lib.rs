//! ベリファイアディスパッチャー
//!
//! 収束後のインスタンスに対して外部の検証ツールを実行します。
//! 現在は testinfra のみです。

pub mod testinfra;

pub use testinfra::Testinfra;

use nacl_core::{ConfigError, Verifier};

/// ベリファイアIDから実装を解決する
pub fn create_verifier(id: &str) -> Result<Box<dyn Verifier>, ConfigError> {
    match id {
        "testinfra" => Ok(Box::new(Testinfra)),
        other => Err(ConfigError::UnknownVerifier(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_verifier_testinfra() {
        assert!(create_verifier("testinfra").is_ok());
    }

    #[test]
    fn test_create_verifier_unknown() {
        let err = create_verifier("serverspec").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVerifier(name) if name == "serverspec"));
    }
}
