//! init が生成するシナリオの雛形

/// nacl.yml の雛形
pub fn descriptor(formula: &str, scenario: &str) -> String {
    format!(
        r#"provider: docker
formula: {formula}
scenario: {scenario}
verifier: testinfra
salt_exec_mode: salt-master
master_config:
  state_verbose: false
instances:
  - name: box1
    image: debian:12
    command: sleep infinity
"#
    )
}

/// testinfra テストの雛形
pub const TEST_TEMPLATE: &str = r#"def test_system_is_linux(host):
    assert host.system_info.type == "linux"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_is_valid_yaml() {
        let raw: serde_yaml::Mapping =
            serde_yaml::from_str(&descriptor("my-formula", "default")).unwrap();
        assert_eq!(raw.get("formula").unwrap().as_str(), Some("my-formula"));
        assert_eq!(raw.get("scenario").unwrap().as_str(), Some("default"));
    }
}
