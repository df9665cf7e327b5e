//! 記述ファイルの検証と正規化
//!
//! 生の nacl.yml をトップレベルスキーマとプロバイダーのインスタンス
//! スキーマに対して検証し、完全に解決された [`ScenarioConfig`] へ
//! 展開します。ここでは I/O もプロバイダー呼び出しも行いません。

use crate::error::{ConfigError, Result};
use crate::model::{ExecMode, InstanceSpec, Phase, ScenarioConfig, default_phases};
use crate::schema::{self, FieldSpec, TOP_SCHEMA};
use serde_yaml::{Mapping, Value};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// 全リソース名の名前空間プレフィックス
pub const NAMESPACE: &str = "nacl";

/// プロビジョニング名を導出する
///
/// `nacl_<formula>_<scenario>_<logical-name>` の形式で、
/// 再実行しても同じ名前になります。
pub fn provisioned_name(formula: &str, scenario: &str, name: &str) -> String {
    format!("{NAMESPACE}_{formula}_{scenario}_{name}")
}

/// 生の記述ファイルを検証する
///
/// トップレベルの必須キーと型、salt_exec_mode の列挙値、
/// そして各インスタンスの属性をプロバイダーのスキーマで確認します。
/// 違反があればバックエンドに触れる前に [`ConfigError`] で失敗します。
pub fn validate(raw: &Mapping, instance_schema: &[FieldSpec]) -> Result<()> {
    schema::validate_against(TOP_SCHEMA, raw)?;

    // salt_exec_mode は列挙値
    let mode = raw
        .get("salt_exec_mode")
        .and_then(Value::as_str)
        .expect("スキーマ検証済み");
    mode.parse::<ExecMode>()?;

    for (index, entry) in instance_sequence(raw)?.iter().enumerate() {
        let Some(instance) = entry.as_mapping() else {
            return Err(ConfigError::TypeMismatch {
                key: format!("instances[{index}]"),
                expected: "mapping",
                actual: schema::value_kind(entry),
            });
        };
        let name = instance
            .get("name")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| format!("instances[{index}]"));
        schema::validate_instance(instance_schema, instance, &name)?;
    }
    Ok(())
}

/// 生の記述ファイルを [`ScenarioConfig`] へ正規化する
///
/// インスタンス属性はスキーマで宣言されたキーだけを既定値込みで
/// コピーし、プロビジョニング名を導出します。
pub fn normalize(
    raw: &Mapping,
    instance_schema: &[FieldSpec],
    state_root: PathBuf,
    formula_path: PathBuf,
) -> Result<ScenarioConfig> {
    validate(raw, instance_schema)?;

    let formula = required_str(raw, "formula");
    let scenario = required_str(raw, "scenario");

    let mut instances = Vec::new();
    let mut seen = HashSet::new();
    for entry in instance_sequence(raw)? {
        let instance = entry.as_mapping().expect("検証済み");
        let name = instance
            .get("name")
            .and_then(Value::as_str)
            .expect("検証済み")
            .to_string();
        if !seen.insert(name.clone()) {
            return Err(ConfigError::DuplicateInstance(name));
        }
        instances.push(InstanceSpec {
            prov_name: provisioned_name(&formula, &scenario, &name),
            attributes: schema::apply_defaults(instance_schema, instance),
            name,
        });
    }

    let phases = match raw.get("phases").and_then(Value::as_sequence) {
        Some(seq) => parse_phases(seq)?,
        None => default_phases(),
    };

    Ok(ScenarioConfig {
        provider: required_str(raw, "provider"),
        verifier: required_str(raw, "verifier"),
        grains: parse_grains(raw)?,
        extra_file_roots: parse_extra_file_roots(raw)?,
        master_config: raw
            .get("master_config")
            .and_then(Value::as_mapping)
            .cloned()
            .unwrap_or_default(),
        exec_mode: required_str(raw, "salt_exec_mode").parse()?,
        formula,
        scenario,
        instances,
        phases,
        state_root,
        formula_path,
    })
}

fn required_str(raw: &Mapping, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .expect("スキーマ検証済み")
        .to_string()
}

fn instance_sequence(raw: &Mapping) -> Result<&serde_yaml::Sequence> {
    raw.get("instances")
        .and_then(Value::as_sequence)
        .ok_or_else(|| ConfigError::MissingKey("instances".to_string()))
}

fn parse_phases(seq: &serde_yaml::Sequence) -> Result<Vec<Phase>> {
    seq.iter()
        .map(|v| {
            v.as_str().map(Phase::parse).ok_or(ConfigError::TypeMismatch {
                key: "phases".to_string(),
                expected: "string",
                actual: schema::value_kind(v),
            })
        })
        .collect()
}

fn parse_grains(raw: &Mapping) -> Result<HashMap<String, Mapping>> {
    let mut grains = HashMap::new();
    if let Some(mapping) = raw.get("grains").and_then(Value::as_mapping) {
        for (key, value) in mapping {
            let name = key.as_str().ok_or(ConfigError::TypeMismatch {
                key: "grains".to_string(),
                expected: "string",
                actual: schema::value_kind(key),
            })?;
            let entry = value.as_mapping().ok_or_else(|| ConfigError::TypeMismatch {
                key: format!("grains.{name}"),
                expected: "mapping",
                actual: schema::value_kind(value),
            })?;
            grains.insert(name.to_string(), entry.clone());
        }
    }
    Ok(grains)
}

fn parse_extra_file_roots(raw: &Mapping) -> Result<Vec<PathBuf>> {
    let mut roots = Vec::new();
    if let Some(seq) = raw.get("extra_file_roots").and_then(Value::as_sequence) {
        for value in seq {
            let path = value.as_str().ok_or(ConfigError::TypeMismatch {
                key: "extra_file_roots".to_string(),
                expected: "string",
                actual: schema::value_kind(value),
            })?;
            roots.push(PathBuf::from(path));
        }
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DefaultValue, Kind};

    // テスト用の最小インスタンススキーマ（dockerプロバイダー相当）
    const TEST_SCHEMA: &[FieldSpec] = &[
        FieldSpec::required("name", Kind::Str),
        FieldSpec::required("image", Kind::Str),
        FieldSpec::optional("command", Kind::Str),
        FieldSpec::optional("cap_add", Kind::Seq),
        FieldSpec::optional_with("privileged", Kind::Bool, DefaultValue::Bool(false)),
    ];

    fn raw_config() -> Mapping {
        serde_yaml::from_str(
            r#"
provider: docker
formula: nacl-test
scenario: default
verifier: testinfra
salt_exec_mode: salt-master
master_config:
  state_verbose: false
instances:
  - name: box1
    image: debian:12
    cap_add: [SYS_ADMIN]
    unknown_key: whatever
  - name: box2
    image: rockylinux:9
"#,
        )
        .unwrap()
    }

    fn normalize_test(raw: &Mapping) -> Result<ScenarioConfig> {
        normalize(
            raw,
            TEST_SCHEMA,
            PathBuf::from("/tmp/nacl/nacl-test/default"),
            PathBuf::from("/src/nacl-test"),
        )
    }

    #[test]
    fn test_validate_ok() {
        validate(&raw_config(), TEST_SCHEMA).unwrap();
    }

    #[test]
    fn test_validate_missing_top_level_key() {
        let mut raw = raw_config();
        raw.remove("provider");
        let err = validate(&raw, TEST_SCHEMA).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey(key) if key == "provider"));
    }

    #[test]
    fn test_validate_wrong_instance_type() {
        let mut raw = raw_config();
        // cap_add に数値を入れる
        let instances = raw.get_mut("instances").unwrap().as_sequence_mut().unwrap();
        instances[0]
            .as_mapping_mut()
            .unwrap()
            .insert("cap_add".into(), 1.into());
        let err = validate(&raw, TEST_SCHEMA).unwrap_err();
        match err {
            ConfigError::InstanceTypeMismatch { instance, key, .. } => {
                assert_eq!(instance, "box1");
                assert_eq!(key, "cap_add");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_bad_exec_mode() {
        let mut raw = raw_config();
        raw.insert("salt_exec_mode".into(), "salt-cloud".into());
        let err = validate(&raw, TEST_SCHEMA).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidExecMode(_)));
    }

    #[test]
    fn test_normalize_prov_names() {
        let config = normalize_test(&raw_config()).unwrap();
        assert_eq!(config.instances[0].prov_name, "nacl_nacl-test_default_box1");
        assert_eq!(config.instances[1].prov_name, "nacl_nacl-test_default_box2");

        // シナリオ内で一意
        let names: HashSet<_> = config.instances.iter().map(|i| &i.prov_name).collect();
        assert_eq!(names.len(), config.instances.len());
    }

    #[test]
    fn test_normalize_is_stable() {
        // 同じ記述からは毎回同じプロビジョニング名が導出される
        let first = normalize_test(&raw_config()).unwrap();
        let second = normalize_test(&raw_config()).unwrap();
        assert_eq!(first.instances[0].prov_name, second.instances[0].prov_name);
    }

    #[test]
    fn test_normalize_copies_only_schema_keys() {
        let config = normalize_test(&raw_config()).unwrap();
        let box1 = &config.instances[0];
        assert_eq!(box1.attr_str("image"), Some("debian:12"));
        // スキーマ外キーは落ちる
        assert!(box1.attr("unknown_key").is_none());
        // 既定値が適用される
        assert_eq!(box1.attr_bool("privileged"), Some(false));
    }

    #[test]
    fn test_normalize_duplicate_instance() {
        let mut raw = raw_config();
        let instances = raw.get_mut("instances").unwrap().as_sequence_mut().unwrap();
        let copy = instances[0].clone();
        instances.push(copy);
        let err = normalize_test(&raw).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateInstance(name) if name == "box1"));
    }

    #[test]
    fn test_normalize_default_phases() {
        let config = normalize_test(&raw_config()).unwrap();
        assert_eq!(config.phases, default_phases());
    }

    #[test]
    fn test_normalize_explicit_phases_keep_unknown() {
        let mut raw = raw_config();
        raw.insert(
            "phases".into(),
            serde_yaml::from_str("[create, converge, teleport]").unwrap(),
        );
        let config = normalize_test(&raw).unwrap();
        assert_eq!(
            config.phases,
            vec![
                Phase::Create,
                Phase::Converge,
                Phase::Unknown("teleport".to_string())
            ]
        );
    }

    #[test]
    fn test_normalize_grains_per_instance() {
        let mut raw = raw_config();
        raw.insert(
            "grains".into(),
            serde_yaml::from_str("box1:\n  role: webserver").unwrap(),
        );
        let config = normalize_test(&raw).unwrap();
        assert_eq!(
            config.grains["box1"].get("role").unwrap().as_str(),
            Some("webserver")
        );
    }
}
