//! スキーマ検証
//!
//! トップレベルの記述ファイルとプロバイダーごとのインスタンス属性を
//! 同じフィールド記述子 + 汎用バリデータで検証します。

use crate::error::{ConfigError, Result};
use serde_yaml::{Mapping, Value};

/// 期待する値の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Str,
    Int,
    Bool,
    Seq,
    Map,
}

impl Kind {
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Str => "string",
            Kind::Int => "integer",
            Kind::Bool => "bool",
            Kind::Seq => "list",
            Kind::Map => "mapping",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Kind::Str => value.is_string(),
            Kind::Int => value.is_i64() || value.is_u64(),
            Kind::Bool => value.is_bool(),
            Kind::Seq => value.is_sequence(),
            Kind::Map => value.is_mapping(),
        }
    }
}

/// 値の実際の種別名（エラーメッセージ用）
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged",
    }
}

/// const 文脈で書ける既定値
#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Bool(bool),
    Int(i64),
    Str(&'static str),
}

impl DefaultValue {
    pub fn to_value(self) -> Value {
        match self {
            DefaultValue::Bool(b) => Value::Bool(b),
            DefaultValue::Int(i) => Value::Number(i.into()),
            DefaultValue::Str(s) => Value::String(s.to_string()),
        }
    }
}

/// 1フィールドの宣言
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub key: &'static str,
    pub required: bool,
    pub kind: Kind,
    pub default: Option<DefaultValue>,
}

impl FieldSpec {
    pub const fn required(key: &'static str, kind: Kind) -> FieldSpec {
        FieldSpec {
            key,
            required: true,
            kind,
            default: None,
        }
    }

    pub const fn optional(key: &'static str, kind: Kind) -> FieldSpec {
        FieldSpec {
            key,
            required: false,
            kind,
            default: None,
        }
    }

    pub const fn optional_with(key: &'static str, kind: Kind, default: DefaultValue) -> FieldSpec {
        FieldSpec {
            key,
            required: false,
            kind,
            default: Some(default),
        }
    }
}

/// 記述ファイルのトップレベルスキーマ
pub const TOP_SCHEMA: &[FieldSpec] = &[
    FieldSpec::required("provider", Kind::Str),
    FieldSpec::required("instances", Kind::Seq),
    FieldSpec::required("formula", Kind::Str),
    FieldSpec::required("scenario", Kind::Str),
    FieldSpec::required("verifier", Kind::Str),
    FieldSpec::required("salt_exec_mode", Kind::Str),
    FieldSpec::required("master_config", Kind::Map),
    FieldSpec::optional("grains", Kind::Map),
    FieldSpec::optional("phases", Kind::Seq),
    FieldSpec::optional("extra_file_roots", Kind::Seq),
];

/// マッピングをスキーマに対して検証する
///
/// 必須キーの存在と、存在するキーの型一致のみを確認します。
/// スキーマ外のキーは前方互換のため許容されます。
pub fn validate_against(schema: &[FieldSpec], mapping: &Mapping) -> Result<()> {
    for field in schema {
        match mapping.get(field.key) {
            None if field.required => {
                return Err(ConfigError::MissingKey(field.key.to_string()));
            }
            Some(value) if !field.kind.matches(value) => {
                return Err(ConfigError::TypeMismatch {
                    key: field.key.to_string(),
                    expected: field.kind.name(),
                    actual: value_kind(value),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// インスタンス属性をスキーマに対して検証する
///
/// エラーにはどのインスタンスのどのキーかを含めます。
pub fn validate_instance(schema: &[FieldSpec], mapping: &Mapping, instance: &str) -> Result<()> {
    for field in schema {
        match mapping.get(field.key) {
            None if field.required => {
                return Err(ConfigError::MissingInstanceKey {
                    instance: instance.to_string(),
                    key: field.key.to_string(),
                });
            }
            Some(value) if !field.kind.matches(value) => {
                return Err(ConfigError::InstanceTypeMismatch {
                    instance: instance.to_string(),
                    key: field.key.to_string(),
                    expected: field.kind.name(),
                    actual: value_kind(value),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// スキーマで宣言されたキーだけを取り出し、既定値を適用する
///
/// スキーマ外のキーはプロビジョニング要求へ伝播しません。
pub fn apply_defaults(schema: &[FieldSpec], mapping: &Mapping) -> Mapping {
    let mut out = Mapping::new();
    for field in schema {
        if let Some(value) = mapping.get(field.key) {
            out.insert(Value::String(field.key.to_string()), value.clone());
        } else if let Some(default) = field.default {
            out.insert(Value::String(field.key.to_string()), default.to_value());
        }
    }
    out
}
