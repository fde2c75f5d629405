//! YAML processing utilities for plans and planner payloads.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use yaml_rust_davvid::{yaml::Hash, Yaml, YamlEmitter};

/// Serializes `data` to YAML, emitting multi-line strings as block scalars.
///
/// Hunk excerpts and commit bodies stay legible this way, which matters
/// for planner prompts and hand-edited plan files alike.
pub fn to_yaml<T: Serialize>(data: &T) -> Result<String> {
    let value = serde_yaml::to_value(data).context("Failed to serialize to YAML value")?;

    let mut output = String::new();
    let mut emitter = YamlEmitter::new(&mut output);
    emitter.multiline_strings(true);
    emitter
        .dump(&to_emitter_value(&value))
        .context("Failed to emit YAML")?;

    // The emitter always opens a document; plan files and prompts don't need it.
    let body = output.strip_prefix("---\n").unwrap_or(&output);
    Ok(format!("{body}\n"))
}

fn to_emitter_value(value: &serde_yaml::Value) -> Yaml {
    match value {
        serde_yaml::Value::Null => Yaml::Null,
        serde_yaml::Value::Bool(b) => Yaml::Boolean(*b),
        serde_yaml::Value::Number(n) => n
            .as_i64()
            .map_or_else(|| Yaml::Real(n.to_string()), Yaml::Integer),
        serde_yaml::Value::String(s) => Yaml::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => Yaml::Array(seq.iter().map(to_emitter_value).collect()),
        serde_yaml::Value::Mapping(map) => {
            let mut hash = Hash::new();
            for (k, v) in map {
                hash.insert(to_emitter_value(k), to_emitter_value(v));
            }
            Yaml::Hash(hash)
        }
        serde_yaml::Value::Tagged(tagged) => to_emitter_value(&tagged.value),
    }
}

/// Deserializes a YAML string.
pub fn from_yaml<T: for<'de> Deserialize<'de>>(yaml: &str) -> Result<T> {
    serde_yaml::from_str(yaml).context("Failed to deserialize YAML")
}
