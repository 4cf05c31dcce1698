//! Layered application configuration.
//!
//! Sources are applied in the order they were added; each one is deep-merged
//! over the previous result and the final tree is deserialised into the
//! caller's type.
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use keel::ConfigurationBuilder;
//!
//! #[derive(Deserialize)]
//! struct Settings {
//!     port: u16,
//! }
//!
//! let settings: Settings = ConfigurationBuilder::new()
//!     .add_json_file("config.json")
//!     .add_environment_variables("APP_")
//!     .build()
//!     .unwrap();
//! ```
//!
//! Environment keys are split on `__` into nested objects, so
//! `APP_DATABASE__HOST=db` becomes `{ "DATABASE": { "HOST": "db" } }` under
//! the `APP_` prefix. Environment values are always strings.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Error;

#[derive(Clone, Debug)]
enum Source {
    Json(PathBuf),
    Environment { prefix: Option<String> },
    EnvironmentFile { path: PathBuf, prefix: Option<String> },
}

#[derive(Clone, Debug, Default)]
pub struct ConfigurationBuilder {
    sources: Vec<Source>,
}

impl ConfigurationBuilder {
    pub fn new() -> Self { Self::default() }

    pub fn add_json_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.sources.push(Source::Json(path.as_ref().to_path_buf()));
        self
    }

    /// Process environment variables whose name starts with `prefix`
    /// (compared case-insensitively). An empty prefix takes every variable.
    pub fn add_environment_variables(&mut self, prefix: &str) -> &mut Self {
        self.sources.push(Source::Environment { prefix: non_empty(prefix) });
        self
    }

    /// A dotenv file, read like environment variables. The process
    /// environment is left untouched.
    pub fn add_environment_file(&mut self, path: impl AsRef<Path>, prefix: &str) -> &mut Self {
        self.sources.push(Source::EnvironmentFile { path: path.as_ref().to_path_buf(), prefix: non_empty(prefix) });
        self
    }

    /// Merges every source into one JSON tree.
    pub fn build_value(&self) -> Result<Value, Error> {
        let mut merged = Value::Object(Map::new());
        for source in &self.sources {
            let value = match source {
                Source::Json(path) => {
                    let raw = std::fs::read_to_string(path)
                        .map_err(|e| Error::Config(format!("cannot read `{}`: {e}", path.display())))?;
                    serde_json::from_str(&raw)
                        .map_err(|e| Error::Config(format!("invalid JSON in `{}`: {e}", path.display())))?
                }
                Source::Environment { prefix } => environment_tree(prefix.as_deref(), std::env::vars()),
                Source::EnvironmentFile { path, prefix } => {
                    let vars = dotenvy::from_path_iter(path)
                        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
                        .map_err(|e| Error::Config(format!("cannot read `{}`: {e}", path.display())))?;
                    environment_tree(prefix.as_deref(), vars)
                }
            };
            debug!(?source, "configuration source loaded");
            merge(&mut merged, value);
        }
        Ok(merged)
    }

    pub fn build<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.build_value()?).map_err(|e| Error::Config(e.to_string()))
    }
}

fn non_empty(prefix: &str) -> Option<String> {
    (!prefix.is_empty()).then(|| prefix.to_owned())
}

/// Turns `KEY__SUB=value` pairs into a nested object, keeping only keys
/// that carry `prefix` and stripping it.
fn environment_tree(prefix: Option<&str>, vars: impl IntoIterator<Item = (String, String)>) -> Value {
    let mut tree = Value::Object(Map::new());
    for (key, value) in vars {
        let key = match prefix {
            Some(prefix) => match strip_prefix_ignore_case(&key, prefix) {
                Some(rest) => rest,
                None => continue,
            },
            None => key.as_str(),
        };
        let branch = key
            .rsplit("__")
            .fold(Value::String(value), |inner, section| {
                let mut object = Map::new();
                object.insert(section.to_owned(), inner);
                Value::Object(object)
            });
        merge(&mut tree, branch);
    }
    tree
}

fn strip_prefix_ignore_case<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let head = key.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &key[prefix.len()..])
}

/// Objects merge key by key; anything else in `source` replaces `target`.
fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => merge(existing, value),
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("keel-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn environment_keys_nest_on_double_underscore() {
        let tree = environment_tree(
            Some("app_"),
            vars(&[("APP_DATABASE__HOST", "db"), ("APP_DATABASE__PORT", "5432"), ("OTHER", "x")]),
        );
        assert_eq!(tree, json!({ "DATABASE": { "HOST": "db", "PORT": "5432" } }));
    }

    #[test]
    fn no_prefix_takes_every_variable() {
        let tree = environment_tree(None, vars(&[("A", "1"), ("B__C", "2")]));
        assert_eq!(tree, json!({ "A": "1", "B": { "C": "2" } }));
    }

    #[test]
    fn later_sources_win_and_objects_merge() {
        let mut base = json!({ "server": { "port": 80, "host": "localhost" }, "tags": [1] });
        merge(&mut base, json!({ "server": { "port": 8080 }, "tags": [2, 3] }));
        assert_eq!(base, json!({ "server": { "port": 8080, "host": "localhost" }, "tags": [2, 3] }));
    }

    #[test]
    fn builds_typed_configuration_from_files() {
        #[derive(Deserialize)]
        struct Settings {
            name: String,
            #[serde(rename = "LEVEL")]
            level: String,
        }

        let json = temp_file("settings.json", r#"{ "name": "keel", "LEVEL": "info" }"#);
        let env = temp_file("settings.env", "KEEL_LEVEL=debug\nUNRELATED=1\n");

        let settings: Settings = ConfigurationBuilder::new()
            .add_json_file(&json)
            .add_environment_file(&env, "KEEL_")
            .build()
            .unwrap();

        assert_eq!(settings.name, "keel");
        assert_eq!(settings.level, "debug");
        assert!(std::env::var("KEEL_LEVEL").is_err());

        std::fs::remove_file(json).ok();
        std::fs::remove_file(env).ok();
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = ConfigurationBuilder::new().add_json_file("/nonexistent/keel.json").build_value().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
