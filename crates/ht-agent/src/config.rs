//! The config-write seam between the driver and the model's native format.

use std::fs;
use std::path::PathBuf;

use ht_types::{HtResult, ModelError, ParamUpdate};
use serde_json::{Map, Value};
use tracing::debug;

/// Serializes parameter values into the external model's configuration.
///
/// Implementations own the model's native format (namelist, ini, yaml, ...);
/// the driver only hands over `{name, value, model}` rows.
pub trait ConfigWriter: Send {
    fn write(&mut self, iteration: u32, updates: &[ParamUpdate], id: &str) -> HtResult<()>;
}

/// Reference writer for models configured by a JSON document.
///
/// Values are merged into the existing document under
/// `{target_model}.{parameter_name}`, preserving unrelated keys.
#[derive(Debug, Clone)]
pub struct JsonConfigWriter {
    path: PathBuf,
}

impl JsonConfigWriter {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigWriter for JsonConfigWriter {
    fn write(&mut self, iteration: u32, updates: &[ParamUpdate], id: &str) -> HtResult<()> {
        let mut doc: Value = match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| ModelError::ConfigWrite {
                iteration,
                message: format!("existing config {} is not JSON: {}", self.path.display(), e),
            })?,
            Err(_) => Value::Object(Map::new()),
        };

        let root = doc.as_object_mut().ok_or_else(|| ModelError::ConfigWrite {
            iteration,
            message: format!("config root of {} is not an object", self.path.display()),
        })?;

        for update in updates {
            let section = root
                .entry(update.model.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            let section = section.as_object_mut().ok_or_else(|| ModelError::ConfigWrite {
                iteration,
                message: format!("config section `{}` is not an object", update.model),
            })?;
            section.insert(update.name.clone(), Value::from(update.value));
        }

        fs::write(&self.path, serde_json::to_string_pretty(&doc)?)?;
        debug!(iteration, id, path = %self.path.display(), "updated model config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn updates() -> Vec<ParamUpdate> {
        vec![
            ParamUpdate {
                name: "maxsmc".into(),
                value: 0.45,
                model: "cfe".into(),
            },
            ParamUpdate {
                name: "refkdt".into(),
                value: 2.1,
                model: "noah".into(),
            },
        ]
    }

    #[test]
    fn creates_document_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut writer = JsonConfigWriter::new(&path);

        writer.write(0, &updates(), "basin01").unwrap();
        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["cfe"]["maxsmc"], json!(0.45));
        assert_eq!(doc["noah"]["refkdt"], json!(2.1));
    }

    #[test]
    fn merge_preserves_unrelated_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"cfe": {"maxsmc": 0.3, "forcing": "aorc.csv"}, "time": {"dt": 3600}}"#,
        )
        .unwrap();

        let mut writer = JsonConfigWriter::new(&path);
        writer.write(2, &updates(), "basin01").unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["cfe"]["maxsmc"], json!(0.45));
        assert_eq!(doc["cfe"]["forcing"], json!("aorc.csv"));
        assert_eq!(doc["time"]["dt"], json!(3600));
    }

    #[test]
    fn non_json_existing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "&param maxsmc = 0.3 /").unwrap();

        let mut writer = JsonConfigWriter::new(&path);
        assert!(writer.write(0, &updates(), "basin01").is_err());
    }
}
