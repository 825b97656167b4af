use crate::error::{Error, Result};
use std::path::PathBuf;

/// Where a schema definition is read from before registration.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// An `.avsc` file on disk
    File(PathBuf),
    /// A definition compiled into the binary, e.g. via `include_str!`
    Embedded {
        name: &'static str,
        definition: &'static str,
    },
}

impl SchemaSource {
    pub fn name(&self) -> String {
        match self {
            SchemaSource::File(path) => path.display().to_string(),
            SchemaSource::Embedded { name, .. } => format!("embedded:{name}"),
        }
    }

    pub async fn read(&self) -> Result<String> {
        match self {
            SchemaSource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| Error::SchemaSource {
                        source_name: self.name(),
                        message: e.to_string(),
                    })
            }
            SchemaSource::Embedded { definition, .. } => Ok(definition.to_string()),
        }
    }
}
