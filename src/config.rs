use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Rewrite output file names into valid drawable resource names.
    pub sanitize_names: bool,
    pub extension: String,
    pub continue_on_error: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sanitize_names: false,
            extension: "xml".to_string(),
            continue_on_error: false,
        }
    }
}

/// External program run on every written drawable, e.g. an XML minifier.
/// The output path is appended to `args`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OptimizerConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub output: OutputConfig,
    pub optimizer: OptimizerConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutputConfigFile {
    sanitize_names: Option<bool>,
    extension: Option<String>,
    continue_on_error: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OptimizerConfigFile {
    command: Option<String>,
    args: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    output: Option<OutputConfigFile>,
    optimizer: Option<OptimizerConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let parsed: ConfigFile = serde_json::from_str(&contents)
        .with_context(|| format!("parsing config {}", path.display()))?;

    if let Some(output) = parsed.output {
        if let Some(v) = output.sanitize_names {
            config.output.sanitize_names = v;
        }
        if let Some(v) = output.extension {
            config.output.extension = v.trim_start_matches('.').to_string();
        }
        if let Some(v) = output.continue_on_error {
            config.output.continue_on_error = v;
        }
    }
    if let Some(optimizer) = parsed.optimizer {
        if let Some(v) = optimizer.command.filter(|command| !command.trim().is_empty()) {
            config.optimizer.command = Some(v);
        }
        if let Some(v) = optimizer.args {
            config.optimizer.args = v;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.output.extension, "xml");
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svg2vd.json");
        std::fs::write(
            &path,
            r#"{"output": {"sanitizeNames": true, "extension": ".xml"},
                "optimizer": {"command": "avocado", "args": ["--quiet"]}}"#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert!(config.output.sanitize_names);
        assert!(!config.output.continue_on_error);
        assert_eq!(config.output.extension, "xml");
        assert_eq!(config.optimizer.command.as_deref(), Some("avocado"));
        assert_eq!(config.optimizer.args, vec!["--quiet".to_string()]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let error = load_config(Some(&path)).unwrap_err();
        assert!(error.to_string().contains("parsing config"));
    }
}
