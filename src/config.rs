use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of `config.toml`. Every key is optional; CLI flags win over it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Bot to talk to ("zhipu" or "echo").
    pub provider: Option<String>,

    /// GLM-4 API key; `ZHIPU_API_KEY` takes precedence.
    pub api_key: Option<String>,

    pub model: Option<String>,

    /// API root, e.g. a proxy in front of open.bigmodel.cn.
    pub base_url: Option<String>,

    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

impl Config {
    /// Read `path` if it exists; a missing file means "no config".
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read config: {}", path.display()))
            }
        };
        toml::from_str(&text)
            .map(Some)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_optional(dir.path().join("config.toml")).unwrap().is_none());
    }

    #[test]
    fn parses_all_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
provider = "zhipu"
api_key = "abc.def"
model = "glm-4-flash"
base_url = "http://localhost:8080/v4/"
max_tokens = 512
temperature = 0.2
"#,
        )
        .unwrap();

        let cfg = Config::load_optional(&path).unwrap().unwrap();
        assert_eq!(cfg.provider.as_deref(), Some("zhipu"));
        assert_eq!(cfg.api_key.as_deref(), Some("abc.def"));
        assert_eq!(cfg.model.as_deref(), Some("glm-4-flash"));
        assert_eq!(cfg.base_url.as_deref(), Some("http://localhost:8080/v4/"));
        assert_eq!(cfg.max_tokens, Some(512));
        assert_eq!(cfg.temperature, Some(0.2));
    }

    #[test]
    fn bad_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_tokens = \"many\"").unwrap();
        let err = Config::load_optional(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse TOML"));
    }
}
