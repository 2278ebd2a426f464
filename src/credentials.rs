use std::fmt;

/// Environment variable consulted by [`EnvCredentials`].
pub const API_KEY_ENV: &str = "ZHIPU_API_KEY";

/// Where the provider's API key comes from.
///
/// Read on every request, so a source may pick up a rotated key between turns.
pub trait CredentialSource: Send + Sync {
    /// The API key, or `None` when none is configured. Blank keys count as absent.
    fn api_key(&self) -> Option<String>;
}

/// A fixed key supplied by the host.
#[derive(Clone, Default)]
pub struct StaticCredentials {
    key: Option<String>,
}

impl StaticCredentials {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

impl CredentialSource for StaticCredentials {
    fn api_key(&self) -> Option<String> {
        non_blank(self.key.clone())
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `ZHIPU_API_KEY` from the environment, falling back to a configured key.
#[derive(Clone, Default)]
pub struct EnvCredentials {
    fallback: Option<String>,
}

impl EnvCredentials {
    pub fn new(fallback: Option<String>) -> Self {
        Self { fallback }
    }
}

impl CredentialSource for EnvCredentials {
    fn api_key(&self) -> Option<String> {
        non_blank(std::env::var(API_KEY_ENV).ok()).or_else(|| non_blank(self.fallback.clone()))
    }
}

impl fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvCredentials")
            .field("var", &API_KEY_ENV)
            .field("fallback", &self.fallback.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_blank(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_static_key_is_absent() {
        assert_eq!(StaticCredentials::new("   ").api_key(), None);
        assert_eq!(StaticCredentials::none().api_key(), None);
        assert_eq!(StaticCredentials::new("k-1").api_key().as_deref(), Some("k-1"));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let dbg = format!("{:?}", StaticCredentials::new("secret-key"));
        assert!(!dbg.contains("secret-key"));
        let dbg = format!("{:?}", EnvCredentials::new(Some("secret-key".into())));
        assert!(!dbg.contains("secret-key"));
    }
}
