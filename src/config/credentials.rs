//! Credentials handed to provider constructors.

/// API key and endpoint for one backend.
///
/// Providers never read the environment themselves; the CLI and server
/// resolve credentials once at start-up and pass them in.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderCredentials {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self { api_key, base_url }
    }

    /// Read the API key from the named environment variable.
    pub fn from_env(api_key_env: &str, base_url: Option<String>) -> Self {
        let api_key = std::env::var(api_key_env).ok().filter(|k| !k.trim().is_empty());
        Self { api_key, base_url }
    }
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}
