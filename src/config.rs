//! Gateway client configuration.
//!
//! A [`GatewayConfig`] names the gateway endpoint, an optional request
//! timeout, and the credential set merged into every request. The credential
//! set is chosen explicitly by its `mode`; nothing here inspects the process
//! environment to switch between production and test accounts.
//!
//! ```json
//! {
//!   "api_url": "https://secure.goemerchant.com/secure/gateway/xmlgateway.aspx",
//!   "timeout_secs": 30,
//!   "credentials": {
//!     "mode": "production",
//!     "transaction_center_id": "$FA_TRANSACTION_CENTER_ID",
//!     "gateway_id": "${FA_GATEWAY_ID}",
//!     "processor_id": "$FA_PROCESSOR_ID"
//!   }
//! }
//! ```
//!
//! Any credential may be a literal or a `$VAR` / `${VAR}` reference, resolved
//! when the config is deserialized.

use serde::Deserialize;
use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;
use crate::xml::RequestFields;

/// Production endpoint of the XML gateway.
pub const DEFAULT_API_URL: &str = "https://secure.goemerchant.com/secure/gateway/xmlgateway.aspx";

/// Gateway client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "config_defaults::default_api_url")]
    api_url: LiteralOrEnv<Url>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    credentials: CredentialSet,
}

impl GatewayConfig {
    /// A config for the production endpoint with no timeout.
    pub fn new(credentials: CredentialSet) -> Self {
        Self {
            api_url: config_defaults::default_api_url(),
            timeout_secs: None,
            credentials,
        }
    }

    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = LiteralOrEnv::from_literal(api_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs());
        self
    }

    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.credentials
    }

    /// Reads a JSON config file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path = path
            .canonicalize()
            .map_err(|e| ConfigError::PathResolve(path.to_path_buf(), e))?;
        let content = fs::read_to_string(&path).map_err(|e| ConfigError::FileRead(path, e))?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}

mod config_defaults {
    use super::{DEFAULT_API_URL, LiteralOrEnv};
    use url::Url;

    pub fn default_api_url() -> LiteralOrEnv<Url> {
        LiteralOrEnv::from_literal(
            Url::parse(DEFAULT_API_URL).expect("DEFAULT_API_URL is a valid URL"),
        )
    }
}

/// Which account the client authenticates as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CredentialSet {
    Production(Credentials),
    Testing(TestCredentials),
}

impl CredentialSet {
    /// The authentication fields sent ahead of every request.
    pub fn fields(&self) -> RequestFields {
        let pairs: [(&str, &str); 3] = match self {
            CredentialSet::Production(credentials) => [
                ("transaction_center_id", credentials.transaction_center_id.as_str()),
                ("gateway_id", credentials.gateway_id.as_str()),
                ("processor_id", credentials.processor_id.as_str()),
            ],
            CredentialSet::Testing(credentials) => [
                ("merchant", credentials.merchant.as_str()),
                ("password", credentials.password.as_str()),
                ("gateway_id", credentials.gateway_id.as_str()),
            ],
        };
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }
}

/// Identifiers of a live merchant account.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub transaction_center_id: LiteralOrEnv<String>,
    pub gateway_id: LiteralOrEnv<String>,
    pub processor_id: LiteralOrEnv<String>,
}

impl Credentials {
    pub fn new<T, G, P>(transaction_center_id: T, gateway_id: G, processor_id: P) -> Self
    where
        T: Into<String>,
        G: Into<String>,
        P: Into<String>,
    {
        Self {
            transaction_center_id: LiteralOrEnv::from_literal(transaction_center_id.into()),
            gateway_id: LiteralOrEnv::from_literal(gateway_id.into()),
            processor_id: LiteralOrEnv::from_literal(processor_id.into()),
        }
    }
}

/// Identifiers of a sandbox account. Defaults to the gateway's public test merchant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TestCredentials {
    #[serde(default = "test_defaults::merchant")]
    pub merchant: LiteralOrEnv<String>,
    #[serde(default = "test_defaults::password")]
    pub password: LiteralOrEnv<String>,
    #[serde(default = "test_defaults::gateway_id")]
    pub gateway_id: LiteralOrEnv<String>,
}

impl Default for TestCredentials {
    fn default() -> Self {
        Self {
            merchant: test_defaults::merchant(),
            password: test_defaults::password(),
            gateway_id: test_defaults::gateway_id(),
        }
    }
}

mod test_defaults {
    use super::LiteralOrEnv;

    pub fn merchant() -> LiteralOrEnv<String> {
        LiteralOrEnv::from_literal("1264".to_string())
    }

    pub fn password() -> LiteralOrEnv<String> {
        LiteralOrEnv::from_literal("password".to_string())
    }

    pub fn gateway_id() -> LiteralOrEnv<String> {
        LiteralOrEnv::from_literal("a91c38c3-7d7f-4d29-acc7-927b4dca0dbe".to_string())
    }
}

/// A config value given literally or as an environment variable reference.
///
/// `"$NAME"` and `"${NAME}"` are replaced by the variable's value during
/// deserialization; anything else is parsed as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralOrEnv<T>(T);

impl<T> LiteralOrEnv<T> {
    pub fn from_literal(value: T) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }

    /// The variable named by `$NAME` or `${NAME}`, if `s` is such a reference.
    fn env_var_name(s: &str) -> Option<&str> {
        if let Some(braced) = s.strip_prefix("${") {
            return braced.strip_suffix('}').filter(|name| !name.is_empty());
        }
        let name = s.strip_prefix('$')?;
        let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        valid.then_some(name)
    }
}

impl<T> Deref for LiteralOrEnv<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for LiteralOrEnv<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let value = match Self::env_var_name(&s) {
            Some(name) => std::env::var(name).map_err(|_| {
                serde::de::Error::custom(format!(
                    "Environment variable '{name}' not found (referenced as '{s}')"
                ))
            })?,
            None => s,
        };
        value
            .parse::<T>()
            .map(LiteralOrEnv)
            .map_err(|e| serde::de::Error::custom(format!("Failed to parse value: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_config() {
        let config: GatewayConfig = serde_json::from_str(
            r#"{
                "timeout_secs": 15,
                "credentials": {
                    "mode": "production",
                    "transaction_center_id": "1234",
                    "gateway_id": "gw",
                    "processor_id": "proc"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.api_url().as_str(), DEFAULT_API_URL);
        assert_eq!(config.timeout(), Some(Duration::from_secs(15)));
        let fields = config.credentials().fields();
        let keys: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["transaction_center_id", "gateway_id", "processor_id"]);
        assert_eq!(fields["processor_id"], "proc");
    }

    #[test]
    fn test_testing_config_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{ "credentials": { "mode": "testing" } }"#).unwrap();
        assert_eq!(
            config.credentials(),
            &CredentialSet::Testing(TestCredentials::default())
        );
        let fields = config.credentials().fields();
        assert_eq!(fields["merchant"], "1264");
        assert_eq!(fields["password"], "password");
        assert_eq!(fields["gateway_id"], "a91c38c3-7d7f-4d29-acc7-927b4dca0dbe");
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_env_var_credentials() {
        // SAFETY: the variable names are unique to this test.
        unsafe {
            std::env::set_var("FA_TEST_CONFIG_CENTER_ID", "center-from-env");
            std::env::set_var("FA_TEST_CONFIG_GATEWAY_ID", "gateway-from-env");
        }
        let config: GatewayConfig = serde_json::from_str(
            r#"{
                "api_url": "http://localhost:8080/xml",
                "credentials": {
                    "mode": "production",
                    "transaction_center_id": "$FA_TEST_CONFIG_CENTER_ID",
                    "gateway_id": "${FA_TEST_CONFIG_GATEWAY_ID}",
                    "processor_id": "literal"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.api_url().as_str(), "http://localhost:8080/xml");
        let fields = config.credentials().fields();
        assert_eq!(fields["transaction_center_id"], "center-from-env");
        assert_eq!(fields["gateway_id"], "gateway-from-env");
        assert_eq!(fields["processor_id"], "literal");
    }

    #[test]
    fn test_missing_env_var_fails() {
        let result: Result<GatewayConfig, _> = serde_json::from_str(
            r#"{ "credentials": { "mode": "testing", "password": "$FA_TEST_CONFIG_UNSET_VAR" } }"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("FA_TEST_CONFIG_UNSET_VAR"));
    }

    #[test]
    fn test_empty_braced_reference_is_literal() {
        let config: GatewayConfig = serde_json::from_str(
            r#"{ "credentials": { "mode": "testing", "password": "${}" } }"#,
        )
        .unwrap();
        assert_eq!(config.credentials().fields()["password"], "${}");
    }

    #[test]
    fn test_invalid_url_fails() {
        let result: Result<GatewayConfig, _> = serde_json::from_str(
            r#"{ "api_url": "not a url", "credentials": { "mode": "testing" } }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_mode_fails() {
        let result: Result<GatewayConfig, _> =
            serde_json::from_str(r#"{ "credentials": { "mode": "staging" } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_env_var_name_syntax() {
        assert_eq!(LiteralOrEnv::<String>::env_var_name("$VAR_1"), Some("VAR_1"));
        assert_eq!(LiteralOrEnv::<String>::env_var_name("${VAR}"), Some("VAR"));
        assert_eq!(LiteralOrEnv::<String>::env_var_name("$"), None);
        assert_eq!(LiteralOrEnv::<String>::env_var_name("${}"), None);
        assert_eq!(LiteralOrEnv::<String>::env_var_name("$a-b"), None);
        assert_eq!(LiteralOrEnv::<String>::env_var_name("plain"), None);
    }

    #[test]
    fn test_load_from_path() {
        let path = std::env::temp_dir().join(format!(
            "fa-gateway-config-{}.json",
            std::process::id()
        ));
        fs::write(&path, r#"{ "credentials": { "mode": "testing", "merchant": "42" } }"#)
            .unwrap();
        let config = GatewayConfig::load_from_path(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.credentials().fields()["merchant"], "42");
    }

    #[test]
    fn test_load_from_missing_path() {
        let result = GatewayConfig::load_from_path("/nonexistent/fa-gateway.json");
        assert!(matches!(result, Err(ConfigError::PathResolve(_, _))));
    }

    #[test]
    fn test_builder() {
        let config = GatewayConfig::new(CredentialSet::Production(Credentials::new("a", "b", "c")))
            .with_api_url(Url::parse("http://127.0.0.1:9000/").unwrap())
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.api_url().as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.timeout(), Some(Duration::from_secs(5)));
    }
}
