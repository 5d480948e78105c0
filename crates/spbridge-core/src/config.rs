use crate::error::{ConfigError, ConfigResult};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

const DEFAULTS: &str = include_str!("../../../config/default.toml");

/// Settings for the prompt dispatcher: the completion API and the tool
/// server it asks that API to launch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub openai: OpenAIConfig,
    pub mcp_server: McpServerConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub command: String,
    /// Whitespace-separated argument string, as read from `MCP_SERVER_ARGS`.
    #[serde(default)]
    pub args: String,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SharePointSettings {
    #[serde(default)]
    pub site_url: Option<String>,
    pub library: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub authority_url: String,
    pub timeout_seconds: u64,
}

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    AccessToken(String),
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl DispatcherConfig {
    pub fn load() -> ConfigResult<Self> {
        let files = layered_files()?;
        Self::from_sources(
            &files,
            config::Environment::with_prefix("OPENAI"),
            config::Environment::with_prefix("MCP_SERVER"),
        )
    }

    pub fn from_sources(
        files: &config::Config,
        openai_env: config::Environment,
        server_env: config::Environment,
    ) -> ConfigResult<Self> {
        let config = Self {
            openai: load_section(files, "openai", openai_env)?,
            mcp_server: load_section(files, "mcp_server", server_env)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.openai.model.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "openai.model".to_string(),
                value: self.openai.model.clone(),
            });
        }
        if !(0.0..=2.0).contains(&self.openai.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "openai.temperature".to_string(),
                value: self.openai.temperature.to_string(),
            });
        }
        if self.mcp_server.command.trim().is_empty() {
            return Err(ConfigError::MissingField("mcp_server.command".to_string()));
        }
        Ok(())
    }
}

impl OpenAIConfig {
    /// The API key, or `EnvVarNotFound` when neither the environment nor a
    /// config file supplied one.
    pub fn require_api_key(&self) -> ConfigResult<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::EnvVarNotFound("OPENAI_API_KEY".to_string()))
    }
}

impl fmt::Debug for OpenAIConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAIConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl McpServerConfig {
    pub fn args_list(&self) -> Vec<String> {
        self.args.split_whitespace().map(String::from).collect()
    }
}

impl SharePointSettings {
    pub fn from_env() -> ConfigResult<Self> {
        let files = layered_files()?;
        Self::from_sources(&files, config::Environment::with_prefix("SHAREPOINT"))
    }

    pub fn from_sources(files: &config::Config, env: config::Environment) -> ConfigResult<Self> {
        let settings: Self = load_section(files, "sharepoint", env)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.site_url()?;
        self.credentials()?;
        if self.library.trim().is_empty() {
            return Err(ConfigError::MissingField("SHAREPOINT_LIBRARY".to_string()));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "sharepoint.timeout_seconds".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn site_url(&self) -> ConfigResult<Url> {
        let raw = self
            .site_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField("SHAREPOINT_SITE_URL".to_string()))?;

        let url = Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidValue {
            field: "SHAREPOINT_SITE_URL".to_string(),
            value: raw.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "SHAREPOINT_SITE_URL".to_string(),
                value: raw.to_string(),
            });
        }
        Ok(url)
    }

    pub fn credentials(&self) -> ConfigResult<Credentials> {
        fn present(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        }

        if let Some(token) = present(&self.access_token) {
            return Ok(Credentials::AccessToken(token));
        }

        match (
            present(&self.tenant_id),
            present(&self.client_id),
            present(&self.client_secret),
        ) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                Ok(Credentials::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret,
                })
            }
            _ => Err(ConfigError::MissingField(
                "SHAREPOINT_ACCESS_TOKEN or SHAREPOINT_TENANT_ID/SHAREPOINT_CLIENT_ID/SHAREPOINT_CLIENT_SECRET"
                    .to_string(),
            )),
        }
    }

    /// Server-relative path of the configured document library.
    ///
    /// An absolute `library` value is used verbatim; a bare library name is
    /// placed under the site path, so `https://contoso.sharepoint.com/sites/team`
    /// with `Shared Documents` yields `/sites/team/Shared Documents`.
    pub fn default_library(&self) -> ConfigResult<String> {
        let library = self.library.trim().trim_end_matches('/');
        if library.starts_with('/') {
            return Ok(library.to_string());
        }
        let site = self.site_url()?;
        let site_path = site.path().trim_end_matches('/');
        Ok(format!("{}/{}", site_path, library))
    }
}

impl fmt::Debug for SharePointSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharePointSettings")
            .field("site_url", &self.site_url)
            .field("library", &self.library)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("authority_url", &self.authority_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Credentials::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

/// Built-in defaults overlaid with the user's config file, if any.
pub fn layered_files() -> ConfigResult<config::Config> {
    let mut settings = config::Config::builder().add_source(config::File::from_str(
        DEFAULTS,
        config::FileFormat::Toml,
    ));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            tracing::debug!(path = %user_config.display(), "loading user configuration");
            settings = settings.add_source(config::File::from(user_config).required(false));
        }
    }

    Ok(settings.build()?)
}

pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sharepoint-bridge").join("config.toml"))
}

/// Deserializes one table of the file configuration, with matching
/// environment variables taking precedence over file values.
fn load_section<T: DeserializeOwned>(
    files: &config::Config,
    section: &str,
    env: config::Environment,
) -> ConfigResult<T> {
    let mut builder = config::Config::builder();
    for (key, value) in files.get_table(section)? {
        builder = builder.set_default(key, value)?;
    }
    Ok(builder.add_source(env).build()?.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    
    fn files_with(extra: &str) -> config::Config {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
            .add_source(config::File::from_str(extra, config::FileFormat::Toml))
            .build()
            .unwrap()
    }

    fn no_env() -> config::Environment {
        config::Environment::with_prefix("SPBRIDGE_TEST_UNSET_PREFIX")
    }

    #[test]
    fn test_dispatcher_defaults() {
        let config = DispatcherConfig::from_sources(&files_with(""), no_env(), no_env()).unwrap();

        assert_eq!(config.openai.model, "gpt-4.1-mini");
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
        assert!((config.openai.temperature - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.mcp_server.command, "sharepoint-mcp");
        assert!(config.mcp_server.args_list().is_empty());
        assert!(config.openai.require_api_key().is_err());
    }

    #[test]
    fn test_server_args_are_whitespace_split() {
        let files = files_with("[mcp_server]\ncommand = \"python\"\nargs = \"  mcp_server.py   --verbose \"\n");
        let config = DispatcherConfig::from_sources(&files, no_env(), no_env()).unwrap();

        assert_eq!(config.mcp_server.command, "python");
        assert_eq!(config.mcp_server.args_list(), vec!["mcp_server.py", "--verbose"]);
    }

    #[test]
    fn test_dispatcher_rejects_out_of_range_temperature() {
        let files = files_with("[openai]\ntemperature = 3.5\n");
        let err = DispatcherConfig::from_sources(&files, no_env(), no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "openai.temperature"));
    }

    #[test]
    fn test_blank_api_key_is_missing() {
        let files = files_with("[openai]\napi_key = \"  \"\n");
        let config = DispatcherConfig::from_sources(&files, no_env(), no_env()).unwrap();
        assert!(matches!(
            config.openai.require_api_key(),
            Err(ConfigError::EnvVarNotFound(_))
        ));
    }

    #[test]
    fn test_sharepoint_requires_site_url() {
        let files = files_with("[sharepoint]\naccess_token = \"token\"\n");
        let err = SharePointSettings::from_sources(&files, no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "SHAREPOINT_SITE_URL"));
    }

    #[test]
    fn test_sharepoint_requires_credentials() {
        let files = files_with(
            "[sharepoint]\nsite_url = \"https://contoso.sharepoint.com/sites/team\"\nclient_id = \"abc\"\n",
        );
        let err = SharePointSettings::from_sources(&files, no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn test_sharepoint_rejects_non_http_site() {
        let files = files_with(
            "[sharepoint]\nsite_url = \"ftp://contoso.example/sites/team\"\naccess_token = \"t\"\n",
        );
        let err = SharePointSettings::from_sources(&files, no_env()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_client_secret_credentials() {
        let files = files_with(
            r#"
[sharepoint]
site_url = "https://contoso.sharepoint.com/sites/team"
tenant_id = "tenant"
client_id = "client"
client_secret = "secret"
"#,
        );
        let settings = SharePointSettings::from_sources(&files, no_env()).unwrap();
        assert_eq!(
            settings.credentials().unwrap(),
            Credentials::ClientSecret {
                tenant_id: "tenant".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
            }
        );
        assert!(!format!("{:?}", settings).contains("secret\""));
    }

    #[test]
    fn test_default_library_under_site_path() {
        let files = files_with(
            "[sharepoint]\nsite_url = \"https://contoso.sharepoint.com/sites/team/\"\naccess_token = \"t\"\n",
        );
        let settings = SharePointSettings::from_sources(&files, no_env()).unwrap();
        assert_eq!(settings.default_library().unwrap(), "/sites/team/Shared Documents");
    }

    #[test]
    fn test_absolute_library_is_kept() {
        let files = files_with(
            "[sharepoint]\nsite_url = \"https://contoso.sharepoint.com/sites/team\"\naccess_token = \"t\"\nlibrary = \"/sites/other/Docs/\"\n",
        );
        let settings = SharePointSettings::from_sources(&files, no_env()).unwrap();
        assert_eq!(settings.default_library().unwrap(), "/sites/other/Docs");
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[openai]\nmodel = \"gpt-4o\"").unwrap();

        let files = config::Config::builder()
            .add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
            .add_source(config::File::from(file.path().to_path_buf()))
            .build()
            .unwrap();
        let config = DispatcherConfig::from_sources(&files, no_env(), no_env()).unwrap();

        assert_eq!(config.openai.model, "gpt-4o");
        assert_eq!(config.openai.base_url, "https://api.openai.com/v1");
    }
}
