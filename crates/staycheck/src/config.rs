//! Harness configuration.
//!
//! Each key is looked up in four layers, highest first:
//!
//! | layer       | example                                   |
//! |-------------|-------------------------------------------|
//! | property    | `--browser firefox`, programmatic override |
//! | environment | `STAYCHECK_BROWSER=firefox`               |
//! | file        | `browser: firefox` in `staycheck.yaml`    |
//! | default     | `chrome`                                  |
//!
//! Values are trimmed and blank values fall through to the next layer.
//!
//! Each environment variable also has an unprefixed fallback (`BROWSER`,
//! `BASE_URL`, ...) read only when the `STAYCHECK_` name is unset. A bare
//! `BROWSER` that is not a backend name, such as the desktop browser path
//! many systems export, is ignored.

use crate::result::{HarnessError, HarnessResult};
use crate::session::{Backend, SessionConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "staycheck.yaml";

/// Default application under test
pub const DEFAULT_BASE_URL: &str = "https://automationintesting.online";

/// Recognised configuration keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKey {
    /// Browser backend
    Browser,
    /// Headless flag
    Headless,
    /// Remote WebDriver endpoint
    RemoteUrl,
    /// Application base URL
    BaseUrl,
    /// Implicit wait in seconds
    ImplicitWait,
    /// Page load timeout in seconds
    PageLoadTimeout,
}

impl ConfigKey {
    /// Every key
    pub const ALL: [Self; 6] = [
        Self::Browser,
        Self::Headless,
        Self::RemoteUrl,
        Self::BaseUrl,
        Self::ImplicitWait,
        Self::PageLoadTimeout,
    ];

    /// Property and file key
    #[must_use]
    pub const fn property(self) -> &'static str {
        match self {
            Self::Browser => "browser",
            Self::Headless => "headless",
            Self::RemoteUrl => "remoteUrl",
            Self::BaseUrl => "baseUrl",
            Self::ImplicitWait => "implicitWait",
            Self::PageLoadTimeout => "pageLoadTimeout",
        }
    }

    /// Environment variable
    #[must_use]
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::Browser => "STAYCHECK_BROWSER",
            Self::Headless => "STAYCHECK_HEADLESS",
            Self::RemoteUrl => "STAYCHECK_REMOTE_URL",
            Self::BaseUrl => "STAYCHECK_BASE_URL",
            Self::ImplicitWait => "STAYCHECK_IMPLICIT_WAIT",
            Self::PageLoadTimeout => "STAYCHECK_PAGE_LOAD_TIMEOUT",
        }
    }

    /// Unprefixed environment variable read when [`Self::env_var`] is unset
    #[must_use]
    pub const fn fallback_env_var(self) -> &'static str {
        match self {
            Self::Browser => "BROWSER",
            Self::Headless => "HEADLESS",
            Self::RemoteUrl => "REMOTE_URL",
            Self::BaseUrl => "BASE_URL",
            Self::ImplicitWait => "IMPLICIT_WAIT",
            Self::PageLoadTimeout => "PAGE_LOAD_TIMEOUT",
        }
    }

    /// Hardcoded fallback
    #[must_use]
    pub const fn default_value(self) -> &'static str {
        match self {
            Self::Browser => "chrome",
            Self::Headless => "false",
            Self::RemoteUrl => "",
            Self::BaseUrl => DEFAULT_BASE_URL,
            Self::ImplicitWait => "10",
            Self::PageLoadTimeout => "30",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property())
    }
}

/// Layer a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    /// Explicit property
    Property,
    /// Environment variable
    Environment,
    /// Configuration file
    File,
    /// Hardcoded default
    Default,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileConfig {
    browser: Option<Scalar>,
    headless: Option<Scalar>,
    remote_url: Option<Scalar>,
    base_url: Option<Scalar>,
    implicit_wait: Option<Scalar>,
    page_load_timeout: Option<Scalar>,
}

impl FileConfig {
    fn into_layer(self) -> BTreeMap<ConfigKey, String> {
        [
            (ConfigKey::Browser, self.browser),
            (ConfigKey::Headless, self.headless),
            (ConfigKey::RemoteUrl, self.remote_url),
            (ConfigKey::BaseUrl, self.base_url),
            (ConfigKey::ImplicitWait, self.implicit_wait),
            (ConfigKey::PageLoadTimeout, self.page_load_timeout),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v.into_string())))
        .collect()
    }
}

/// Raw values per layer, before resolution
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    properties: BTreeMap<ConfigKey, String>,
    environment: BTreeMap<ConfigKey, String>,
    file: BTreeMap<ConfigKey, String>,
}

impl ConfigSources {
    /// No layers besides defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit property
    #[must_use]
    pub fn with_property(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.properties.insert(key, value.into());
        self
    }

    /// Set a property only when `value` is `Some`
    #[must_use]
    pub fn with_optional_property(self, key: ConfigKey, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.with_property(key, value),
            None => self,
        }
    }

    /// Fill the environment layer using `lookup`
    #[must_use]
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        for key in ConfigKey::ALL {
            if let Some(value) = present(key.env_var()) {
                self.environment.insert(key, value);
                continue;
            }
            let Some(value) = present(key.fallback_env_var()) else {
                continue;
            };
            if key == ConfigKey::Browser && value.parse::<Backend>().is_err() {
                tracing::debug!(
                    variable = key.fallback_env_var(),
                    value = value.as_str(),
                    "ignoring value that is not a backend name"
                );
                continue;
            }
            self.environment.insert(key, value);
        }
        self
    }

    /// Fill the environment layer from the process environment
    #[must_use]
    pub fn with_process_env(self) -> Self {
        self.with_env_lookup(|name| std::env::var(name).ok())
    }

    /// Fill the file layer from YAML text
    pub fn with_yaml(mut self, yaml: &str) -> HarnessResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(self);
        }
        let file: FileConfig = serde_yaml_ng::from_str(yaml)?;
        self.file = file.into_layer();
        Ok(self)
    }

    /// Fill the file layer from `path`
    pub fn with_file(self, path: &Path) -> HarnessResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            HarnessError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        self.with_yaml(&text)
    }

    /// Fill the file layer from `path` if it exists
    pub fn with_optional_file(self, path: &Path) -> HarnessResult<Self> {
        if path.is_file() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// First non-blank trimmed value for `key` and the layer it came from
    #[must_use]
    pub fn lookup(&self, key: ConfigKey) -> (String, Layer) {
        let layers = [
            (&self.properties, Layer::Property),
            (&self.environment, Layer::Environment),
            (&self.file, Layer::File),
        ];
        layers
            .iter()
            .find_map(|(map, layer)| {
                map.get(&key)
                    .map(|v| v.trim())
                    .filter(|v| !v.is_empty())
                    .map(|v| (v.to_string(), *layer))
            })
            .unwrap_or_else(|| (key.default_value().to_string(), Layer::Default))
    }

    /// Resolve every key into a typed config
    pub fn resolve(&self) -> HarnessResult<HarnessConfig> {
        let browser = self.lookup(ConfigKey::Browser).0.parse::<Backend>()?;
        let headless = parse_bool(ConfigKey::Headless, &self.lookup(ConfigKey::Headless).0)?;
        let remote = self.lookup(ConfigKey::RemoteUrl).0;
        let remote_url = if remote.is_empty() {
            None
        } else {
            Some(parse_url(ConfigKey::RemoteUrl, &remote)?)
        };
        let base_url = parse_url(ConfigKey::BaseUrl, &self.lookup(ConfigKey::BaseUrl).0)?;
        let implicit_wait_secs =
            parse_secs(ConfigKey::ImplicitWait, &self.lookup(ConfigKey::ImplicitWait).0)?;
        let page_load_timeout_secs = parse_secs(
            ConfigKey::PageLoadTimeout,
            &self.lookup(ConfigKey::PageLoadTimeout).0,
        )?;
        let config = HarnessConfig {
            browser,
            headless,
            remote_url,
            base_url,
            implicit_wait_secs,
            page_load_timeout_secs,
        };
        tracing::debug!(?config, "configuration resolved");
        Ok(config)
    }
}

fn parse_bool(key: ConfigKey, value: &str) -> HarnessResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(HarnessError::config(format!(
            "{key}: expected a boolean, got '{other}'"
        ))),
    }
}

fn parse_secs(key: ConfigKey, value: &str) -> HarnessResult<u64> {
    value.parse::<u64>().map_err(|e| {
        HarnessError::config(format!("{key}: expected whole seconds, got '{value}' ({e})"))
    })
}

fn parse_url(key: ConfigKey, value: &str) -> HarnessResult<String> {
    let url = url::Url::parse(value)
        .map_err(|e| HarnessError::config(format!("{key}: invalid URL '{value}' ({e})")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(HarnessError::config(format!(
            "{key}: unsupported scheme '{}' in '{value}'",
            url.scheme()
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Resolved harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarnessConfig {
    /// Browser backend
    pub browser: Backend,
    /// Headless flag
    pub headless: bool,
    /// Remote endpoint, `None` for local
    pub remote_url: Option<String>,
    /// Application base URL, without trailing slash
    pub base_url: String,
    /// Implicit wait in seconds
    pub implicit_wait_secs: u64,
    /// Page load timeout in seconds
    pub page_load_timeout_secs: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            browser: Backend::Chrome,
            headless: false,
            remote_url: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            implicit_wait_secs: 10,
            page_load_timeout_secs: 30,
        }
    }
}

impl HarnessConfig {
    /// Resolve from properties, process environment and the optional file.
    ///
    /// An explicit `file` must exist; otherwise `staycheck.yaml` in the
    /// working directory is used when present.
    pub fn load(properties: ConfigSources, file: Option<&Path>) -> HarnessResult<Self> {
        let sources = properties.with_process_env();
        let sources = match file {
            Some(path) => sources.with_file(path)?,
            None => sources.with_optional_file(Path::new(CONFIG_FILE_NAME))?,
        };
        sources.resolve()
    }

    /// Session options for [`crate::SessionManager::acquire`]
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.browser)
            .with_headless(self.headless)
            .with_remote(self.remote_url.clone().unwrap_or_default())
            .with_implicit_wait(self.implicit_wait_secs)
            .with_page_load_timeout(self.page_load_timeout_secs)
    }

    /// Absolute URL for a path under the base URL
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    mod layering_tests {
        use super::*;

        #[test]
        fn test_defaults() {
            let config = ConfigSources::new().resolve().unwrap();
            assert_eq!(config, HarnessConfig::default());
            assert!(config.session_config().remote_endpoint.is_none());
        }

        #[test]
        fn test_property_beats_env_beats_file() {
            let sources = ConfigSources::new()
                .with_property(ConfigKey::Browser, "edge")
                .with_env_lookup(env(&[("STAYCHECK_BROWSER", "firefox"), ("IMPLICIT_WAIT", "4")]))
                .with_yaml("browser: safari\nimplicitWait: 7\npageLoadTimeout: 45\n")
                .unwrap();
            let config = sources.resolve().unwrap();
            assert_eq!(config.browser, Backend::Edge);
            assert_eq!(config.implicit_wait_secs, 4);
            assert_eq!(config.page_load_timeout_secs, 45);
            assert_eq!(sources.lookup(ConfigKey::Browser).1, Layer::Property);
            assert_eq!(sources.lookup(ConfigKey::PageLoadTimeout).1, Layer::File);
            assert_eq!(sources.lookup(ConfigKey::Headless).1, Layer::Default);
        }

        #[test]
        fn test_prefixed_env_beats_bare_fallback() {
            let sources = ConfigSources::new().with_env_lookup(env(&[
                ("STAYCHECK_BROWSER", "safari"),
                ("BROWSER", "firefox"),
                ("STAYCHECK_BASE_URL", "  "),
                ("BASE_URL", "https://staging.test"),
            ]));
            let config = sources.resolve().unwrap();
            assert_eq!(config.browser, Backend::Safari);
            assert_eq!(config.base_url, "https://staging.test");
            assert_eq!(sources.lookup(ConfigKey::BaseUrl).1, Layer::Environment);
        }

        #[test]
        fn test_desktop_browser_path_is_ignored() {
            let sources = ConfigSources::new()
                .with_env_lookup(env(&[("BROWSER", "/usr/bin/xdg-open")]))
                .with_yaml("browser: firefox\n")
                .unwrap();
            let config = sources.resolve().unwrap();
            assert_eq!(config.browser, Backend::Firefox);
            assert_eq!(sources.lookup(ConfigKey::Browser).1, Layer::File);

            let bare = ConfigSources::new().with_env_lookup(env(&[("BROWSER", "Edge")]));
            assert_eq!(bare.resolve().unwrap().browser, Backend::Edge);
        }

        #[test]
        fn test_blank_values_fall_through() {
            let sources = ConfigSources::new()
                .with_property(ConfigKey::BaseUrl, "   ")
                .with_env_lookup(env(&[("BASE_URL", " https://staging.test/ ")]));
            let config = sources.resolve().unwrap();
            assert_eq!(config.base_url, "https://staging.test");
            assert_eq!(config.url("/reservation/1"), "https://staging.test/reservation/1");
        }

        #[test]
        fn test_yaml_booleans_and_remote() {
            let config = ConfigSources::new()
                .with_yaml("headless: true\nremoteUrl: http://grid:4444/wd/hub\n")
                .unwrap()
                .resolve()
                .unwrap();
            assert!(config.headless);
            let session = config.session_config();
            assert!(session.headless);
            assert_eq!(session.remote_endpoint.as_deref(), Some("http://grid:4444/wd/hub"));
        }

        #[test]
        fn test_file_layer_from_disk() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "browser: firefox").unwrap();
            let config = ConfigSources::new()
                .with_file(file.path())
                .unwrap()
                .resolve()
                .unwrap();
            assert_eq!(config.browser, Backend::Firefox);
        }

        #[test]
        fn test_missing_explicit_file_is_config_error() {
            let err = ConfigSources::new()
                .with_file(Path::new("/definitely/not/here.yaml"))
                .unwrap_err();
            assert!(err.is_fatal_to_run());
        }
    }

    mod parse_tests {
        use super::*;

        #[test]
        fn test_invalid_values_are_config_errors() {
            for (key, value) in [
                (ConfigKey::Browser, "opera"),
                (ConfigKey::Headless, "maybe"),
                (ConfigKey::ImplicitWait, "-1"),
                (ConfigKey::PageLoadTimeout, "ten"),
                (ConfigKey::BaseUrl, "not a url"),
                (ConfigKey::RemoteUrl, "ftp://grid"),
            ] {
                let err = ConfigSources::new()
                    .with_property(key, value)
                    .resolve()
                    .unwrap_err();
                assert!(
                    matches!(err, HarnessError::Config { .. }),
                    "{key}={value} gave {err:?}"
                );
            }
        }

        #[test]
        fn test_bool_spellings() {
            assert!(parse_bool(ConfigKey::Headless, "TRUE").unwrap());
            assert!(parse_bool(ConfigKey::Headless, "1").unwrap());
            assert!(!parse_bool(ConfigKey::Headless, "off").unwrap());
        }

        #[test]
        fn test_malformed_yaml() {
            assert!(matches!(
                ConfigSources::new().with_yaml("browser: [unclosed"),
                Err(HarnessError::Yaml(_))
            ));
        }
    }
}
