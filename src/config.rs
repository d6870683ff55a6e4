use crate::constants::{
    DEFAULT_API_GROUP, DEFAULT_BIND, DEFAULT_CLUSTER_HOST, DEFAULT_CLUSTER_TIMEOUT_MS,
    DEFAULT_REALM,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use config::{Config as SettingsLoader, Environment};
use serde::Deserialize;
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    pub host: String,
    pub timeout_ms: u64,
    pub insecure: bool,
    pub ca_file: Option<PathBuf>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_CLUSTER_HOST.to_string(),
            timeout_ms: DEFAULT_CLUSTER_TIMEOUT_MS,
            insecure: false,
            ca_file: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub realm: String,
    pub token_realm: Option<String>,
    pub token_service: Option<String>,
    pub api_group: String,
    pub cluster: ClusterConfig,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawEnvConfig {
    config: Option<String>,
    config_base64: Option<String>,
    bind: Option<String>,
    realm: Option<String>,
    token_realm: Option<String>,
    token_service: Option<String>,
    api_group: Option<String>,
    cluster_host: Option<String>,
    cluster_timeout_ms: Option<String>,
    cluster_insecure: Option<String>,
    cluster_ca_file: Option<String>,
    log_level: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let env_cfg = load_imagegate_env()?;
        let mut cfg = Self::defaults();
        cfg.apply_env_config_sources_if_present(&env_cfg)?;
        cfg.apply_env_overrides(&env_cfg);
        Ok(cfg)
    }

    pub fn from_env_with_config_file(config_path: PathBuf) -> Result<Self, String> {
        let env_cfg = load_imagegate_env()?;
        // An explicit file replaces IMAGEGATE_CONFIG / IMAGEGATE_CONFIG_BASE64.
        let mut cfg = Self::from_yaml_file(config_path)?;
        cfg.apply_env_overrides(&env_cfg);
        Ok(cfg)
    }

    pub fn defaults() -> Self {
        Self {
            bind: DEFAULT_BIND
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 5080))),
            realm: DEFAULT_REALM.to_string(),
            token_realm: None,
            token_service: None,
            api_group: DEFAULT_API_GROUP.to_string(),
            cluster: ClusterConfig::default(),
            log_level: "info".to_string(),
        }
    }

    fn apply_env_config_sources_if_present(
        &mut self,
        env_cfg: &RawEnvConfig,
    ) -> Result<(), String> {
        let config_path = env_cfg
            .config
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let config_b64 = env_cfg
            .config_base64
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty());

        match (config_path, config_b64) {
            (Some(_), Some(_)) => Err(
                "IMAGEGATE_CONFIG and IMAGEGATE_CONFIG_BASE64 are both set; use only one"
                    .to_string(),
            ),
            (Some(path), None) => {
                *self = Self::from_yaml_file(PathBuf::from(path))
                    .map_err(|err| format!("failed to load IMAGEGATE_CONFIG={path}: {err}"))?;
                Ok(())
            }
            (None, Some(value)) => {
                let compact = value
                    .chars()
                    .filter(|ch| !ch.is_ascii_whitespace())
                    .collect::<String>();
                let decoded = B64
                    .decode(compact)
                    .map_err(|err| format!("failed to decode IMAGEGATE_CONFIG_BASE64: {err}"))?;
                let yaml = String::from_utf8(decoded).map_err(|err| {
                    format!(
                        "failed to decode IMAGEGATE_CONFIG_BASE64: decoded bytes are not UTF-8 ({err})"
                    )
                })?;
                *self = Self::from_yaml_str("IMAGEGATE_CONFIG_BASE64", &yaml)
                    .map_err(|err| format!("failed to load IMAGEGATE_CONFIG_BASE64: {err}"))?;
                Ok(())
            }
            (None, None) => Ok(()),
        }
    }

    fn apply_env_overrides(&mut self, env_cfg: &RawEnvConfig) {
        if let Some(bind) = parse_env_value::<SocketAddr>(env_cfg.bind.as_deref()) {
            self.bind = bind;
        }
        if let Some(value) = env_cfg.realm.as_deref()
            && !value.trim().is_empty()
        {
            self.realm = value.trim().to_string();
        }
        if let Some(value) = env_cfg.token_realm.as_deref() {
            self.token_realm = empty_string_to_none(value.trim());
        }
        if let Some(value) = env_cfg.token_service.as_deref() {
            self.token_service = empty_string_to_none(value.trim());
        }
        if let Some(value) = env_cfg.api_group.as_deref() {
            self.api_group = value.trim().to_string();
        }
        if let Some(value) = env_cfg.cluster_host.as_deref()
            && !value.trim().is_empty()
        {
            self.cluster.host = normalize_host(value);
        }
        if let Some(parsed) = parse_env_value::<u64>(env_cfg.cluster_timeout_ms.as_deref()) {
            self.cluster.timeout_ms = parsed;
        }
        if let Some(parsed) = parse_env_value::<bool>(env_cfg.cluster_insecure.as_deref()) {
            self.cluster.insecure = parsed;
        }
        if let Some(value) = env_cfg.cluster_ca_file.as_deref() {
            self.cluster.ca_file = empty_string_to_none(value.trim()).map(PathBuf::from);
        }
        if let Some(value) = env_cfg.log_level.as_deref()
            && !value.trim().is_empty()
        {
            self.log_level = value.to_string();
        }
    }

    pub fn from_yaml_file(path: PathBuf) -> Result<Self, String> {
        let parsed = load_yaml_config(&path)?;
        Self::from_yaml_config(parsed)
    }

    pub fn from_yaml_str(source: &str, text: &str) -> Result<Self, String> {
        let parsed = serde_yaml::from_str::<YamlConfig>(text)
            .map_err(|err| format!("failed to parse {source}: {err}"))?;
        Self::from_yaml_config(parsed)
    }

    fn from_yaml_config(parsed: YamlConfig) -> Result<Self, String> {
        let defaults = Self::defaults();
        let bind = match parsed.listen.as_deref() {
            Some(listen) => listen
                .parse()
                .map_err(|err| format!("invalid listen address '{listen}': {err}"))?,
            None => defaults.bind,
        };

        let auth = parsed.auth.unwrap_or_default();
        // An empty realm in the file still falls back to the default.
        let realm = auth
            .realm
            .map(|realm| realm.trim().to_string())
            .filter(|realm| !realm.is_empty())
            .unwrap_or(defaults.realm);

        let cluster = parsed.cluster.unwrap_or_default();
        let api_group = cluster.api_group.unwrap_or(defaults.api_group);
        let cluster = ClusterConfig {
            host: cluster
                .host
                .as_deref()
                .map(normalize_host)
                .filter(|host| !host.is_empty())
                .unwrap_or(defaults.cluster.host),
            timeout_ms: cluster.timeout_ms.unwrap_or(DEFAULT_CLUSTER_TIMEOUT_MS),
            insecure: cluster.insecure.unwrap_or(false),
            ca_file: cluster.ca_file.map(PathBuf::from),
        };

        Ok(Self {
            bind,
            realm,
            token_realm: auth.token_realm.as_deref().and_then(empty_string_to_none),
            token_service: auth.token_service.as_deref().and_then(empty_string_to_none),
            api_group,
            cluster,
            log_level: parsed
                .log
                .and_then(|log| log.level)
                .unwrap_or(defaults.log_level),
        })
    }
}

fn load_yaml_config(path: &Path) -> Result<YamlConfig, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    serde_yaml::from_str::<YamlConfig>(&text)
        .map_err(|err| format!("failed to parse {}: {err}", path.display()))
}

fn load_imagegate_env() -> Result<RawEnvConfig, String> {
    let settings = SettingsLoader::builder()
        .add_source(Environment::with_prefix("IMAGEGATE").try_parsing(false))
        .build()
        .map_err(|err| format!("failed to load IMAGEGATE_* environment: {err}"))?;

    Ok(RawEnvConfig {
        config: env_value_for_var(&settings, "IMAGEGATE_CONFIG"),
        config_base64: env_value_for_var(&settings, "IMAGEGATE_CONFIG_BASE64"),
        bind: env_value_for_var(&settings, "IMAGEGATE_BIND"),
        realm: env_value_for_var(&settings, "IMAGEGATE_REALM"),
        token_realm: env_value_for_var(&settings, "IMAGEGATE_TOKEN_REALM"),
        token_service: env_value_for_var(&settings, "IMAGEGATE_TOKEN_SERVICE"),
        api_group: env_value_for_var(&settings, "IMAGEGATE_API_GROUP"),
        cluster_host: env_value_for_var(&settings, "IMAGEGATE_CLUSTER_HOST"),
        cluster_timeout_ms: env_value_for_var(&settings, "IMAGEGATE_CLUSTER_TIMEOUT_MS"),
        cluster_insecure: env_value_for_var(&settings, "IMAGEGATE_CLUSTER_INSECURE"),
        cluster_ca_file: env_value_for_var(&settings, "IMAGEGATE_CLUSTER_CA_FILE"),
        log_level: env_value_for_var(&settings, "IMAGEGATE_LOG_LEVEL"),
    })
}

fn env_value(settings: &SettingsLoader, key: &str) -> Option<String> {
    settings
        .get_string(key)
        .ok()
        .or_else(|| settings.get_string(&key.to_ascii_uppercase()).ok())
}

fn env_value_for_var(settings: &SettingsLoader, env_var: &str) -> Option<String> {
    let key = env_var
        .strip_prefix("IMAGEGATE_")
        .unwrap_or(env_var)
        .to_ascii_lowercase();
    env_value(settings, &key)
}

fn parse_env_value<T>(raw: Option<&str>) -> Option<T>
where
    T: std::str::FromStr,
{
    raw.and_then(|value| value.trim().parse::<T>().ok())
}

fn empty_string_to_none(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn normalize_host(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

#[derive(Debug, Deserialize)]
struct YamlConfig {
    listen: Option<String>,
    auth: Option<YamlAuth>,
    cluster: Option<YamlCluster>,
    log: Option<YamlLog>,
}

#[derive(Debug, Deserialize, Default)]
struct YamlAuth {
    realm: Option<String>,
    #[serde(rename = "token-realm", alias = "tokenRealm")]
    token_realm: Option<String>,
    #[serde(rename = "token-service", alias = "tokenService")]
    token_service: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct YamlCluster {
    host: Option<String>,
    #[serde(rename = "apiGroup")]
    api_group: Option<String>,
    #[serde(rename = "timeoutMs")]
    timeout_ms: Option<u64>,
    insecure: Option<bool>,
    #[serde(rename = "caFile")]
    ca_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YamlLog {
    level: Option<String>,
}
