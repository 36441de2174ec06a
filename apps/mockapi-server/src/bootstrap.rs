use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use mockapi_core::{
    load_config, ConfigError, LogLevel, MockServerConfig, ProfileError, ProfileRegistry,
    ResponseResolver, SharedStorage,
};
use tracing::info;

use crate::access_log::{self, AccessLog};
use crate::app_state::AppState;

/// Config file read when `MOCKAPI_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "configs/mockapi.toml";

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error("invalid MOCKAPI_PORT: {0}")]
    InvalidPort(String),
    #[error("invalid MOCKAPI_BIND: {0}")]
    InvalidBind(String),
    #[error("invalid MOCKAPI_HTTP_MAX_CONC: {0}")]
    InvalidConcurrency(String),
    #[error("invalid MOCKAPI_LOG_LEVEL: {0}")]
    InvalidLogLevel(String),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("http server exited with error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Effective configuration plus the file it came from, if any.
#[derive(Clone, Debug)]
pub struct LoadedConfig {
    pub config: MockServerConfig,
    pub source: Option<PathBuf>,
}

/// Registry and resolver for `config`: static profiles, then the profile-root
/// scan, then the initially active profile.
pub async fn build_state(
    config: &MockServerConfig,
    storage: SharedStorage,
) -> Result<AppState, BootstrapError> {
    let mut registry = ProfileRegistry::new().with_fallback_base_dir(&config.fallback_base_dir);
    registry.add_static_profiles(config.static_profiles());
    registry
        .scan_and_register_from_root(config.profile_directory.as_deref(), storage.as_ref())
        .await?;
    if let Some(name) = config.initial_active_profile.as_deref() {
        registry.set_active_profile(name)?;
    }
    info!(
        profiles = registry.len(),
        active = ?registry.active_profile(),
        sibling_match = ?config.sibling_match,
        "profile registry ready"
    );
    let resolver = ResponseResolver::new(storage).with_sibling_match(config.sibling_match);
    Ok(AppState::new(registry, resolver))
}

/// Overlay `MOCKAPI_*` values from `lookup` onto `config`. Empty values are
/// ignored.
pub fn apply_overrides<F>(config: &mut MockServerConfig, lookup: F) -> Result<(), BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(raw) = var("MOCKAPI_PORT") {
        config.port = raw
            .trim()
            .parse()
            .map_err(|_| BootstrapError::InvalidPort(raw))?;
    }
    if let Some(raw) = var("MOCKAPI_BIND") {
        raw.trim()
            .parse::<IpAddr>()
            .map_err(|_| BootstrapError::InvalidBind(raw.clone()))?;
        config.bind = raw.trim().to_string();
    }
    if let Some(raw) = var("MOCKAPI_PROFILE_DIR") {
        config.profile_directory = Some(PathBuf::from(raw));
    }
    if let Some(raw) = var("MOCKAPI_ACTIVE_PROFILE") {
        config.initial_active_profile = Some(raw);
    }
    if let Some(raw) = var("MOCKAPI_LOG_LEVEL") {
        config.log_level = raw
            .parse::<LogLevel>()
            .map_err(|_| BootstrapError::InvalidLogLevel(raw))?;
    }
    if let Some(raw) = var("MOCKAPI_ACCESS_LOG") {
        config.access_log.enabled = matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        );
    }
    if let Some(raw) = var("MOCKAPI_ACCESS_LOG_DIR") {
        config.access_log.directory = Some(PathBuf::from(raw));
    }
    if let Some(raw) = var("MOCKAPI_HTTP_MAX_CONC") {
        config.concurrency_limit = raw
            .trim()
            .parse()
            .ok()
            .filter(|n: &usize| *n > 0)
            .ok_or_else(|| BootstrapError::InvalidConcurrency(raw))?;
    }
    Ok(())
}

/// Read the config file, apply environment overrides, then fill in the
/// built-in `default` profile when nothing else is configured.
pub fn load_server_config() -> Result<LoadedConfig, BootstrapError> {
    load_server_config_with(|key| std::env::var(key).ok(), Path::new(DEFAULT_CONFIG_PATH))
}

fn load_server_config_with<F>(lookup: F, default_path: &Path) -> Result<LoadedConfig, BootstrapError>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit = lookup("MOCKAPI_CONFIG")
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    let source = match explicit {
        Some(path) => Some(path),
        None if default_path.is_file() => Some(default_path.to_path_buf()),
        None => None,
    };
    let mut config = match source.as_deref() {
        Some(path) => load_config(path)?,
        None => MockServerConfig::default(),
    };
    apply_overrides(&mut config, lookup)?;
    config.apply_builtin_defaults();
    Ok(LoadedConfig { config, source })
}

pub(crate) fn socket_addr(config: &MockServerConfig) -> Result<SocketAddr, BootstrapError> {
    let ip: IpAddr = config
        .bind
        .trim()
        .parse()
        .map_err(|_| BootstrapError::InvalidBind(config.bind.clone()))?;
    Ok(SocketAddr::new(ip, config.port))
}

pub(crate) fn attach_http_layers(
    router: axum::Router<()>,
    config: &MockServerConfig,
    state: &AppState,
) -> axum::Router<()> {
    use tower::limit::ConcurrencyLimitLayer;
    use tower_http::trace::TraceLayer;

    let access = AccessLog::new(config.access_log.clone(), state.clone());
    router
        .layer(axum::middleware::from_fn_with_state(
            access,
            access_log::access_log_mw,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(ConcurrencyLimitLayer::new(config.concurrency_limit.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use mockapi_core::{MemoryStorage, SiblingMatch};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut cfg = MockServerConfig::default();
        apply_overrides(
            &mut cfg,
            env(&[
                ("MOCKAPI_PORT", "4010"),
                ("MOCKAPI_BIND", "0.0.0.0"),
                ("MOCKAPI_PROFILE_DIR", "profiles"),
                ("MOCKAPI_ACTIVE_PROFILE", "happy"),
                ("MOCKAPI_LOG_LEVEL", "WARN"),
                ("MOCKAPI_HTTP_MAX_CONC", "8"),
                ("MOCKAPI_ACCESS_LOG", "true"),
                ("MOCKAPI_ACCESS_LOG_DIR", "logs/access"),
            ]),
        )
        .expect("overrides");
        assert_eq!(cfg.port, 4010);
        assert_eq!(cfg.bind, "0.0.0.0");
        assert_eq!(cfg.profile_directory, Some(PathBuf::from("profiles")));
        assert_eq!(cfg.initial_active_profile.as_deref(), Some("happy"));
        assert_eq!(cfg.log_level, LogLevel::Warn);
        assert_eq!(cfg.concurrency_limit, 8);
        assert!(cfg.access_log.enabled);
        assert_eq!(cfg.access_log.directory, Some(PathBuf::from("logs/access")));
    }

    #[test]
    fn empty_overrides_are_ignored() {
        let mut cfg = MockServerConfig::default();
        apply_overrides(&mut cfg, env(&[("MOCKAPI_PORT", " "), ("MOCKAPI_BIND", "")]))
            .expect("overrides");
        assert_eq!(cfg, MockServerConfig::default());
    }

    #[test]
    fn malformed_overrides_are_rejected() {
        let cases = [
            ("MOCKAPI_PORT", "eighty"),
            ("MOCKAPI_BIND", "localhost:3000"),
            ("MOCKAPI_LOG_LEVEL", "chatty"),
            ("MOCKAPI_HTTP_MAX_CONC", "0"),
        ];
        for (key, value) in cases {
            let mut cfg = MockServerConfig::default();
            let err = apply_overrides(&mut cfg, env(&[(key, value)])).expect_err(key);
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn missing_config_file_uses_builtin_default_profile() {
        let dir = tempfile::tempdir().expect("tempdir");
        let loaded = load_server_config_with(env(&[]), &dir.path().join("mockapi.toml"))
            .expect("load");
        assert_eq!(loaded.source, None);
        assert_eq!(loaded.config.initial_active_profile.as_deref(), Some("default"));
        assert_eq!(
            loaded.config.profiles["default"].response_file_base_path,
            PathBuf::from("./resources/default")
        );
    }

    #[test]
    fn explicit_config_path_wins_over_default_location() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("mockapi.toml");
        std::fs::write(&default_path, "port = 1111").expect("write default");
        let explicit = dir.path().join("other.toml");
        std::fs::write(
            &explicit,
            "port = 2222\nsibling_match = \"strict\"\n[profiles.happy]\nresponse_file_base_path = \"fixtures/happy\"\n",
        )
        .expect("write explicit");

        let loaded = load_server_config_with(
            env(&[
                ("MOCKAPI_CONFIG", explicit.to_str().expect("utf8 path")),
                ("MOCKAPI_PORT", "3333"),
            ]),
            &default_path,
        )
        .expect("load");
        assert_eq!(loaded.source.as_deref(), Some(explicit.as_path()));
        assert_eq!(loaded.config.port, 3333);
        assert_eq!(loaded.config.sibling_match, SiblingMatch::Strict);
        assert_eq!(loaded.config.initial_active_profile, None);
        assert!(!loaded.config.profiles.contains_key("default"));

        let loaded = load_server_config_with(env(&[]), &default_path).expect("load default");
        assert_eq!(loaded.source.as_deref(), Some(default_path.as_path()));
        assert_eq!(loaded.config.port, 1111);
    }

    #[test]
    fn unreadable_config_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let err = load_server_config_with(
            env(&[("MOCKAPI_CONFIG", missing.to_str().expect("utf8 path"))]),
            &dir.path().join("mockapi.toml"),
        )
        .expect_err("missing explicit config");
        assert!(matches!(err, BootstrapError::Config(ConfigError::Read { .. })));
    }

    #[test]
    fn socket_addr_combines_bind_and_port() {
        let cfg = MockServerConfig {
            port: 0,
            ..MockServerConfig::default()
        };
        assert_eq!(
            socket_addr(&cfg).expect("addr"),
            "127.0.0.1:0".parse::<SocketAddr>().expect("literal")
        );
        let cfg = MockServerConfig {
            bind: "not-an-ip".into(),
            ..MockServerConfig::default()
        };
        assert!(matches!(socket_addr(&cfg), Err(BootstrapError::InvalidBind(_))));
    }

    #[tokio::test]
    async fn scanned_profiles_replace_static_ones_with_the_same_name() {
        let storage = Arc::new(
            MemoryStorage::new()
                .with_dir("profiles/shared")
                .with_dir("profiles/extra"),
        );
        let config = MockServerConfig::default()
            .with_profile("shared", "static/shared")
            .with_initial_active_profile("shared");
        let config = MockServerConfig {
            profile_directory: Some(PathBuf::from("profiles")),
            ..config
        };
        let state = build_state(&config, storage).await.expect("state");
        let registry = state.registry();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.active_profile().as_deref(), Some("shared"));
        assert_eq!(registry.active_base_dir(), PathBuf::from("profiles/shared"));
    }

    #[tokio::test]
    async fn unknown_initial_profile_fails_startup() {
        let config = MockServerConfig::default()
            .with_profile("default", "resources/default")
            .with_initial_active_profile("missing");
        let err = build_state(&config, Arc::new(MemoryStorage::new()))
            .await
            .expect_err("unknown initial profile");
        assert!(matches!(
            err,
            BootstrapError::Profile(ProfileError::UnknownProfile(ref name)) if name == "missing"
        ));
    }

    #[tokio::test]
    async fn resolver_uses_configured_sibling_mode() {
        let config = MockServerConfig {
            sibling_match: SiblingMatch::Strict,
            ..MockServerConfig::default()
        };
        let state = build_state(&config, Arc::new(MemoryStorage::new()))
            .await
            .expect("state");
        assert_eq!(state.resolver().sibling_match(), SiblingMatch::Strict);
        assert_eq!(state.registry().active_profile(), None);
    }
}
