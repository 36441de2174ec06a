//! File-backed mock responses scoped by profile.
//!
//! A request is answered by locating a response file below the active
//! profile's base directory whose name encodes the HTTP method and status,
//! e.g. `resources/default/one/two/GET.200.json` or the sibling form
//! `resources/default/one/two.GET.200.json`. This crate holds the decision
//! logic; the HTTP surface lives in `mockapi-server`.

pub mod config;
pub mod error;
pub mod media;
pub mod profile;
pub mod resolver;
pub mod storage;

pub use config::{
    load_config, parse_config, AccessLogConfig, LogLevel, LogRotation, MockServerConfig,
    ProfileConfig,
};
pub use error::{ConfigError, ProfileError, ResolveError, StorageError};
pub use media::ContentKind;
pub use profile::{normalize_path, Profile, ProfileRegistry, DEFAULT_FALLBACK_BASE_DIR};
pub use resolver::{extract_status, ResolvedResponse, ResponseResolver, SiblingMatch};
pub use storage::{FsStorage, MemoryStorage, SharedStorage, StorageProvider};
