use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ProfileError;
use crate::storage::StorageProvider;

/// Base directory used when no profile has been made active.
pub const DEFAULT_FALLBACK_BASE_DIR: &str = "resources/default";

/// Lexically normalize a path: `.` segments are dropped and `..` folds into
/// the preceding segment where there is one. The filesystem is not consulted.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(skip)]
    name: String,
    response_file_base_path: PathBuf,
}

impl Profile {
    pub fn new(name: impl Into<String>, base_dir: impl AsRef<Path>) -> Self {
        Self {
            name: name.into(),
            response_file_base_path: normalize_path(base_dir.as_ref()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_dir(&self) -> &Path {
        &self.response_file_base_path
    }
}

/// Named profiles plus the single "active" pointer.
///
/// Profiles are registered while the registry is still exclusively owned
/// (`&mut self`); once shared, only the active pointer can change.
#[derive(Debug)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Arc<Profile>>,
    active: RwLock<Option<Arc<Profile>>>,
    fallback_base_dir: PathBuf,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self {
            profiles: BTreeMap::new(),
            active: RwLock::new(None),
            fallback_base_dir: PathBuf::from(DEFAULT_FALLBACK_BASE_DIR),
        }
    }

    pub fn with_fallback_base_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.fallback_base_dir = normalize_path(dir.as_ref());
        self
    }

    pub fn add_profile(&mut self, name: impl Into<String>, base_dir: impl AsRef<Path>) {
        let profile = Profile::new(name, base_dir);
        debug!(
            profile = %profile.name,
            base_dir = %profile.response_file_base_path.display(),
            "registered profile"
        );
        self.profiles.insert(profile.name.clone(), Arc::new(profile));
    }

    /// Register every `name -> directory` entry; a repeated name replaces the
    /// earlier registration.
    pub fn add_static_profiles<I, N, P>(&mut self, mapping: I)
    where
        I: IntoIterator<Item = (N, P)>,
        N: Into<String>,
        P: AsRef<Path>,
    {
        for (name, dir) in mapping {
            self.add_profile(name, dir);
        }
    }

    /// Register one profile per immediate subdirectory of `root`. Does nothing
    /// when no root is configured.
    pub async fn scan_and_register_from_root(
        &mut self,
        root: Option<&Path>,
        storage: &dyn StorageProvider,
    ) -> Result<usize, ProfileError> {
        let Some(root) = root else {
            return Ok(0);
        };
        let names = storage.list_directories(root).await?;
        let count = names.len();
        for name in names {
            let dir = root.join(&name);
            self.add_profile(name, dir);
        }
        info!(root = %root.display(), count, "registered profiles from profile directory");
        Ok(count)
    }

    /// Point the registry at `name`. The previous active profile is left in
    /// place when `name` is unknown.
    pub fn set_active_profile(&self, name: &str) -> Result<(), ProfileError> {
        let profile = self
            .profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ProfileError::UnknownProfile(name.to_string()))?;
        info!(profile = %name, base_dir = %profile.base_dir().display(), "active profile set");
        *self.active.write() = Some(profile);
        Ok(())
    }

    pub fn active_profile(&self) -> Option<String> {
        self.active.read().as_ref().map(|p| p.name.clone())
    }

    pub fn active_base_dir(&self) -> PathBuf {
        match self.active.read().as_ref() {
            Some(profile) => profile.response_file_base_path.clone(),
            None => self.fallback_base_dir.clone(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Snapshot of every registered profile keyed by name.
    pub fn profiles(&self) -> BTreeMap<String, Profile> {
        self.profiles
            .iter()
            .map(|(name, profile)| (name.clone(), profile.as_ref().clone()))
            .collect()
    }
}
