use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ResolveError;
use crate::media::ContentKind;
use crate::storage::SharedStorage;

static STATUS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{3}").expect("status regex"));

const DEFAULT_STATUS: u16 = 200;

/// Which files in the parent directory count as sibling-file candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SiblingMatch {
    /// Every file in the parent directory is a candidate, except when the
    /// parent is the base directory.
    #[default]
    Lenient,
    /// Only `<lastSegment>.<METHOD>...` files are candidates, so the base
    /// directory is searched too (`/ping` -> `<base>/ping.GET.json`).
    Strict,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub kind: ContentKind,
    pub source: PathBuf,
}

impl ResolvedResponse {
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}

/// First run of three digits in `file_name`, or 200 when there is none.
///
/// Any three-digit run counts, so a name like `v100.GET.json` yields 100.
pub fn extract_status(file_name: &str) -> u16 {
    STATUS_RE
        .find(file_name)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(DEFAULT_STATUS)
}

/// URL path segments with the query string removed. `.` is dropped and `..`
/// never climbs above the first segment.
fn request_segments(url_path: &str) -> Vec<&str> {
    let path = url_path.split(['?', '#']).next().unwrap_or_default();
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments
}

pub struct ResponseResolver {
    storage: SharedStorage,
    sibling_match: SiblingMatch,
}

impl std::fmt::Debug for ResponseResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseResolver")
            .field("sibling_match", &self.sibling_match)
            .finish_non_exhaustive()
    }
}

impl ResponseResolver {
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            sibling_match: SiblingMatch::default(),
        }
    }

    pub fn with_sibling_match(mut self, sibling_match: SiblingMatch) -> Self {
        self.sibling_match = sibling_match;
        self
    }

    pub fn sibling_match(&self) -> SiblingMatch {
        self.sibling_match
    }

    /// Directory that mirrors `url_path` below `base_dir`.
    pub fn target_directory(base_dir: &Path, url_path: &str) -> PathBuf {
        let mut target = base_dir.to_path_buf();
        for segment in request_segments(url_path) {
            target.push(segment);
        }
        target
    }

    /// Directory searched for `<lastSegment>.<METHOD>...` files. Lenient
    /// matching never searches the base directory itself, otherwise every
    /// root file would answer every one-segment path.
    fn sibling_dir<'a>(&self, target: &'a Path, base_dir: &Path) -> Option<&'a Path> {
        let parent = target.parent()?;
        match self.sibling_match {
            SiblingMatch::Lenient if parent == base_dir => None,
            _ => Some(parent),
        }
    }

    /// Every response file that could answer `method url_path`, sibling-file
    /// candidates first, then files inside the mirrored directory.
    pub async fn candidates(
        &self,
        method: &str,
        url_path: &str,
        base_dir: &Path,
    ) -> Result<Vec<PathBuf>, ResolveError> {
        let segments = request_segments(url_path);
        let target = Self::target_directory(base_dir, url_path);

        let mut found = Vec::new();
        if let (Some(last), Some(parent)) = (segments.last(), self.sibling_dir(&target, base_dir)) {
            let prefix = format!("{last}.{method}");
            let siblings = self.storage.list_files(parent).await?;
            found.extend(
                siblings
                    .into_iter()
                    .filter(|name| match self.sibling_match {
                        SiblingMatch::Lenient => true,
                        SiblingMatch::Strict => name.starts_with(&prefix),
                    })
                    .map(|name| parent.join(name)),
            );
        }

        let nested = self.storage.list_files(&target).await?;
        found.extend(
            nested
                .into_iter()
                .filter(|name| name.starts_with(method))
                .map(|name| target.join(name)),
        );
        Ok(found)
    }

    pub async fn resolve(
        &self,
        method: &str,
        url_path: &str,
        base_dir: &Path,
    ) -> Result<ResolvedResponse, ResolveError> {
        let candidates = self.candidates(method, url_path, base_dir).await?;
        let Some(chosen) = candidates.first().cloned() else {
            return Err(ResolveError::NoResponseFound {
                directory: Self::target_directory(base_dir, url_path),
                method: method.to_string(),
            });
        };
        if candidates.len() > 1 {
            let all: Vec<String> = candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            warn!(
                chosen = %chosen.display(),
                candidates = ?all,
                "multiple possible response files; defaulting to the first one"
            );
        }

        let file_name = chosen
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let status = extract_status(&file_name);
        if !(100..=999).contains(&status) {
            return Err(ResolveError::InvalidStatus {
                path: chosen,
                status,
            });
        }

        debug!(file = %chosen.display(), status, "serving response file");
        let raw = self.storage.read_file(&chosen).await?;
        let kind = ContentKind::from_path(&chosen);
        let body = match kind {
            ContentKind::Json => {
                let value: serde_json::Value =
                    serde_json::from_slice(&raw).map_err(|source| ResolveError::MalformedJson {
                        path: chosen.clone(),
                        source,
                    })?;
                serde_json::to_vec(&value).map_err(|source| ResolveError::MalformedJson {
                    path: chosen.clone(),
                    source,
                })?
            }
            _ => raw,
        };

        Ok(ResolvedResponse {
            status,
            body,
            kind,
            source: chosen,
        })
    }
}
