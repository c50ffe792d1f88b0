//! `pyproject.toml` manifests managed by Poetry.
//!
//! Edits go through `toml_edit` so comments and formatting survive.

use super::{LockMode, ManifestOperations, Requirement};
use crate::error::{ManifestError, Result};
use crate::process;
use crate::workspace::RepositoryDescriptor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml_edit::{DocumentMut, InlineTable, Item, TableLike, value};

const MANIFEST_FILE: &str = "pyproject.toml";
const LOCK_FILE: &str = "poetry.lock";

/// The interpreter constraint is never a managed dependency
const PYTHON_KEY: &str = "python";

/// Poetry-backed manifest operations
#[derive(Debug, Clone)]
pub struct PoetryManifest {
    fast_lock_timeout: Duration,
    full_lock_timeout: Duration,
}

impl Default for PoetryManifest {
    fn default() -> Self {
        Self {
            fast_lock_timeout: Duration::from_secs(60),
            full_lock_timeout: Duration::from_secs(120),
        }
    }
}

impl PoetryManifest {
    /// Create an adapter with the default lock timeouts
    pub fn new() -> Self {
        Self::default()
    }

    fn load(&self, repo: &RepositoryDescriptor) -> Result<(PathBuf, DocumentMut)> {
        let path = self.manifest_path(repo);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::Missing { path: path.clone() }
            } else {
                ManifestError::UpdateFailed {
                    path: path.clone(),
                    reason: format!("Failed to read file: {}", e),
                }
            }
        })?;

        let doc = content
            .parse::<DocumentMut>()
            .map_err(|e| ManifestError::UpdateFailed {
                path: path.clone(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        Ok((path, doc))
    }

    fn save(path: &Path, doc: &DocumentMut) -> Result<()> {
        std::fs::write(path, doc.to_string()).map_err(|e| ManifestError::UpdateFailed {
            path: path.to_path_buf(),
            reason: format!("Failed to write file: {}", e),
        })?;
        Ok(())
    }
}

/// Spellings a package name may appear under
fn name_variants(package: &str) -> [String; 3] {
    [
        package.to_string(),
        package.replace('-', "_"),
        package.replace('_', "-"),
    ]
}

fn find_key(table: &dyn TableLike, package: &str) -> Option<String> {
    if package == PYTHON_KEY {
        return None;
    }
    name_variants(package)
        .into_iter()
        .find(|name| table.contains_key(name))
}

fn decode_requirement(item: &Item) -> Option<Requirement> {
    if let Some(range) = item.as_str() {
        return Some(Requirement::Range(range.to_string()));
    }

    let table = item.as_table_like()?;
    if let Some(path) = table.get("path").and_then(Item::as_str) {
        return Some(Requirement::Path {
            path: path.to_string(),
            develop: table.get("develop").and_then(Item::as_bool).unwrap_or(false),
        });
    }

    let version = table.get("version").and_then(Item::as_str)?;
    Some(match table.get("source").and_then(Item::as_str) {
        Some(source) => Requirement::Sourced {
            version: version.to_string(),
            source: source.to_string(),
        },
        None => Requirement::Range(version.to_string()),
    })
}

/// Replace a string value, keeping its surrounding whitespace and comments
fn replace_string(item: &mut Item, new: &str) {
    let decor = item.as_value().map(|v| v.decor().clone());
    *item = value(new);
    if let (Some(decor), Some(v)) = (decor, item.as_value_mut()) {
        *v.decor_mut() = decor;
    }
}

fn set_key(table: &mut dyn TableLike, key: &str, new: &str) {
    match table.get_mut(key) {
        Some(existing) => replace_string(existing, new),
        None => {
            table.insert(key, value(new));
        }
    }
}

fn encode_requirement(item: &mut Item, requirement: &Requirement) {
    match requirement {
        Requirement::Range(range) => match item.as_table_like_mut() {
            Some(table) => set_key(table, "version", range),
            None => replace_string(item, range),
        },
        Requirement::Sourced { version, source } => match item.as_table_like_mut() {
            Some(table) => {
                set_key(table, "version", version);
                set_key(table, "source", source);
            }
            None => {
                let mut table = InlineTable::new();
                table.insert("version", version.as_str().into());
                table.insert("source", source.as_str().into());
                *item = value(table);
            }
        },
        Requirement::Path { path, develop } => {
            let mut table = InlineTable::new();
            table.insert("path", path.as_str().into());
            table.insert("develop", (*develop).into());
            *item = value(table);
        }
    }
}

impl ManifestOperations for PoetryManifest {
    fn manifest_path(&self, repo: &RepositoryDescriptor) -> PathBuf {
        repo.path.join(MANIFEST_FILE)
    }

    fn lock_path(&self, repo: &RepositoryDescriptor) -> PathBuf {
        repo.path.join(LOCK_FILE)
    }

    fn read_raw(&self, repo: &RepositoryDescriptor) -> Result<Vec<u8>> {
        let path = self.manifest_path(repo);
        std::fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ManifestError::Missing { path }.into()
            } else {
                e.into()
            }
        })
    }

    fn write_raw(&self, repo: &RepositoryDescriptor, content: &[u8]) -> Result<()> {
        let path = self.manifest_path(repo);
        std::fs::write(&path, content).map_err(|e| ManifestError::UpdateFailed {
            path,
            reason: format!("Failed to write file: {}", e),
        })?;
        Ok(())
    }

    fn get_version(&self, repo: &RepositoryDescriptor) -> Result<Option<String>> {
        let (_, doc) = self.load(repo)?;
        let version = doc
            .get("tool")
            .and_then(|t| t.get("poetry"))
            .and_then(|p| p.get("version"))
            .or_else(|| doc.get("project").and_then(|p| p.get("version")))
            .and_then(Item::as_str)
            .map(str::to_string);
        Ok(version)
    }

    fn set_version(&self, repo: &RepositoryDescriptor, version: &str) -> Result<()> {
        let (path, mut doc) = self.load(repo)?;

        let uses_project_table = doc
            .get("tool")
            .and_then(|t| t.get("poetry"))
            .and_then(|p| p.get("version"))
            .is_none()
            && doc.get("project").and_then(|p| p.get("version")).is_some();
        let section = if uses_project_table {
            doc.get_mut("project")
        } else {
            doc.get_mut("tool").and_then(|t| t.get_mut("poetry"))
        };

        let table = section
            .and_then(Item::as_table_like_mut)
            .ok_or_else(|| ManifestError::UpdateFailed {
                path: path.clone(),
                reason: "No [tool.poetry] section found".to_string(),
            })?;
        set_key(table, "version", version);

        Self::save(&path, &doc)
    }

    fn get_dependency(
        &self,
        repo: &RepositoryDescriptor,
        package: &str,
    ) -> Result<Option<Requirement>> {
        let (_, doc) = self.load(repo)?;
        let Some(deps) = doc
            .get("tool")
            .and_then(|t| t.get("poetry"))
            .and_then(|p| p.get("dependencies"))
            .and_then(Item::as_table_like)
        else {
            return Ok(None);
        };

        let requirement = find_key(deps, package)
            .and_then(|key| deps.get(&key))
            .and_then(|item| {
                let decoded = decode_requirement(item);
                if decoded.is_none() {
                    log::debug!(
                        "Unsupported requirement shape for '{}' in '{}'",
                        package,
                        repo.name
                    );
                }
                decoded
            });
        Ok(requirement)
    }

    fn set_dependency(
        &self,
        repo: &RepositoryDescriptor,
        package: &str,
        requirement: &Requirement,
    ) -> Result<()> {
        let (path, mut doc) = self.load(repo)?;
        let not_declared = || ManifestError::DependencyNotDeclared {
            repository: repo.name.clone(),
            package: package.to_string(),
        };

        let deps = doc
            .get_mut("tool")
            .and_then(|t| t.get_mut("poetry"))
            .and_then(|p| p.get_mut("dependencies"))
            .and_then(Item::as_table_like_mut)
            .ok_or_else(not_declared)?;
        let key = find_key(deps, package).ok_or_else(not_declared)?;
        let item = deps.get_mut(&key).ok_or_else(not_declared)?;
        encode_requirement(item, requirement);

        Self::save(&path, &doc)
    }

    async fn lock(&self, repo: &RepositoryDescriptor, mode: LockMode) -> Result<()> {
        let (args, timeout) = match mode {
            LockMode::Fast => (vec!["lock"], self.fast_lock_timeout),
            LockMode::Full => (vec!["lock", "--regenerate"], self.full_lock_timeout),
        };
        process::run_checked("poetry", &args, &repo.path, timeout).await?;
        log::debug!("Lock file regenerated for '{}' ({:?})", repo.name, mode);
        Ok(())
    }
}
