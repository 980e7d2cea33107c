//! Role-based access to root directories and public path mapping.
//!
//! A public path is `name/relative/path`, where `name` is the public name of
//! a root directory. Which roots a caller can see depends on the caller's roles.

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

use parking_lot::RwLock;

use crate::config::RootDirectory;
use crate::watcher::RootDirectoriesListener;
use crate::{Error, Result};

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Background work such as a full rebuild. Sees every root.
    Elevated,
    /// An authenticated user holding some roles.
    User { roles: HashSet<String> },
}

impl Principal {
    /// A user principal with the given roles.
    pub fn user<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::User {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    fn can_see(&self, root: &RootDirectory) -> bool {
        match self {
            Self::Elevated => true,
            Self::User { roles } => roles.contains(&root.role),
        }
    }
}

/// Answers which root directories a principal may see.
pub trait AuthorizationOracle: Send + Sync {
    /// Public name to real directory for every root `principal` may see.
    ///
    /// # Errors
    ///
    /// Returns an error if the root set cannot be determined.
    fn root_directories(&self, principal: &Principal) -> Result<BTreeMap<String, PathBuf>>;
}

/// Holds the current root set; kept up to date as a `RootDirectoriesListener`.
#[derive(Debug, Default)]
pub struct RootRegistry {
    roots: RwLock<Vec<RootDirectory>>,
}

impl RootRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current root set.
    #[must_use]
    pub fn roots(&self) -> Vec<RootDirectory> {
        self.roots.read().clone()
    }

    /// Map a public path to a real path, if `principal` can see its root.
    ///
    /// # Errors
    ///
    /// Returns an error if the path escapes its root with `..` or is absolute.
    pub fn to_real_path(&self, principal: &Principal, public: &str) -> Result<Option<PathBuf>> {
        let trimmed = public.trim_start_matches('/');
        let (name, relative) = trimmed.split_once('/').unwrap_or((trimmed, ""));

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::config(format!("invalid public path '{public}'")));
        }

        let roots = self.roots.read();
        let root = roots
            .iter()
            .find(|r| r.name == name && principal.can_see(r));

        Ok(root.map(|r| r.directory.join(relative)))
    }

    /// Map a real path back to its public path, if `principal` can see a root containing it.
    #[must_use]
    pub fn to_public_path(&self, principal: &Principal, real: &Path) -> Option<String> {
        let roots = self.roots.read();
        roots
            .iter()
            .filter(|r| principal.can_see(r))
            .find_map(|r| {
                let relative = real.strip_prefix(&r.directory).ok()?;
                let relative = relative.to_string_lossy();
                if relative.is_empty() {
                    Some(r.name.clone())
                } else {
                    Some(format!("{}/{}", r.name, relative))
                }
            })
    }
}

impl RootDirectoriesListener for RootRegistry {
    fn name(&self) -> &str {
        "root-registry"
    }

    fn on_root_directories_updated(&self, roots: &[RootDirectory]) -> Result<()> {
        *self.roots.write() = roots.to_vec();
        tracing::info!(count = roots.len(), "Root registry updated");
        Ok(())
    }
}

impl AuthorizationOracle for RootRegistry {
    fn root_directories(&self, principal: &Principal) -> Result<BTreeMap<String, PathBuf>> {
        Ok(self
            .roots
            .read()
            .iter()
            .filter(|r| principal.can_see(r))
            .map(|r| (r.name.clone(), r.directory.clone()))
            .collect())
    }
}
