//! Name-keyed collection resolution.
//!
//! The remote service does not keep collection names unique, so this module
//! owns the invariant: a name resolves to exactly one collection or to an error.

use crate::remote::{Collection, RemoteError, RemoteJobClient};

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Collection '{name}' is ambiguous: {count} collections share that name")]
    Ambiguous { name: String, count: usize },
    #[error("Collection '{name}' does not exist")]
    NotFound { name: String },
    #[error("Collection name must not be empty")]
    EmptyName,
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

pub struct CollectionResolver<'a, C: ?Sized> {
    client: &'a C,
}

impl<'a, C: RemoteJobClient + ?Sized> CollectionResolver<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Return the unique collection called `name`, creating it if none exists.
    ///
    /// Resolving the same name twice yields the same collection. If a create
    /// collides with a concurrent writer, the name is looked up again instead
    /// of failing.
    pub fn resolve(&self, name: &str) -> Result<Collection, ResolveError> {
        let name = checked_name(name)?;
        if let Some(existing) = self.lookup(name)? {
            return Ok(existing);
        }
        match self.client.create_collection(name) {
            Ok(created) => {
                tracing::info!("Created collection '{}' ({})", created.name, created.id);
                Ok(created)
            }
            Err(RemoteError::Conflict(detail)) => {
                tracing::warn!("Creating collection '{name}' conflicted ({detail}); re-resolving");
                self.lookup(name)?.ok_or_else(|| ResolveError::NotFound {
                    name: name.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Return the unique existing collection called `name`. Never creates.
    pub fn require(&self, name: &str) -> Result<Collection, ResolveError> {
        let name = checked_name(name)?;
        self.lookup(name)?.ok_or_else(|| ResolveError::NotFound {
            name: name.to_string(),
        })
    }

    fn lookup(&self, name: &str) -> Result<Option<Collection>, ResolveError> {
        let mut matches = self.client.collections(name)?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            count => Err(ResolveError::Ambiguous {
                name: name.to_string(),
                count,
            }),
        }
    }
}

/// Names are matched verbatim; only blank names are refused.
fn checked_name(name: &str) -> Result<&str, ResolveError> {
    if name.trim().is_empty() {
        return Err(ResolveError::EmptyName);
    }
    Ok(name)
}
