//! Container naming and the handler capability the monitoring core is built on.
//!
//! A container is addressed by a [`ContainerName`], a `/`-separated path such as
//! `/system.slice/docker.service`. Every concrete collection mechanism implements
//! [`ContainerHandler`] and is produced by a [`ContainerHandlerFactory`] registered
//! with a [`FactoryRegistry`].
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

mod error;
mod handler;

pub use error::{Error, Result};
pub use handler::{ContainerHandler, ContainerHandlerFactory, FactoryRegistry, ListType};

/// The maximum allowed length for a [`ContainerName`].
const CONTAINER_NAME_MAX_LEN: usize = 255;

/// A validated, hierarchical container name.
///
/// # Examples
///
/// ```
/// # use cadmon::container::ContainerName;
/// let name = ContainerName::new("/system.slice/docker.service").unwrap();
/// assert_eq!(name.as_ref(), "/system.slice/docker.service");
/// assert!(ContainerName::root().is_ancestor_of(&name));
/// assert!(ContainerName::new("relative/name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerName(Arc<str>);

impl ContainerName {
    /// Creates a new `ContainerName` from the given raw name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerName`] if the name is not absolute, contains
    /// empty, `.` or `..` components, ends in `/` (other than the root itself), or
    /// exceeds [`CONTAINER_NAME_MAX_LEN`].
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if !is_valid_name(src) {
            return Err(Error::InvalidContainerName(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    /// The root container `/`.
    pub fn root() -> Self {
        Self(Arc::from("/"))
    }

    pub fn is_root(&self) -> bool {
        &*self.0 == "/"
    }

    /// Returns `true` if `other` lies strictly below `self` in the hierarchy.
    pub fn is_ancestor_of(&self, other: &ContainerName) -> bool {
        if self.is_root() {
            return !other.is_root();
        }
        other
            .0
            .strip_prefix(&*self.0)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Appends a single path component.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerName`] if `component` contains `/` or the
    /// resulting name is invalid.
    pub fn join(&self, component: &str) -> Result<Self> {
        if component.contains('/') {
            return Err(Error::InvalidContainerName(format!("{self}/{component}")));
        }
        if self.is_root() {
            Self::new(format!("/{component}"))
        } else {
            Self::new(format!("{self}/{component}"))
        }
    }

    /// Iterates over the non-empty path components.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|c| !c.is_empty())
    }
}

fn is_valid_name(src: &str) -> bool {
    if src.is_empty() || src.len() > CONTAINER_NAME_MAX_LEN || !src.starts_with('/') {
        return false;
    }
    if src == "/" {
        return true;
    }
    src[1..]
        .split('/')
        .all(|component| !component.is_empty() && component != "." && component != "..")
}

impl FromStr for ContainerName {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ContainerName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for ContainerName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// A reference to another container, as returned by [`ContainerHandler::list_containers`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct ContainerReference {
    pub name: ContainerName,
}

impl From<ContainerName> for ContainerReference {
    fn from(name: ContainerName) -> Self {
        Self { name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for raw in ["/", "/c1", "/a/b", "/system.slice/docker-abc.scope"] {
            let name = ContainerName::new(raw).unwrap();
            assert_eq!(name.as_ref(), raw);
        }
    }

    #[test]
    fn test_invalid_names() {
        for raw in ["", "c1", "/a/", "//", "/a//b", "/a/./b", "/a/.."] {
            assert!(
                matches!(ContainerName::new(raw), Err(Error::InvalidContainerName(_))),
                "expected `{raw}` to be rejected"
            );
        }
        let too_long = format!("/{}", "x".repeat(CONTAINER_NAME_MAX_LEN));
        assert!(ContainerName::new(too_long).is_err());
    }

    #[test]
    fn test_ancestry() {
        let root = ContainerName::root();
        let a = ContainerName::new("/a").unwrap();
        let ab = ContainerName::new("/a/b").unwrap();
        let abc = ContainerName::new("/abc").unwrap();

        assert!(root.is_ancestor_of(&a));
        assert!(root.is_ancestor_of(&ab));
        assert!(!root.is_ancestor_of(&root));
        assert!(a.is_ancestor_of(&ab));
        assert!(!a.is_ancestor_of(&abc));
        assert!(!a.is_ancestor_of(&a));
        assert!(!ab.is_ancestor_of(&a));
    }

    #[test]
    fn test_join() {
        let ab = ContainerName::new("/a/b").unwrap();
        assert_eq!(ContainerName::root().join("a").unwrap().as_ref(), "/a");
        assert_eq!(ab.join("c").unwrap().as_ref(), "/a/b/c");
        assert!(ab.join("c/d").is_err());
        assert!(ab.join("..").is_err());
    }

    #[test]
    fn test_components() {
        let name = ContainerName::new("/a/b/c").unwrap();
        assert_eq!(name.components().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(ContainerName::root().components().count(), 0);
    }
}
