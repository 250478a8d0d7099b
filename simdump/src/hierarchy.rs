//! Hierarchical signal names and groups.
//!
//! Signals are addressed by dotted paths such as `u_top.u_sub1.data`. Every
//! component but the last names a [`Group`] (a directory in the dump), the
//! last one names the signal dataset inside the innermost group.
//!
//! # Layout
//!
//! ```text
//! dump/
//! ├── .group.json          <- root group attributes
//! └── u_top/
//!     ├── .group.json      <- attributes of group `u_top`
//!     └── u_sub1/
//!         ├── .group.json
//!         ├── data.sds     <- dataset records
//!         └── data.json    <- dataset descriptor
//! ```
//!
//! Resolution is idempotent: resolving `a.b.c` and then `a.b.d` creates the
//! groups `a` and `a.b` once and reuses them the second time.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ContainerError, Result};

/// Hierarchy separator in signal names.
pub const SEPARATOR: char = '.';

/// File holding a group's attributes, present in every group directory.
pub const GROUP_FILE: &str = ".group.json";

/// Extension of dataset record files.
pub const DATASET_EXT: &str = "sds";

/// Extension of dataset descriptor files.
pub const DESCRIPTOR_EXT: &str = "json";

/// Persistent group metadata.
#[derive(Debug, Default, Serialize, Deserialize)]
struct GroupMeta {
    attributes: BTreeMap<String, String>,
}

/// A group (directory) in the dump hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    path: PathBuf,
    name: String,
}

/// Outcome of resolving a dotted signal name.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The innermost group, which contains the leaf.
    pub group: Group,
    /// The final name component.
    pub leaf: String,
    /// Normalized dotted name of the signal.
    pub full_name: String,
    /// Number of groups created by this resolution.
    pub created: usize,
}

impl Group {
    /// Creates the root group at `path`, creating the directory if needed.
    pub(crate) fn create_root(path: &Path) -> Result<Self> {
        fs::create_dir_all(path).map_err(|e| ContainerError::DirectoryAccess {
            path: path.display().to_string(),
            source: e,
        })?;

        let root = Self {
            path: path.to_path_buf(),
            name: String::new(),
        };
        if !root.meta_path().exists() {
            root.save_meta(&GroupMeta::default())?;
        }
        Ok(root)
    }

    /// Opens an existing root group without creating anything.
    pub(crate) fn open_root(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(ContainerError::DirectoryAccess {
                path: path.display().to_string(),
                source: std::io::Error::new(ErrorKind::NotFound, "not a directory"),
            }
            .into());
        }
        Ok(Self {
            path: path.to_path_buf(),
            name: String::new(),
        })
    }

    /// Directory of this group.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Dotted name of this group; empty for the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` for the root group.
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    /// Opens the child group `component`, creating it if it does not exist.
    ///
    /// Returns the group and whether it was newly created.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::InvalidName`] if a signal with that name
    /// already exists in this group, and [`ContainerError::DirectoryAccess`]
    /// if the directory cannot be created.
    pub fn open_or_create_child(&self, component: &str) -> Result<(Self, bool)> {
        let child = self.child_unchecked(component);

        if self.has_signal(component) {
            return Err(ContainerError::InvalidName {
                name: child.name,
                reason: "a signal with this name already exists".to_string(),
            }
            .into());
        }

        match fs::create_dir(&child.path) {
            Ok(()) => {
                child.save_meta(&GroupMeta::default())?;
                debug!(group = %child.name, "created group");
                Ok((child, true))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists && child.path.is_dir() => {
                Ok((child, false))
            }
            Err(e) => Err(ContainerError::DirectoryAccess {
                path: child.path.display().to_string(),
                source: e,
            }
            .into()),
        }
    }

    /// Returns the existing child group `component`, if any.
    pub fn child(&self, component: &str) -> Option<Self> {
        let child = self.child_unchecked(component);
        child.path.is_dir().then_some(child)
    }

    /// Lists child groups sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::DirectoryAccess`] if the directory cannot be read.
    pub fn children(&self) -> Result<Vec<Self>> {
        let mut names = self.list(|entry_path| entry_path.is_dir())?;
        names.sort();
        Ok(names.iter().map(|n| self.child_unchecked(n)).collect())
    }

    /// Lists signal leaf names in this group, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::DirectoryAccess`] if the directory cannot be read.
    pub fn signals(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .list(|entry_path| {
                entry_path.is_file()
                    && entry_path.extension().is_some_and(|ext| ext == DATASET_EXT)
            })?
            .into_iter()
            .filter_map(|file| file.strip_suffix(&format!(".{DATASET_EXT}")).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Sets a string attribute on this group, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`] if the group metadata cannot be read or written.
    pub fn set_attribute(&self, name: &str, value: &str) -> Result<()> {
        let mut meta = self.load_meta()?;
        meta.attributes.insert(name.to_string(), value.to_string());
        self.save_meta(&meta)
    }

    /// Returns all attributes of this group.
    ///
    /// # Errors
    ///
    /// Returns a [`ContainerError`] if the group metadata cannot be read.
    pub fn attributes(&self) -> Result<BTreeMap<String, String>> {
        Ok(self.load_meta()?.attributes)
    }

    /// Path of the record file for signal `leaf` in this group.
    pub(crate) fn dataset_path(&self, leaf: &str) -> PathBuf {
        self.path.join(format!("{leaf}.{DATASET_EXT}"))
    }

    /// Path of the descriptor file for signal `leaf` in this group.
    pub(crate) fn descriptor_path(&self, leaf: &str) -> PathBuf {
        self.path.join(format!("{leaf}.{DESCRIPTOR_EXT}"))
    }

    /// Returns `true` if a signal named `leaf` exists in this group.
    pub(crate) fn has_signal(&self, leaf: &str) -> bool {
        self.dataset_path(leaf).exists()
    }

    /// Dotted name of the member `component` of this group.
    pub(crate) fn member_name(&self, component: &str) -> String {
        if self.is_root() {
            component.to_string()
        } else {
            format!("{}{SEPARATOR}{component}", self.name)
        }
    }

    fn child_unchecked(&self, component: &str) -> Self {
        Self {
            path: self.path.join(component),
            name: self.member_name(component),
        }
    }

    fn list(&self, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>> {
        let access = |e| ContainerError::DirectoryAccess {
            path: self.path.display().to_string(),
            source: e,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.path).map_err(access)? {
            let entry = entry.map_err(access)?;
            let entry_path = entry.path();
            if !keep(&entry_path) {
                continue;
            }
            if let Some(name) = entry_path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn meta_path(&self) -> PathBuf {
        self.path.join(GROUP_FILE)
    }

    fn load_meta(&self) -> Result<GroupMeta> {
        let path = self.meta_path();
        match fs::read_to_string(&path) {
            Ok(text) => Ok(serde_json::from_str(&text).map_err(ContainerError::MetadataSerialize)?),
            // Groups written by other tools may lack the file.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(GroupMeta::default()),
            Err(e) => Err(ContainerError::DirectoryAccess {
                path: path.display().to_string(),
                source: e,
            }
            .into()),
        }
    }

    fn save_meta(&self, meta: &GroupMeta) -> Result<()> {
        let path = self.meta_path();
        let json = serde_json::to_string_pretty(meta).map_err(ContainerError::MetadataSerialize)?;
        fs::write(&path, json).map_err(|e| {
            ContainerError::DirectoryAccess {
                path: path.display().to_string(),
                source: e,
            }
            .into()
        })
    }
}

/// Splits a dotted name into its components.
///
/// Empty components are skipped, so `a..b` and `.a.b` both yield `["a", "b"]`.
///
/// # Errors
///
/// Returns [`ContainerError::InvalidName`] if no component remains or a
/// component contains a path separator or NUL.
pub fn split_name(name: &str) -> Result<Vec<&str>> {
    let components: Vec<&str> = name.split(SEPARATOR).filter(|c| !c.is_empty()).collect();

    if components.is_empty() {
        return Err(ContainerError::InvalidName {
            name: name.to_string(),
            reason: "name has no components".to_string(),
        }
        .into());
    }

    if let Some(bad) = components
        .iter()
        .find(|c| c.contains(['/', '\\', '\0']))
    {
        return Err(ContainerError::InvalidName {
            name: name.to_string(),
            reason: format!("component '{bad}' contains a path separator or NUL"),
        }
        .into());
    }

    Ok(components)
}

/// Resolves `name` under `root`, creating missing intermediate groups.
///
/// # Errors
///
/// Returns [`ContainerError::InvalidName`] if the name is malformed or a
/// group component collides with an existing signal, and
/// [`ContainerError::DirectoryAccess`] if a group cannot be created.
pub fn resolve(root: &Group, name: &str) -> Result<Resolved> {
    let components = split_name(name)?;
    let (leaf, groups) = components
        .split_last()
        .ok_or_else(|| ContainerError::InvalidName {
            name: name.to_string(),
            reason: "name has no components".to_string(),
        })?;

    let mut group = root.clone();
    let mut created = 0;
    for component in groups {
        let (next, was_created) = group.open_or_create_child(component)?;
        created += usize::from(was_created);
        group = next;
    }

    Ok(Resolved {
        full_name: group.member_name(leaf),
        leaf: (*leaf).to_string(),
        group,
        created,
    })
}

/// Checks that `name` can become a new signal, without creating anything.
///
/// Walks the groups that already exist. A missing group ends the walk early
/// since nothing below it can collide.
///
/// # Errors
///
/// - [`ContainerError::InvalidName`] if the name is malformed, a group
///   component names an existing signal, or the leaf names an existing group
/// - [`ContainerError::SignalExists`] if the signal already exists
pub fn check_available(root: &Group, name: &str) -> Result<()> {
    let components = split_name(name)?;
    let (leaf, groups) = components
        .split_last()
        .ok_or_else(|| ContainerError::InvalidName {
            name: name.to_string(),
            reason: "name has no components".to_string(),
        })?;

    let mut group = root.clone();
    for component in groups {
        if group.has_signal(component) {
            return Err(ContainerError::InvalidName {
                name: group.member_name(component),
                reason: "a signal with this name already exists".to_string(),
            }
            .into());
        }
        match group.child(component) {
            Some(next) => group = next,
            None => return Ok(()),
        }
    }

    if group.has_signal(leaf) {
        return Err(ContainerError::SignalExists {
            name: group.member_name(leaf),
        }
        .into());
    }
    if group.child(leaf).is_some() {
        return Err(ContainerError::InvalidName {
            name: group.member_name(leaf),
            reason: "a group with this name already exists".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Looks up the group named by all components of `name`, without creating any.
///
/// An empty name (or one made only of separators) resolves to the root.
///
/// # Errors
///
/// Returns [`ContainerError::InvalidName`] if a component is malformed or
/// the group does not exist.
pub fn lookup_group(root: &Group, name: &str) -> Result<Group> {
    if name.split(SEPARATOR).all(str::is_empty) {
        return Ok(root.clone());
    }

    let mut group = root.clone();
    for component in split_name(name)? {
        group = group.child(component).ok_or_else(|| ContainerError::InvalidName {
            name: name.to_string(),
            reason: format!("group '{component}' does not exist"),
        })?;
    }
    Ok(group)
}

/// Looks up the group and leaf of an existing signal, without creating any.
///
/// # Errors
///
/// Returns [`ContainerError::UnknownSignal`] if the signal does not exist and
/// [`ContainerError::InvalidName`] if the name is malformed.
pub fn lookup_signal(root: &Group, name: &str) -> Result<(Group, String)> {
    let components = split_name(name)?;
    let unknown = || ContainerError::UnknownSignal {
        name: name.to_string(),
    };
    let (leaf, groups) = components.split_last().ok_or_else(unknown)?;

    let mut group = root.clone();
    for component in groups {
        group = group.child(component).ok_or_else(unknown)?;
    }

    if !group.has_signal(leaf) {
        return Err(unknown().into());
    }
    Ok((group, (*leaf).to_string()))
}
