//! Path-indexed hierarchical store
//!
//! Objects are stored by `/`-separated path. Every segment but the last names
//! a branch; the last names the object inside that branch. A branch may hold
//! both objects and sub-branches, so `/a/b` can be an object name under `/a`
//! while `/a/b/c` also exists.

use std::collections::BTreeMap;
use std::fmt;

/// Errors raised by path resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathTreeError {
    /// The path has no final object name (empty, or ends in `/`)
    EmptyName,
    /// A branch or object along the path does not exist
    NotFound(String),
}

impl fmt::Display for PathTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathTreeError::EmptyName => write!(f, "path has an empty object name"),
            PathTreeError::NotFound(path) => write!(f, "path not found: {path}"),
        }
    }
}

impl std::error::Error for PathTreeError {}

#[derive(Debug, Clone)]
struct Branch<T> {
    subtrees: BTreeMap<String, Branch<T>>,
    objects: BTreeMap<String, T>,
}

impl<T> Branch<T> {
    fn new() -> Self {
        Self {
            subtrees: BTreeMap::new(),
            objects: BTreeMap::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.subtrees.is_empty() && self.objects.is_empty()
    }
}

/// Description of a direct sub-branch returned by [`PathTree::get_children`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtreeInfo {
    pub name: String,
    /// Fully qualified path of the sub-branch
    pub display_path: String,
    /// The sub-branch directly holds at least one object
    pub has_objects: bool,
    /// The sub-branch has at least one sub-branch of its own
    pub has_subtrees: bool,
}

impl SubtreeInfo {
    /// Whether a view should offer to expand this branch
    pub fn is_expandable(&self) -> bool {
        self.has_objects || self.has_subtrees
    }
}

/// Direct content of one branch
#[derive(Debug)]
pub struct ChildrenListing<'a, T> {
    /// Objects directly under the branch, in name order
    pub objects: Vec<(&'a str, &'a T)>,
    /// Sub-branches, in name order
    pub subtrees: Vec<SubtreeInfo>,
}

/// Hierarchical store keyed by slash-separated paths.
#[derive(Debug, Clone)]
pub struct PathTree<T> {
    root: Branch<T>,
    object_count: usize,
}

/// Split a path into its non-empty segments
fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Absolute form of `path`: `a//b/` and `/a/b` both become `/a/b`
pub fn normalize_path(path: &str) -> String {
    format!("/{}", split_path(path).join("/"))
}

/// Join a parent path and a segment with exactly one separator
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if parent.is_empty() {
        format!("/{name}")
    } else if parent.starts_with('/') {
        format!("{parent}/{name}")
    } else {
        format!("/{parent}/{name}")
    }
}

impl<T> PathTree<T> {
    pub fn new() -> Self {
        Self {
            root: Branch::new(),
            object_count: 0,
        }
    }

    /// Number of objects stored
    pub fn len(&self) -> usize {
        self.object_count
    }

    pub fn is_empty(&self) -> bool {
        self.object_count == 0
    }

    /// Drop every branch and object
    pub fn clear(&mut self) {
        self.root = Branch::new();
        self.object_count = 0;
    }

    /// Store `value` at `path`, creating intermediate branches.
    ///
    /// Adding to an existing object path replaces the stored value and
    /// returns the previous one.
    pub fn add(&mut self, path: &str, value: T) -> Result<Option<T>, PathTreeError> {
        if path.ends_with('/') {
            return Err(PathTreeError::EmptyName);
        }
        let segments = split_path(path);
        let (name, branches) = segments.split_last().ok_or(PathTreeError::EmptyName)?;

        let mut branch = &mut self.root;
        for segment in branches {
            branch = branch
                .subtrees
                .entry((*segment).to_string())
                .or_insert_with(Branch::new);
        }

        let previous = branch.objects.insert((*name).to_string(), value);
        if previous.is_none() {
            self.object_count += 1;
        }
        Ok(previous)
    }

    fn branch_at(&self, segments: &[&str], path: &str) -> Result<&Branch<T>, PathTreeError> {
        let mut branch = &self.root;
        for segment in segments {
            branch = branch
                .subtrees
                .get(*segment)
                .ok_or_else(|| PathTreeError::NotFound(path.to_string()))?;
        }
        Ok(branch)
    }

    /// Look up the object stored at `path`
    pub fn get(&self, path: &str) -> Result<&T, PathTreeError> {
        let segments = split_path(path);
        let (name, branches) = segments
            .split_last()
            .ok_or_else(|| PathTreeError::NotFound(path.to_string()))?;
        self.branch_at(branches, path)?
            .objects
            .get(*name)
            .ok_or_else(|| PathTreeError::NotFound(path.to_string()))
    }

    pub fn get_mut(&mut self, path: &str) -> Result<&mut T, PathTreeError> {
        let segments = split_path(path);
        let (name, branches) = segments
            .split_last()
            .ok_or_else(|| PathTreeError::NotFound(path.to_string()))?;

        let mut branch = &mut self.root;
        for segment in branches {
            branch = branch
                .subtrees
                .get_mut(*segment)
                .ok_or_else(|| PathTreeError::NotFound(path.to_string()))?;
        }
        branch
            .objects
            .get_mut(*name)
            .ok_or_else(|| PathTreeError::NotFound(path.to_string()))
    }

    /// True if an object is stored at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_ok()
    }

    /// List the direct objects and sub-branches of the branch at `path`.
    ///
    /// `"/"` and `""` address the root branch.
    pub fn get_children(&self, path: &str) -> Result<ChildrenListing<'_, T>, PathTreeError> {
        let segments = split_path(path);
        let branch = self.branch_at(&segments, path)?;

        let objects = branch
            .objects
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();

        let subtrees = branch
            .subtrees
            .iter()
            .map(|(name, sub)| SubtreeInfo {
                name: name.clone(),
                display_path: join_path(path, name),
                has_objects: !sub.objects.is_empty(),
                has_subtrees: !sub.subtrees.is_empty(),
            })
            .collect();

        Ok(ChildrenListing { objects, subtrees })
    }

    /// Every object path, objects before sub-branches at each level
    pub fn get_all_paths(&self) -> Vec<String> {
        let mut paths = Vec::with_capacity(self.object_count);
        Self::collect_paths(&self.root, "", &mut paths);
        paths
    }

    fn collect_paths(branch: &Branch<T>, prefix: &str, out: &mut Vec<String>) {
        for name in branch.objects.keys() {
            out.push(join_path(prefix, name));
        }
        for (name, sub) in &branch.subtrees {
            Self::collect_paths(sub, &join_path(prefix, name), out);
        }
    }

    /// Every stored object, in the same order as [`PathTree::get_all_paths`]
    pub fn get_all_objects(&self) -> Vec<&T> {
        let mut objects = Vec::with_capacity(self.object_count);
        Self::collect_objects(&self.root, &mut objects);
        objects
    }

    fn collect_objects<'a>(branch: &'a Branch<T>, out: &mut Vec<&'a T>) {
        out.extend(branch.objects.values());
        for sub in branch.subtrees.values() {
            Self::collect_objects(sub, out);
        }
    }

    /// Remove the object at `path` and prune branches left empty.
    pub fn remove(&mut self, path: &str) -> Result<T, PathTreeError> {
        let segments = split_path(path);
        let (name, branches) = segments
            .split_last()
            .ok_or_else(|| PathTreeError::NotFound(path.to_string()))?;

        let removed = Self::remove_in(&mut self.root, branches, name)
            .ok_or_else(|| PathTreeError::NotFound(path.to_string()))?;
        self.object_count -= 1;
        Ok(removed)
    }

    fn remove_in(branch: &mut Branch<T>, branches: &[&str], name: &str) -> Option<T> {
        match branches.split_first() {
            None => branch.objects.remove(name),
            Some((head, rest)) => {
                let sub = branch.subtrees.get_mut(*head)?;
                let removed = Self::remove_in(sub, rest, name)?;
                if sub.is_empty() {
                    branch.subtrees.remove(*head);
                }
                Some(removed)
            }
        }
    }
}

impl<T> Default for PathTree<T> {
    fn default() -> Self {
        Self::new()
    }
}
