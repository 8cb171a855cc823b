//! Filesystem backends that steps execute against.
//!
//! [`ConfigFs`] is the small set of operations a step sequence needs.
//! [`HostFs`] performs them with real syscalls; [`MemoryFs`] keeps an
//! in-memory tree that behaves like configfs, which makes dry runs and tests
//! independent of the kernel.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::Result;

/// Operations a step sequence performs on a configuration tree.
pub trait ConfigFs {
    /// Create `path` and any missing parents. With `exist_ok` an existing
    /// directory at `path` is accepted, otherwise it is an error.
    fn create_dir(&mut self, path: &Path, exist_ok: bool) -> io::Result<()>;

    /// Remove a single directory.
    fn remove_dir(&mut self, path: &Path) -> io::Result<()>;

    /// Create or truncate `path` and write `contents` to it.
    fn write_file(&mut self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Remove a file or a symlink.
    fn remove_path(&mut self, path: &Path) -> io::Result<()>;

    /// Create a symlink at `link` pointing at `target`.
    ///
    /// A relative `target` is taken from the working directory like every
    /// other path here, not from the directory holding `link`.
    fn symlink(&mut self, target: &Path, link: &Path) -> io::Result<()>;

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn exists(&self, path: &Path) -> bool;

    /// Base names of the entries matching `pattern`, sorted.
    fn list_matching_names(&self, pattern: &str) -> Result<Vec<String>>;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostFs;

impl ConfigFs for HostFs {
    fn create_dir(&mut self, path: &Path, exist_ok: bool) -> io::Result<()> {
        if !exist_ok && fs::symlink_metadata(path).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o775);
        }
        builder.create(path)
    }

    fn remove_dir(&mut self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn write_file(&mut self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o664);
        }
        options.open(path)?.write_all(contents)
    }

    fn remove_path(&mut self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn symlink(&mut self, target: &Path, link: &Path) -> io::Result<()> {
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(std::path::absolute(target)?, link)
        }

        #[cfg(not(unix))]
        {
            let _ = (target, link);
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "symlinks require a unix host",
            ))
        }
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn list_matching_names(&self, pattern: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in glob::glob(pattern)? {
            let path = entry.map_err(glob::GlobError::into_error)?;
            if let Some(name) = path.file_name() {
                names.push(name.to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// An entry in a [`MemoryFs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Dir,
    /// A directory that only exists because something beneath it was
    /// created. It goes away together with its parent.
    DefaultGroup,
    File(Vec<u8>),
    Symlink(PathBuf),
}

/// In-memory configfs model.
///
/// Differences from an ordinary filesystem mirror configfs:
/// - removing a directory succeeds while it still holds attribute files or
///   implicitly created directories, as long as no explicitly created
///   directory or symlink is left beneath it; the leftovers go with it
/// - a symlink target must exist
///
/// Relative paths, symlink targets included, all share one implicit working
/// directory, the same way [`HostFs`] resolves them.
#[derive(Debug, Clone, Default)]
pub struct MemoryFs {
    nodes: BTreeMap<PathBuf, Node>,
}

impl MemoryFs {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory and its parents
    pub fn add_dir<P: AsRef<Path>>(&mut self, path: P) {
        for ancestor in real_ancestors(path.as_ref()) {
            self.nodes.entry(ancestor).or_insert(Node::Dir);
        }
    }

    /// Add a file, creating its parent directories
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P, content: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.add_dir(parent);
        }
        self.nodes
            .insert(path.to_path_buf(), Node::File(content.into()));
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&Node> {
        self.nodes.get(path.as_ref())
    }

    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.nodes.contains_key(path.as_ref())
    }

    pub fn is_dir<P: AsRef<Path>>(&self, path: P) -> bool {
        matches!(self.get(path), Some(Node::Dir | Node::DefaultGroup))
    }

    /// File content as text, if `path` is a file
    pub fn read_string<P: AsRef<Path>>(&self, path: P) -> Option<String> {
        match self.get(path) {
            Some(Node::File(content)) => Some(String::from_utf8_lossy(content).into_owned()),
            _ => None,
        }
    }

    pub fn read_link<P: AsRef<Path>>(&self, path: P) -> Option<&Path> {
        match self.get(path) {
            Some(Node::Symlink(target)) => Some(target),
            _ => None,
        }
    }

    /// All paths in the tree, sorted
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.nodes.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn parent_is_dir(&self, path: &Path) -> bool {
        match path.parent() {
            None => true,
            Some(parent) if parent.parent().is_none() => true,
            Some(parent) => self.is_dir(parent),
        }
    }

    fn descendants<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = (&'a PathBuf, &'a Node)> {
        self.nodes
            .range(path.to_path_buf()..)
            .skip(1)
            .take_while(move |(p, _)| p.starts_with(path))
    }
}

impl ConfigFs for MemoryFs {
    fn create_dir(&mut self, path: &Path, exist_ok: bool) -> io::Result<()> {
        match self.nodes.get(path) {
            Some(Node::Dir | Node::DefaultGroup) if exist_ok => return Ok(()),
            Some(_) => return Err(already_exists(path)),
            None => {}
        }

        let ancestors = real_ancestors(path);
        for ancestor in &ancestors {
            match self.nodes.get(ancestor) {
                None | Some(Node::Dir | Node::DefaultGroup) => {}
                Some(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotADirectory,
                        format!("{} is not a directory", ancestor.display()),
                    ))
                }
            }
        }
        for ancestor in ancestors {
            let node = if ancestor == path {
                Node::Dir
            } else {
                Node::DefaultGroup
            };
            self.nodes.entry(ancestor).or_insert(node);
        }
        Ok(())
    }

    fn remove_dir(&mut self, path: &Path) -> io::Result<()> {
        match self.nodes.get(path) {
            Some(Node::Dir | Node::DefaultGroup) => {}
            Some(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{} is not a directory", path.display()),
                ))
            }
            None => return Err(not_found(path)),
        }

        if let Some((busy, _)) = self
            .descendants(path)
            .find(|(_, node)| matches!(node, Node::Dir | Node::Symlink(_)))
        {
            return Err(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                format!("{} still contains {}", path.display(), busy.display()),
            ));
        }

        let doomed: Vec<PathBuf> = self.descendants(path).map(|(p, _)| p.clone()).collect();
        for p in doomed {
            self.nodes.remove(&p);
        }
        self.nodes.remove(path);
        Ok(())
    }

    fn write_file(&mut self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if !self.parent_is_dir(path) {
            return Err(not_found(path));
        }
        if self.is_dir(path) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{} is a directory", path.display()),
            ));
        }
        self.nodes
            .insert(path.to_path_buf(), Node::File(contents.to_vec()));
        Ok(())
    }

    fn remove_path(&mut self, path: &Path) -> io::Result<()> {
        match self.nodes.get(path) {
            None => Err(not_found(path)),
            Some(Node::Dir | Node::DefaultGroup) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{} is a directory", path.display()),
            )),
            Some(_) => {
                self.nodes.remove(path);
                Ok(())
            }
        }
    }

    fn symlink(&mut self, target: &Path, link: &Path) -> io::Result<()> {
        if !self.parent_is_dir(link) {
            return Err(not_found(link));
        }
        if self.nodes.contains_key(link) {
            return Err(already_exists(link));
        }
        if !self.nodes.contains_key(target) {
            return Err(not_found(target));
        }
        self.nodes
            .insert(link.to_path_buf(), Node::Symlink(target.to_path_buf()));
        Ok(())
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.nodes.get(path) {
            Some(Node::File(content)) => Ok(content.clone()),
            Some(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    fn list_matching_names(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = Pattern::new(pattern)?;
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };

        let mut names: Vec<String> = self
            .nodes
            .keys()
            .filter(|path| pattern.matches_path_with(path, options))
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// `path` and its ancestors, outermost first, without the root or the empty path.
fn real_ancestors(path: &Path) -> Vec<PathBuf> {
    let mut ancestors: Vec<PathBuf> = path
        .ancestors()
        .filter(|a| a.parent().is_some())
        .map(Path::to_path_buf)
        .collect();
    ancestors.reverse();
    ancestors
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

fn already_exists(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{} already exists", path.display()),
    )
}
