//! # Steps
//!
//! A [`Step`] is one atomic filesystem operation against a configfs tree:
//! create or remove a directory, write an attribute file, create or remove a
//! symlink, or carry a comment for the rendered script. A [`Steps`] value is
//! an ordered sequence of them; the order is the execution order.
//!
//! Steps are plain values. Prefixing and undoing produce new steps, so a
//! sequence built for one function can be embedded unchanged inside a larger
//! gadget by prefixing it with the function's directory.
//!
//! ## Inverses
//!
//! | Step                  | Undo                    |
//! |-----------------------|-------------------------|
//! | `Mkdir`               | `Rmdir`                 |
//! | `MkdirCreateOnly`     | `Rmdir`                 |
//! | `Symlink`             | `Remove` of the link    |
//! | everything else       | `Noop`                  |
//!
//! Writes have no inverse. The attribute files they create disappear with
//! their directory once nothing but attributes is left beneath it, so a
//! teardown only needs to remove links and directories, deepest first:
//! [`Steps::teardown`] undoes every step and reverses the order.

use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, warn};

use crate::error::{Error, FailureKind, Result};
use crate::filesystem::ConfigFs;

/// The kind of a [`Step`], without its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Noop,
    Comment,
    Mkdir,
    MkdirCreateOnly,
    Rmdir,
    Write,
    WriteBinary,
    Remove,
    Symlink,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Noop => "noop",
            Action::Comment => "comment",
            Action::Mkdir => "mkdir",
            Action::MkdirCreateOnly => "mkdir-create-only",
            Action::Rmdir => "rmdir",
            Action::Write => "write",
            Action::WriteBinary => "write-binary",
            Action::Remove => "remove",
            Action::Symlink => "symlink",
        };
        f.write_str(s)
    }
}

/// One filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Noop,
    /// Free text, only visible in the rendered script.
    Comment(String),
    /// Create a directory and its parents; fails if it already exists.
    Mkdir(PathBuf),
    /// Create a directory and its parents; an existing directory is fine.
    MkdirCreateOnly(PathBuf),
    Rmdir(PathBuf),
    /// Write text to an attribute file. Empty content writes nothing.
    Write { path: PathBuf, content: String },
    /// Write raw bytes to an attribute file. Empty content writes nothing.
    WriteBinary { path: PathBuf, content: Vec<u8> },
    /// Remove a file or symlink.
    Remove(PathBuf),
    /// Create `link` pointing at `target`.
    Symlink { target: PathBuf, link: PathBuf },
}

impl Step {
    pub fn comment(text: impl Into<String>) -> Self {
        Step::Comment(text.into())
    }

    pub fn mkdir(path: impl Into<PathBuf>) -> Self {
        Step::Mkdir(path.into())
    }

    pub fn mkdir_create_only(path: impl Into<PathBuf>) -> Self {
        Step::MkdirCreateOnly(path.into())
    }

    pub fn rmdir(path: impl Into<PathBuf>) -> Self {
        Step::Rmdir(path.into())
    }

    pub fn write(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Step::Write {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn write_binary(path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Step::WriteBinary {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn remove(path: impl Into<PathBuf>) -> Self {
        Step::Remove(path.into())
    }

    pub fn symlink(target: impl Into<PathBuf>, link: impl Into<PathBuf>) -> Self {
        Step::Symlink {
            target: target.into(),
            link: link.into(),
        }
    }

    pub fn action(&self) -> Action {
        match self {
            Step::Noop => Action::Noop,
            Step::Comment(_) => Action::Comment,
            Step::Mkdir(_) => Action::Mkdir,
            Step::MkdirCreateOnly(_) => Action::MkdirCreateOnly,
            Step::Rmdir(_) => Action::Rmdir,
            Step::Write { .. } => Action::Write,
            Step::WriteBinary { .. } => Action::WriteBinary,
            Step::Remove(_) => Action::Remove,
            Step::Symlink { .. } => Action::Symlink,
        }
    }

    /// The path this step operates on. For a symlink this is the target.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Step::Noop | Step::Comment(_) => None,
            Step::Mkdir(path)
            | Step::MkdirCreateOnly(path)
            | Step::Rmdir(path)
            | Step::Remove(path)
            | Step::Write { path, .. }
            | Step::WriteBinary { path, .. } => Some(path),
            Step::Symlink { target, .. } => Some(target),
        }
    }

    /// Execute this step against `fs`.
    pub fn run<F: ConfigFs + ?Sized>(&self, fs: &mut F) -> io::Result<()> {
        match self {
            Step::Noop | Step::Comment(_) => Ok(()),
            Step::Mkdir(path) => fs.create_dir(path, false),
            Step::MkdirCreateOnly(path) => fs.create_dir(path, true),
            Step::Rmdir(path) => fs.remove_dir(path),
            Step::Write { path, content } => {
                if content.is_empty() {
                    Ok(())
                } else {
                    fs.write_file(path, content.as_bytes())
                }
            }
            Step::WriteBinary { path, content } => {
                if content.is_empty() {
                    Ok(())
                } else {
                    fs.write_file(path, content)
                }
            }
            Step::Remove(path) => fs.remove_path(path),
            Step::Symlink { target, link } => fs.symlink(target, link),
        }
    }

    /// The step that reverses this one.
    pub fn undo(&self) -> Step {
        match self {
            Step::Mkdir(path) | Step::MkdirCreateOnly(path) => Step::Rmdir(path.clone()),
            Step::Symlink { link, .. } => Step::Remove(link.clone()),
            _ => Step::Noop,
        }
    }

    /// Rewrite the paths of this step so they live under `prefix`.
    ///
    /// Both ends of a symlink move. Comments and no-ops are returned as is.
    pub fn prefix(self, prefix: &Path) -> Step {
        match self {
            Step::Noop | Step::Comment(_) => self,
            Step::Mkdir(path) => Step::Mkdir(join_prefix(prefix, &path)),
            Step::MkdirCreateOnly(path) => Step::MkdirCreateOnly(join_prefix(prefix, &path)),
            Step::Rmdir(path) => Step::Rmdir(join_prefix(prefix, &path)),
            Step::Remove(path) => Step::Remove(join_prefix(prefix, &path)),
            Step::Write { path, content } => Step::Write {
                path: join_prefix(prefix, &path),
                content,
            },
            Step::WriteBinary { path, content } => Step::WriteBinary {
                path: join_prefix(prefix, &path),
                content,
            },
            Step::Symlink { target, link } => Step::Symlink {
                target: join_prefix(prefix, &target),
                link: join_prefix(prefix, &link),
            },
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Noop => write!(f, "{}", self.action()),
            Step::Comment(text) => write!(f, "{} {:?}", self.action(), text),
            Step::Mkdir(path)
            | Step::MkdirCreateOnly(path)
            | Step::Rmdir(path)
            | Step::Remove(path) => write!(f, "{} {}", self.action(), path.display()),
            Step::Write { path, content } => {
                write!(f, "{} {} {:?}", self.action(), path.display(), content)
            }
            Step::WriteBinary { path, content } => write!(
                f,
                "{} {} {}",
                self.action(),
                path.display(),
                STANDARD.encode(content)
            ),
            Step::Symlink { target, link } => write!(
                f,
                "{} {} -> {}",
                self.action(),
                link.display(),
                target.display()
            ),
        }
    }
}

/// Join `path` under `prefix`. An empty `path` names the prefix itself.
///
/// A leading root or drive prefix on `path` is dropped, so the result always
/// nests under `prefix`.
pub fn join_prefix(prefix: &Path, path: &Path) -> PathBuf {
    let relative: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    if relative.as_os_str().is_empty() {
        prefix.to_path_buf()
    } else {
        prefix.join(relative)
    }
}

/// An ordered sequence of steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Steps(Vec<Step>);

impl Steps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one step.
    pub fn push(&mut self, step: Step) {
        self.0.push(step);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Step] {
        &self.0
    }

    /// Prefix every step with `path`.
    pub fn prefix(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        self.0.into_iter().map(|step| step.prefix(path)).collect()
    }

    /// Map every step to its inverse, keeping the order.
    pub fn undo(&self) -> Self {
        self.0.iter().map(Step::undo).collect()
    }

    /// Flip the order of the sequence.
    pub fn reverse(mut self) -> Self {
        self.0.reverse();
        self
    }

    /// The sequence that tears down what this one creates.
    pub fn teardown(&self) -> Self {
        self.undo().reverse()
    }

    /// Execute every step in order, stopping at the first failure.
    ///
    /// Steps that already ran are left in place.
    pub fn run<F: ConfigFs + ?Sized>(&self, fs: &mut F) -> Result<()> {
        for (index, step) in self.0.iter().enumerate() {
            if step.action() == Action::Noop {
                continue;
            }
            debug!("step {}: {}", index, step);

            if let Err(source) = step.run(fs) {
                let kind = FailureKind::classify(step.action(), &source);
                warn!("step {} `{}` failed: {}", index, step, source);
                return Err(Error::Step {
                    index,
                    step: step.clone(),
                    kind,
                    source,
                });
            }
        }

        Ok(())
    }
}

impl From<Vec<Step>> for Steps {
    fn from(steps: Vec<Step>) -> Self {
        Steps(steps)
    }
}

impl FromIterator<Step> for Steps {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self {
        Steps(iter.into_iter().collect())
    }
}

impl Extend<Step> for Steps {
    fn extend<I: IntoIterator<Item = Step>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for Steps {
    type Item = Step;
    type IntoIter = std::vec::IntoIter<Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Steps {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::MemoryFs;

    #[test]
    fn test_undo_table() {
        assert_eq!(Step::mkdir("a").undo(), Step::rmdir("a"));
        assert_eq!(Step::mkdir_create_only("a").undo(), Step::rmdir("a"));
        assert_eq!(Step::symlink("t", "l").undo(), Step::remove("l"));
        assert_eq!(Step::rmdir("a").undo(), Step::Noop);
        assert_eq!(Step::write("a", "1").undo(), Step::Noop);
        assert_eq!(Step::write_binary("a", vec![1]).undo(), Step::Noop);
        assert_eq!(Step::remove("a").undo(), Step::Noop);
        assert_eq!(Step::comment("x").undo(), Step::Noop);
        assert_eq!(Step::Noop.undo(), Step::Noop);
    }

    #[test]
    fn test_prefix_rewrites_paths() {
        let root = Path::new("g1");
        assert_eq!(Step::mkdir("").prefix(root), Step::mkdir("g1"));
        assert_eq!(
            Step::write("idVendor", "0x1d6b").prefix(root),
            Step::write("g1/idVendor", "0x1d6b")
        );
        assert_eq!(
            Step::symlink("functions/hid.kbd", "configs/c.1/hid.kbd").prefix(root),
            Step::symlink("g1/functions/hid.kbd", "g1/configs/c.1/hid.kbd")
        );
    }

    #[test]
    fn test_prefix_leaves_comments_alone() {
        let root = Path::new("g1");
        assert_eq!(
            Step::comment("config `c.1`").prefix(root),
            Step::comment("config `c.1`")
        );
        assert_eq!(Step::Noop.prefix(root), Step::Noop);
    }

    #[test]
    fn test_join_prefix_empty_path_is_prefix() {
        assert_eq!(join_prefix(Path::new("g1"), Path::new("")), PathBuf::from("g1"));
        assert_eq!(join_prefix(Path::new(""), Path::new("a")), PathBuf::from("a"));
        assert_eq!(
            join_prefix(Path::new("/sys/kernel"), Path::new("a/b")),
            PathBuf::from("/sys/kernel/a/b")
        );
    }

    #[test]
    fn test_join_prefix_nests_absolute_paths() {
        assert_eq!(
            join_prefix(Path::new("g1"), Path::new("/etc/c.1")),
            PathBuf::from("g1/etc/c.1")
        );
        assert_eq!(join_prefix(Path::new("g1"), Path::new("/")), PathBuf::from("g1"));
        assert_eq!(
            Step::symlink("/functions/acm.a", "/configs/c.1/acm.a").prefix(Path::new("g1")),
            Step::symlink("g1/functions/acm.a", "g1/configs/c.1/acm.a")
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Step::mkdir("g1").to_string(), "mkdir g1");
        assert_eq!(
            Step::write("g1/UDC", "fe980000.usb").to_string(),
            "write g1/UDC \"fe980000.usb\""
        );
        assert_eq!(
            Step::write_binary("d", vec![5, 1]).to_string(),
            "write-binary d BQE="
        );
        assert_eq!(Step::symlink("t", "l").to_string(), "symlink l -> t");
    }

    #[test]
    fn test_teardown_undoes_and_reverses() {
        let steps = Steps::from(vec![
            Step::mkdir("g1"),
            Step::write("g1/idVendor", "0x1d6b"),
            Step::mkdir("g1/functions/acm.usb0"),
            Step::symlink("g1/functions/acm.usb0", "g1/configs/c.1/acm.usb0"),
        ]);

        let teardown = steps.teardown();
        assert_eq!(
            teardown,
            Steps::from(vec![
                Step::remove("g1/configs/c.1/acm.usb0"),
                Step::rmdir("g1/functions/acm.usb0"),
                Step::Noop,
                Step::rmdir("g1"),
            ])
        );
    }

    #[test]
    fn test_run_skips_empty_writes() {
        let mut fs = MemoryFs::new();
        let steps = Steps::from(vec![
            Step::mkdir("g1"),
            Step::write("g1/serialnumber", ""),
            Step::write_binary("g1/report_desc", Vec::new()),
        ]);

        steps.run(&mut fs).unwrap();
        assert!(fs.is_dir("g1"));
        assert!(!fs.exists("g1/serialnumber"));
        assert!(!fs.exists("g1/report_desc"));
    }

    #[test]
    fn test_run_stops_at_first_failure() {
        let mut fs = MemoryFs::new();
        let steps = Steps::from(vec![
            Step::mkdir("g1"),
            Step::comment("next one fails"),
            Step::write("g1/missing/attr", "1"),
            Step::mkdir("g1/never"),
        ]);

        let err = steps.run(&mut fs).unwrap_err();
        match err {
            Error::Step {
                index, step, kind, ..
            } => {
                assert_eq!(index, 2);
                assert_eq!(step, Step::write("g1/missing/attr", "1"));
                assert_eq!(kind, FailureKind::MissingParent);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Nothing is rolled back, nothing after the failure ran.
        assert!(fs.is_dir("g1"));
        assert!(!fs.exists("g1/never"));
    }

    #[test]
    fn test_run_strict_mkdir_rejects_existing() {
        let mut fs = MemoryFs::new();
        fs.add_dir("g1");

        let err = Steps::from(vec![Step::mkdir("g1")])
            .run(&mut fs)
            .unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::AlreadyExists));

        Steps::from(vec![Step::mkdir_create_only("g1")])
            .run(&mut fs)
            .unwrap();
    }

    #[test]
    fn test_run_symlink_conflict() {
        let mut fs = MemoryFs::new();
        let steps = Steps::from(vec![
            Step::mkdir("g1/functions/acm.a"),
            Step::mkdir("g1/configs/c.1"),
            Step::symlink("g1/functions/acm.a", "g1/configs/c.1/acm.a"),
            Step::symlink("g1/functions/acm.a", "g1/configs/c.1/acm.a"),
        ]);

        let err = steps.run(&mut fs).unwrap_err();
        assert_eq!(err.failure_kind(), Some(FailureKind::LinkConflict));
    }

    #[test]
    fn test_run_logs_failure() {
        testing_logger::setup();

        let mut fs = MemoryFs::new();
        let result = Steps::from(vec![Step::rmdir("absent")]).run(&mut fs);
        assert!(result.is_err());

        testing_logger::validate(|captured_logs| {
            let warnings: Vec<_> = captured_logs
                .iter()
                .filter(|log| log.level == log::Level::Warn)
                .collect();
            assert_eq!(warnings.len(), 1);
            assert!(warnings[0].body.contains("step 0 `rmdir absent` failed"));
        });
    }
}
