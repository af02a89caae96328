use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::svn::dump::NodeKind;
use crate::svn::props::PropertyBlock;

/// One path as it exists in the repository at some revision.
#[derive(Clone)]
pub struct ProbedNode {
    pub kind: NodeKind,
    pub props: PropertyBlock,
    /// File content; `None` for directories.
    pub content: Option<Vec<u8>>,
}

#[derive(Debug)]
pub enum ProbeError {
    SpawnProcessError {
        arg0: std::ffi::OsString,
        error: std::io::Error,
    },
    CommandFailed {
        subcommand: &'static str,
        rev: u32,
        path: Vec<u8>,
        stderr: Vec<u8>,
    },
    UnexpectedOutput {
        subcommand: &'static str,
        rev: u32,
        path: Vec<u8>,
    },
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpawnProcessError { arg0, error } => {
                write!(f, "failed to spawn process {arg0:?}: {error}")
            }
            Self::CommandFailed {
                subcommand,
                rev,
                path,
                stderr,
            } => write!(
                f,
                "svnlook {subcommand} failed for \"{}\" at r{rev}: {}",
                path.escape_ascii(),
                String::from_utf8_lossy(stderr).trim_end(),
            ),
            Self::UnexpectedOutput {
                subcommand,
                rev,
                path,
            } => write!(
                f,
                "unexpected svnlook {subcommand} output for \"{}\" at r{rev}",
                path.escape_ascii(),
            ),
        }
    }
}

/// Read-only access to repository contents that the dump stream itself does
/// not carry. Invoked only when a copy source has to be untangled.
pub trait RepoProbe {
    /// Returns the node at `(rev, path)`, or `None` when the path does not
    /// exist in that revision.
    fn lookup(&self, rev: u32, path: &[u8]) -> Result<Option<ProbedNode>, ProbeError>;

    /// Recursive descendant listing of a directory in depth-first
    /// lexicographic order. The root itself is not part of the listing.
    fn tree(&self, rev: u32, path: &[u8]) -> Result<Vec<(Vec<u8>, NodeKind)>, ProbeError>;
}

/// Production probe shelling out to svnlook.
pub struct SvnlookProbe {
    repo: PathBuf,
}

impl SvnlookProbe {
    pub fn new(repo: PathBuf) -> Self {
        Self { repo }
    }

    fn run(
        &self,
        subcommand: &'static str,
        extra_args: &[&[u8]],
        rev: u32,
        path: &[u8],
    ) -> Result<Result<Vec<u8>, Vec<u8>>, ProbeError> {
        use std::os::unix::ffi::OsStrExt as _;

        let mut command = std::process::Command::new("svnlook");
        command
            .arg(subcommand)
            .arg("-r")
            .arg(rev.to_string())
            .arg(&self.repo);
        for arg in extra_args {
            command.arg(std::ffi::OsStr::from_bytes(arg));
        }
        command.arg(std::ffi::OsStr::from_bytes(path));

        let output = command
            .stdin(std::process::Stdio::null())
            .output()
            .map_err(|e| ProbeError::SpawnProcessError {
                arg0: "svnlook".into(),
                error: e,
            })?;

        if output.status.success() {
            Ok(Ok(output.stdout))
        } else {
            Ok(Err(output.stderr))
        }
    }

    fn proplist(&self, rev: u32, path: &[u8]) -> Result<PropertyBlock, ProbeError> {
        let names = match self.run("proplist", &[], rev, path)? {
            Ok(out) => out,
            Err(stderr) => {
                return Err(ProbeError::CommandFailed {
                    subcommand: "proplist",
                    rev,
                    path: path.to_vec(),
                    stderr,
                });
            }
        };

        let mut props = PropertyBlock::new();
        for line in names.split(|&b| b == b'\n') {
            let name = line.trim_ascii();
            if name.is_empty() {
                continue;
            }
            let value = match self.run("propget", &[name], rev, path)? {
                Ok(out) => out,
                Err(stderr) => {
                    return Err(ProbeError::CommandFailed {
                        subcommand: "propget",
                        rev,
                        path: path.to_vec(),
                        stderr,
                    });
                }
            };
            props.set(name, value);
        }
        Ok(props)
    }
}

fn stderr_means_not_found(stderr: &[u8]) -> bool {
    // E160013: file not found; E160006: no such revision
    stderr.windows(7).any(|w| w == b"E160013" || w == b"E160006")
}

impl RepoProbe for SvnlookProbe {
    fn lookup(&self, rev: u32, path: &[u8]) -> Result<Option<ProbedNode>, ProbeError> {
        let listing = match self.run("tree", &[b"--full-paths", b"--non-recursive"], rev, path)? {
            Ok(out) => out,
            Err(stderr) => {
                if stderr_means_not_found(&stderr) {
                    return Ok(None);
                }
                return Err(ProbeError::CommandFailed {
                    subcommand: "tree",
                    rev,
                    path: path.to_vec(),
                    stderr,
                });
            }
        };

        let entry = listing
            .split(|&b| b == b'\n')
            .find(|line| !line.trim_ascii().is_empty())
            .ok_or(ProbeError::UnexpectedOutput {
                subcommand: "tree",
                rev,
                path: path.to_vec(),
            })?;
        let kind = if entry.ends_with(b"/") {
            NodeKind::Dir
        } else {
            NodeKind::File
        };

        let props = self.proplist(rev, path)?;

        let content = match kind {
            NodeKind::Dir => None,
            NodeKind::File => match self.run("cat", &[], rev, path)? {
                Ok(out) => Some(out),
                Err(stderr) => {
                    return Err(ProbeError::CommandFailed {
                        subcommand: "cat",
                        rev,
                        path: path.to_vec(),
                        stderr,
                    });
                }
            },
        };

        Ok(Some(ProbedNode {
            kind,
            props,
            content,
        }))
    }

    fn tree(&self, rev: u32, path: &[u8]) -> Result<Vec<(Vec<u8>, NodeKind)>, ProbeError> {
        let listing = match self.run("tree", &[b"--full-paths"], rev, path)? {
            Ok(out) => out,
            Err(stderr) => {
                return Err(ProbeError::CommandFailed {
                    subcommand: "tree",
                    rev,
                    path: path.to_vec(),
                    stderr,
                });
            }
        };

        let mut entries = Vec::new();
        for line in listing.split(|&b| b == b'\n') {
            if line.trim_ascii().is_empty() {
                continue;
            }
            let (entry_path, kind) = match line.strip_suffix(b"/") {
                Some(dir_path) => (dir_path, NodeKind::Dir),
                None => (line, NodeKind::File),
            };
            // The first line repeats the queried root
            if entry_path == path {
                continue;
            }
            entries.push((entry_path.to_vec(), kind));
        }
        Ok(entries)
    }
}

/// In-memory probe backed by a fixture tree; the test-suite counterpart of
/// [`SvnlookProbe`].
#[derive(Default)]
pub struct FixtureProbe {
    nodes: BTreeMap<(u32, Vec<u8>), ProbedNode>,
}

impl FixtureProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, rev: u32, path: &[u8], props: PropertyBlock, content: Vec<u8>) {
        self.nodes.insert(
            (rev, path.to_vec()),
            ProbedNode {
                kind: NodeKind::File,
                props,
                content: Some(content),
            },
        );
    }

    pub fn add_dir(&mut self, rev: u32, path: &[u8], props: PropertyBlock) {
        self.nodes.insert(
            (rev, path.to_vec()),
            ProbedNode {
                kind: NodeKind::Dir,
                props,
                content: None,
            },
        );
    }
}

impl RepoProbe for FixtureProbe {
    fn lookup(&self, rev: u32, path: &[u8]) -> Result<Option<ProbedNode>, ProbeError> {
        Ok(self.nodes.get(&(rev, path.to_vec())).cloned())
    }

    fn tree(&self, rev: u32, path: &[u8]) -> Result<Vec<(Vec<u8>, NodeKind)>, ProbeError> {
        let mut prefix = path.to_vec();
        prefix.push(b'/');

        let entries = self
            .nodes
            .iter()
            .filter(|((node_rev, node_path), _)| {
                *node_rev == rev && node_path.starts_with(&prefix)
            })
            .map(|((_, node_path), node)| (node_path.clone(), node.kind))
            .collect();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::{FixtureProbe, RepoProbe as _};
    use crate::svn::dump::NodeKind;
    use crate::svn::props::PropertyBlock;

    #[test]
    fn test_fixture_lookup_and_tree() {
        let mut probe = FixtureProbe::new();
        probe.add_dir(7, b"b/y", PropertyBlock::new());
        probe.add_file(7, b"b/y/c", PropertyBlock::new(), b"cc".to_vec());
        probe.add_file(7, b"b/y/d", PropertyBlock::new(), b"dd".to_vec());
        probe.add_file(8, b"b/y/late", PropertyBlock::new(), b"nope".to_vec());

        let hit = probe.lookup(7, b"b/y/c").unwrap().unwrap();
        assert_eq!(hit.kind, NodeKind::File);
        assert_eq!(hit.content.as_deref(), Some(b"cc".as_slice()));

        assert!(probe.lookup(7, b"b/missing").unwrap().is_none());

        let tree = probe.tree(7, b"b/y").unwrap();
        assert_eq!(
            tree,
            vec![
                (b"b/y/c".to_vec(), NodeKind::File),
                (b"b/y/d".to_vec(), NodeKind::File),
            ],
        );
    }
}
