use std::collections::HashSet;

use crate::probe::{ProbeError, RepoProbe};
use crate::svn::dump::{
    DumpReader, NodeAction, NodeKind, NodeRecord, ReadError, Record, RevRecord,
};
use crate::svn::emit::DumpWriter;
use crate::svn::props::PropertyBlock;

pub mod matcher;
pub mod renumber;
pub mod scan;
mod untangle;

use matcher::PathMatcher;
use renumber::RenumberMap;

pub struct FilterOptions {
    /// Emit revisions whose nodes were all filtered out (`-k`).
    pub keep_empty_revs: bool,
    /// Renumber surviving revisions consecutively (off with `-s`).
    pub renumber: bool,
    /// Remove `svn:mergeinfo` properties (`-x`).
    pub strip_mergeinfo: bool,
    /// Revisions before this one feed the bookkeeping but are not emitted.
    pub start_revision: Option<u32>,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            keep_empty_revs: false,
            renumber: true,
            strip_mergeinfo: false,
            start_revision: None,
        }
    }
}

/// One node whose copy source cannot be carried over as a copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UntangleFinding {
    pub rev: u32,
    pub path: Vec<u8>,
    pub copyfrom_rev: u32,
    pub copyfrom_path: Vec<u8>,
}

#[derive(Default)]
pub struct FilterStats {
    pub revs_read: u32,
    pub revs_emitted: u32,
    pub revs_dropped: u32,
    pub nodes_read: u64,
    pub nodes_emitted: u64,
    pub nodes_synthesized: u64,
    pub findings: Vec<UntangleFinding>,
}

#[derive(Debug)]
pub enum FilterError {
    Read(ReadError),
    Write(std::io::Error),
    Probe(ProbeError),
    MissingUntangleSource {
        src_rev: u32,
        src_path: Vec<u8>,
        rev: u32,
        path: Vec<u8>,
    },
    InvalidCopyfromRev {
        copyfrom_rev: u32,
        rev: u32,
        path: Vec<u8>,
    },
    NodeOutsideRevision {
        at: u64,
    },
}

impl From<ReadError> for FilterError {
    #[inline]
    fn from(e: ReadError) -> Self {
        Self::Read(e)
    }
}

impl From<ProbeError> for FilterError {
    #[inline]
    fn from(e: ProbeError) -> Self {
        Self::Probe(e)
    }
}

impl std::fmt::Display for FilterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Read(ref e) => e.fmt(f),
            Self::Write(ref e) => write!(f, "failed to write output dump: {e}"),
            Self::Probe(ref e) => e.fmt(f),
            Self::MissingUntangleSource {
                src_rev,
                ref src_path,
                rev,
                ref path,
            } => write!(
                f,
                "cannot untangle \"{}\" at r{rev}: copy source \"{}\" not found at r{src_rev}",
                path.escape_ascii(),
                src_path.escape_ascii(),
            ),
            Self::InvalidCopyfromRev {
                copyfrom_rev,
                rev,
                ref path,
            } => write!(
                f,
                "node \"{}\" at r{rev} copies from r{copyfrom_rev}, which has no surviving \
                 revision in the output",
                path.escape_ascii(),
            ),
            Self::NodeOutsideRevision { at } => {
                write!(f, "node record outside a revision at byte {at}")
            }
        }
    }
}

/// Streams `input` through the filter, writing the carved dump to `output`.
pub fn run<'a>(
    input: &mut dyn std::io::BufRead,
    output: &'a mut dyn std::io::Write,
    matcher: &'a PathMatcher,
    probe: &'a dyn RepoProbe,
    options: &'a FilterOptions,
) -> Result<FilterStats, FilterError> {
    let mut reader = DumpReader::new(input)?;

    let mut writer = DumpWriter::new(output);
    writer
        .write_format(reader.version(), reader.format_trailing_blanks())
        .map_err(FilterError::Write)?;

    let mut filter = Filter {
        options,
        matcher,
        probe,
        writer,
        renumber: RenumberMap::new(options.renumber),
        emitted_dirs: HashSet::new(),
        copied_dirs: HashSet::new(),
        stats: FilterStats::default(),
    };

    let mut pending: Option<PendingRev> = None;
    loop {
        let at = reader.position();
        match reader.next_record()? {
            None => break,
            Some(Record::Uuid(uuid)) => {
                if pending.is_some() {
                    return Err(ReadError::UnexpectedRecord { at }.into());
                }
                filter.writer.write_uuid(&uuid).map_err(FilterError::Write)?;
            }
            Some(Record::Rev(rev)) => {
                if let Some(done) = pending.take() {
                    filter.close_rev(done)?;
                }
                pending = Some(PendingRev {
                    input_no: rev.rev_no,
                    rec: rev,
                    nodes: Vec::new(),
                    had_included: false,
                });
            }
            Some(Record::Node(node)) => {
                let Some(ref mut state) = pending else {
                    return Err(FilterError::NodeOutsideRevision { at });
                };
                filter.process_node(state, node)?;
            }
        }
    }
    if let Some(done) = pending.take() {
        filter.close_rev(done)?;
    }

    filter.writer.flush().map_err(FilterError::Write)?;
    Ok(filter.stats)
}

/// A revision held back until all its nodes are classified, so empty
/// revisions can be elided before anything is written.
pub(crate) struct PendingRev {
    pub(crate) input_no: u32,
    rec: RevRecord,
    pub(crate) nodes: Vec<NodeRecord>,
    had_included: bool,
}

pub(crate) struct Filter<'a> {
    options: &'a FilterOptions,
    matcher: &'a PathMatcher,
    pub(crate) probe: &'a dyn RepoProbe,
    writer: DumpWriter<&'a mut dyn std::io::Write>,
    renumber: RenumberMap,
    pub(crate) emitted_dirs: HashSet<Vec<u8>>,
    copied_dirs: HashSet<Vec<u8>>,
    pub(crate) stats: FilterStats,
}

impl Filter<'_> {
    fn can_write(&self, input_rev: u32) -> bool {
        self.options
            .start_revision
            .is_none_or(|start| input_rev >= start)
    }

    fn process_node(
        &mut self,
        state: &mut PendingRev,
        mut node: NodeRecord,
    ) -> Result<(), FilterError> {
        self.stats.nodes_read += 1;

        if !self.matcher.is_included(&node.path) {
            tracing::trace!(
                "dropping \"{}\" at r{}",
                node.path.escape_ascii(),
                state.input_no,
            );
            return Ok(());
        }
        state.had_included = true;

        if !self.can_write(state.input_no) {
            self.track_node_dirs(&node);
            return Ok(());
        }

        if self.options.strip_mergeinfo {
            if let Some(ref mut props) = node.props {
                if props.strip_mergeinfo() {
                    tracing::debug!(
                        "stripped svn:mergeinfo from \"{}\" at r{}",
                        node.path.escape_ascii(),
                        state.input_no,
                    );
                }
            }
        }

        if let Some(finding) = untangle_trigger(
            self.matcher,
            &self.renumber,
            self.options,
            state.input_no,
            &node,
        ) {
            tracing::info!(
                "untangling \"{}\" at r{}: copy source \"{}\" at r{} is not carried over",
                finding.path.escape_ascii(),
                finding.rev,
                finding.copyfrom_path.escape_ascii(),
                finding.copyfrom_rev,
            );
            self.stats.findings.push(finding);

            if node.text.is_some() && !node.text_delta {
                // The node carries its full content, so dropping the copy
                // source is enough to make it self-contained.
                node.strip_copy_from();
                let mut props = node.props.take().unwrap_or_default();
                props.mark_generated();
                node.props = Some(props);
            } else {
                let copy_from = node.copy_from.take().expect("trigger without copyfrom");
                return self.untangle_node(state, node, copy_from);
            }
        }

        self.buffer_node(state, node);
        Ok(())
    }

    /// Directory bookkeeping for revisions before the start revision: they
    /// were loaded from an earlier dump, so everything they created exists.
    fn track_node_dirs(&mut self, node: &NodeRecord) {
        for ancestor in ancestors(&node.path) {
            if self.matcher.is_included(ancestor) {
                self.emitted_dirs.insert(ancestor.to_vec());
            }
        }
        if matches!(node.action, NodeAction::Add | NodeAction::Replace)
            && node.kind == Some(NodeKind::Dir)
        {
            self.emitted_dirs.insert(node.path.clone());
            if node.copy_from.is_some() {
                self.copied_dirs.insert(node.path.clone());
            }
        }
    }

    /// Queues a node for emission, synthesizing any dependent directories it
    /// needs first.
    pub(crate) fn buffer_node(&mut self, state: &mut PendingRev, node: NodeRecord) {
        self.synthesize_ancestors(state, &node.path);
        if matches!(node.action, NodeAction::Add | NodeAction::Replace)
            && node.kind == Some(NodeKind::Dir)
        {
            self.emitted_dirs.insert(node.path.clone());
            if node.copy_from.is_some() {
                self.copied_dirs.insert(node.path.clone());
            }
        }
        state.nodes.push(node);
    }

    /// Emits `add dir` records for included ancestors of `path` that do not
    /// exist in the output yet, ancestor-first.
    pub(crate) fn synthesize_ancestors(&mut self, state: &mut PendingRev, path: &[u8]) {
        for ancestor in ancestors(path) {
            if !self.matcher.is_included(ancestor) || self.dir_exists(ancestor) {
                continue;
            }
            tracing::debug!(
                "adding dependent directory \"{}\" at r{}",
                ancestor.escape_ascii(),
                state.input_no,
            );
            let mut props = PropertyBlock::new();
            props.mark_generated();
            state
                .nodes
                .push(untangle::generated_node(ancestor, NodeKind::Dir, props, None));
            self.emitted_dirs.insert(ancestor.to_vec());
            self.stats.nodes_synthesized += 1;
        }
    }

    /// Whether a directory is already present in the output, either emitted
    /// explicitly or brought along implicitly by a directory copy.
    pub(crate) fn dir_exists(&self, path: &[u8]) -> bool {
        if self.emitted_dirs.contains(path) {
            return true;
        }
        if self.copied_dirs.contains(path) {
            return true;
        }
        ancestors(path).any(|ancestor| self.copied_dirs.contains(ancestor))
    }

    fn close_rev(&mut self, mut state: PendingRev) -> Result<(), FilterError> {
        self.stats.revs_read += 1;

        // Revision 0 cannot carry node records and is always kept.
        let keep = state.had_included || self.options.keep_empty_revs || state.input_no == 0;
        if !keep {
            tracing::debug!("dropping empty revision r{}", state.input_no);
            self.renumber.record_drop(state.input_no);
            self.stats.revs_dropped += 1;
            return Ok(());
        }

        let output_no = self.renumber.assign(state.input_no);

        if self.options.strip_mergeinfo {
            if let Some(ref mut props) = state.rec.props {
                props.strip_mergeinfo();
            }
        }
        state.rec.set_rev_no(output_no);

        for node in &mut state.nodes {
            if let Some(ref copy_from) = node.copy_from {
                let translated = self.renumber.translate_copyfrom(copy_from.rev).ok_or_else(
                    || FilterError::InvalidCopyfromRev {
                        copyfrom_rev: copy_from.rev,
                        rev: state.input_no,
                        path: node.path.clone(),
                    },
                )?;
                node.set_copyfrom_rev(translated);
            }
        }

        if self.can_write(state.input_no) {
            self.writer
                .write_rev(&mut state.rec)
                .map_err(FilterError::Write)?;
            for node in &mut state.nodes {
                self.writer.write_node(node).map_err(FilterError::Write)?;
                self.stats.nodes_emitted += 1;
            }
            self.stats.revs_emitted += 1;
        }
        Ok(())
    }
}

/// Proper ancestors of `path`, shallowest first.
fn ancestors(path: &[u8]) -> impl Iterator<Item = &[u8]> {
    path.iter()
        .enumerate()
        .filter(|&(_, &b)| b == b'/')
        .map(|(i, _)| &path[..i])
        .filter(|prefix| !prefix.is_empty())
}

/// Decides whether a node's copy source has to be untangled: the source path
/// is not carried over, its revision was elided, or it predates the start
/// revision.
pub(crate) fn untangle_trigger(
    matcher: &PathMatcher,
    renumber: &RenumberMap,
    options: &FilterOptions,
    input_rev: u32,
    node: &NodeRecord,
) -> Option<UntangleFinding> {
    let copy_from = node.copy_from.as_ref()?;

    let excluded_source = !matcher.is_included(&copy_from.path);
    let elided_source = renumber.is_dropped(copy_from.rev);
    let before_start = options
        .start_revision
        .is_some_and(|start| copy_from.rev < start);

    if excluded_source || elided_source || before_start {
        Some(UntangleFinding {
            rev: input_rev,
            path: node.path.clone(),
            copyfrom_rev: copy_from.rev,
            copyfrom_path: copy_from.path.clone(),
        })
    } else {
        None
    }
}
