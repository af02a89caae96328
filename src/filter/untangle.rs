use super::{Filter, FilterError, PendingRev};
use crate::svn::dump::{
    Headers, NodeAction, NodeCopyFrom, NodeKind, NodeRecord, NODE_ACTION, NODE_KIND, NODE_PATH,
};
use crate::svn::props::PropertyBlock;

// Rewrites a copy-from-excluded-source node into self-contained adds whose
// content comes from the repository probe. File sources are inlined into the
// node itself; directory sources are expanded into one synthesized add per
// descendant.

impl Filter<'_> {
    pub(super) fn untangle_node(
        &mut self,
        state: &mut PendingRev,
        node: NodeRecord,
        copy_from: NodeCopyFrom,
    ) -> Result<(), FilterError> {
        let source = self
            .probe
            .lookup(copy_from.rev, &copy_from.path)?
            .ok_or_else(|| FilterError::MissingUntangleSource {
                src_rev: copy_from.rev,
                src_path: copy_from.path.clone(),
                rev: state.input_no,
                path: node.path.clone(),
            })?;

        match source.kind {
            NodeKind::File => {
                let mut node = node;
                // The node's own property entries win over the retrieved ones.
                let mut props = source.props.overlaid(node.props.as_ref());
                if self.options.strip_mergeinfo {
                    props.strip_mergeinfo();
                }
                props.mark_generated();
                node.replace_props(props);
                node.set_kind(NodeKind::File);
                node.strip_copy_from();
                node.replace_text(source.content.unwrap_or_default());
                // The node gained a body; give it the spacing svnadmin uses
                // for body-carrying records.
                node.trailing_blanks = node.trailing_blanks.max(2);
                self.buffer_node(state, node);
            }
            NodeKind::Dir => {
                self.untangle_dir(state, &node, &copy_from, source.props)?;
            }
        }
        Ok(())
    }

    fn untangle_dir(
        &mut self,
        state: &mut PendingRev,
        node: &NodeRecord,
        copy_from: &NodeCopyFrom,
        source_props: PropertyBlock,
    ) -> Result<(), FilterError> {
        self.synthesize_ancestors(state, &node.path);

        // A replace is a delete plus an add; the synthesized add alone would
        // collide with the existing destination.
        if node.action == NodeAction::Replace {
            state.nodes.push(generated_delete(&node.path));
            self.stats.nodes_synthesized += 1;
        }

        let mut dest_props = source_props.overlaid(node.props.as_ref());
        if self.options.strip_mergeinfo {
            dest_props.strip_mergeinfo();
        }
        dest_props.mark_generated();
        state
            .nodes
            .push(generated_node(&node.path, NodeKind::Dir, dest_props, None));
        self.emitted_dirs.insert(node.path.clone());
        self.stats.nodes_synthesized += 1;

        let mut src_prefix = copy_from.path.clone();
        src_prefix.push(b'/');

        for (src_path, kind) in self.probe.tree(copy_from.rev, &copy_from.path)? {
            let Some(rel) = src_path.strip_prefix(src_prefix.as_slice()) else {
                continue;
            };
            let mut dest_path = node.path.clone();
            dest_path.push(b'/');
            dest_path.extend_from_slice(rel);

            let item = self.probe.lookup(copy_from.rev, &src_path)?.ok_or_else(|| {
                FilterError::MissingUntangleSource {
                    src_rev: copy_from.rev,
                    src_path: src_path.clone(),
                    rev: state.input_no,
                    path: dest_path.clone(),
                }
            })?;

            let mut props = item.props;
            if self.options.strip_mergeinfo {
                props.strip_mergeinfo();
            }
            props.mark_generated();

            match kind {
                NodeKind::Dir => {
                    state
                        .nodes
                        .push(generated_node(&dest_path, NodeKind::Dir, props, None));
                    self.emitted_dirs.insert(dest_path);
                }
                NodeKind::File => {
                    state.nodes.push(generated_node(
                        &dest_path,
                        NodeKind::File,
                        props,
                        Some(item.content.unwrap_or_default()),
                    ));
                }
            }
            self.stats.nodes_synthesized += 1;
        }
        Ok(())
    }
}

/// Builds a synthesized `add` record. Headers follow the canonical order;
/// the emitter appends the length headers.
pub(super) fn generated_node(
    path: &[u8],
    kind: NodeKind,
    props: PropertyBlock,
    text: Option<Vec<u8>>,
) -> NodeRecord {
    let mut headers = Headers::new();
    headers.push(NODE_PATH, path.to_vec());
    headers.push(NODE_KIND, kind.name().to_vec());
    headers.push(NODE_ACTION, b"add".to_vec());

    let mut record = NodeRecord {
        headers,
        path: path.to_vec(),
        kind: Some(kind),
        action: NodeAction::Add,
        copy_from: None,
        props: Some(props),
        props_delta: false,
        text: None,
        text_delta: false,
        trailing_blanks: 2,
    };
    if let Some(text) = text {
        record.replace_text(text);
    }
    record
}

fn generated_delete(path: &[u8]) -> NodeRecord {
    let mut headers = Headers::new();
    headers.push(NODE_PATH, path.to_vec());
    headers.push(NODE_ACTION, b"delete".to_vec());

    NodeRecord {
        headers,
        path: path.to_vec(),
        kind: None,
        action: NodeAction::Delete,
        copy_from: None,
        props: None,
        props_delta: false,
        text: None,
        text_delta: false,
        trailing_blanks: 1,
    }
}
