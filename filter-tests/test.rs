use std::collections::BTreeMap;
use std::path::Path;

use svncarve::filter::matcher::{MatchMode, PathMatcher};
use svncarve::filter::{FilterOptions, UntangleFinding};
use svncarve::probe::FixtureProbe;
use svncarve::svn::props::PropertyBlock;

use crate::defs;

pub(crate) fn run_test(test_path: &Path) -> Result<(), String> {
    let test_def_raw =
        std::fs::read(test_path).map_err(|e| format!("failed to read {test_path:?}: {e}"))?;

    let test_def: defs::Test = serde_yaml::from_slice(&test_def_raw)
        .map_err(|e| format!("failed to parse {test_path:?}: {e}"))?;

    let mode = match test_def.mode {
        defs::Mode::Include => MatchMode::Include,
        defs::Mode::Exclude => MatchMode::Exclude,
    };
    let mut matcher = PathMatcher::new(mode);
    for path in &test_def.paths {
        matcher.add_prefix(path.as_bytes());
    }

    let options = FilterOptions {
        keep_empty_revs: test_def.keep_empty_revs,
        renumber: !test_def.stop_renumber_revs,
        strip_mergeinfo: test_def.strip_mergeinfo,
        start_revision: test_def.start_revision,
    };

    let probe = make_probe(&test_def);
    let input_dump = make_svn_dump(
        test_def.svn_dump_version,
        test_def.svn_uuid.as_deref(),
        &test_def.svn_revs,
    );

    let mut output = Vec::new();
    let filter_result = svncarve::filter::run(
        &mut input_dump.as_slice(),
        &mut output,
        &matcher,
        &probe,
        &options,
    );

    if let Some(ref expected_error) = test_def.expected_error {
        return match filter_result {
            Ok(_) => Err("expected the filter to fail, but it succeeded".into()),
            Err(e) => {
                let message = e.to_string();
                if message.contains(expected_error) {
                    Ok(())
                } else {
                    Err(format!(
                        "expected error containing {expected_error:?}, got {message:?}",
                    ))
                }
            }
        };
    }

    let stats = filter_result.map_err(|e| format!("filter failed: {e}"))?;

    let expected_findings: Vec<UntangleFinding> = test_def
        .expected_findings
        .iter()
        .map(|f| UntangleFinding {
            rev: f.rev,
            path: f.path.clone().into_bytes(),
            copyfrom_rev: f.copy_from_rev,
            copyfrom_path: f.copy_from_path.clone().into_bytes(),
        })
        .collect();
    if stats.findings != expected_findings {
        return Err(format!(
            "filter findings mismatch:\n  actual: {:?}\n  expected: {:?}",
            stats.findings, expected_findings,
        ));
    }

    // Scan mode must report exactly what the filter untangled.
    let scan_findings =
        svncarve::filter::scan::run(&mut input_dump.as_slice(), &matcher, &options)
            .map_err(|e| format!("scan failed: {e}"))?;
    if scan_findings != expected_findings {
        return Err(format!(
            "scan findings mismatch:\n  actual: {:?}\n  expected: {:?}",
            scan_findings, expected_findings,
        ));
    }

    if let Some(ref expected_revs) = test_def.expected_revs {
        let expected_dump = make_svn_dump(
            test_def.svn_dump_version,
            test_def.svn_uuid.as_deref(),
            expected_revs,
        );
        compare_dumps(&output, &expected_dump)?;
    }

    Ok(())
}

fn make_probe(test_def: &defs::Test) -> FixtureProbe {
    let mut probe = FixtureProbe::new();
    for node in &test_def.repo {
        let mut props = PropertyBlock::new();
        for (key, value) in &node.props {
            props.set(key.as_bytes(), value.clone().into_bytes());
        }
        match node.kind {
            defs::SvnNodeKind::File => probe.add_file(
                node.rev,
                node.path.as_bytes(),
                props,
                node.text.clone().unwrap_or_default().into_bytes(),
            ),
            defs::SvnNodeKind::Dir => probe.add_dir(node.rev, node.path.as_bytes(), props),
        }
    }
    probe
}

fn make_svn_dump(
    version: defs::SvnDumpVersion,
    uuid: Option<&str>,
    revs: &[defs::SvnRev],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(
        format!("SVN-fs-dump-format-version: {}\n\n", version.number()).as_bytes(),
    );
    if let Some(uuid) = uuid {
        out.extend_from_slice(format!("UUID: {uuid}\n\n").as_bytes());
    }

    let mut next_no = 0;
    for rev in revs {
        let no = rev.no.unwrap_or(next_no);
        next_no = no + 1;

        let props = props_block(&rev.props, false);
        out.extend_from_slice(format!("Revision-number: {no}\n").as_bytes());
        out.extend_from_slice(format!("Prop-content-length: {}\n", props.len()).as_bytes());
        out.extend_from_slice(format!("Content-length: {}\n", props.len()).as_bytes());
        out.extend_from_slice(b"\n");
        out.extend_from_slice(&props);
        out.extend_from_slice(b"\n");

        for node in &rev.nodes {
            append_node(&mut out, node);
        }
    }
    out
}

fn append_node(out: &mut Vec<u8>, node: &defs::SvnNode) {
    let no_props = BTreeMap::new();
    let props = if node.props.is_some() || node.generated {
        Some(props_block(
            node.props.as_ref().unwrap_or(&no_props),
            node.generated,
        ))
    } else {
        None
    };
    let text = node.text.as_ref().map(|t| t.as_bytes().to_vec());

    out.extend_from_slice(format!("Node-path: {}\n", node.path).as_bytes());
    if let Some(kind) = node.kind {
        out.extend_from_slice(format!("Node-kind: {}\n", kind.name()).as_bytes());
    }
    out.extend_from_slice(format!("Node-action: {}\n", node.action.name()).as_bytes());
    if let Some(copy_from_rev) = node.copy_from_rev {
        out.extend_from_slice(format!("Node-copyfrom-rev: {copy_from_rev}\n").as_bytes());
    }
    if let Some(ref copy_from_path) = node.copy_from_path {
        out.extend_from_slice(format!("Node-copyfrom-path: {copy_from_path}\n").as_bytes());
    }
    if node.text_hashes {
        use sha1::Digest as _;

        let text = text.as_deref().unwrap_or_default();
        let md5 = hex::encode(md5::Md5::digest(text));
        let sha1 = hex::encode(sha1::Sha1::digest(text));
        out.extend_from_slice(format!("Text-content-md5: {md5}\n").as_bytes());
        out.extend_from_slice(format!("Text-content-sha1: {sha1}\n").as_bytes());
    }
    if let Some(ref props) = props {
        out.extend_from_slice(format!("Prop-content-length: {}\n", props.len()).as_bytes());
    }
    if let Some(ref text) = text {
        out.extend_from_slice(format!("Text-content-length: {}\n", text.len()).as_bytes());
    }
    if props.is_some() || text.is_some() {
        let content_len =
            props.as_ref().map_or(0, |p| p.len()) + text.as_ref().map_or(0, |t| t.len());
        out.extend_from_slice(format!("Content-length: {content_len}\n").as_bytes());
    }
    out.extend_from_slice(b"\n");

    let has_body = props.is_some() || text.is_some();
    if let Some(ref props) = props {
        out.extend_from_slice(props);
    }
    if let Some(ref text) = text {
        out.extend_from_slice(text);
    }

    // svnadmin leaves two blank lines after node content, one after a
    // body-less record.
    if has_body {
        out.extend_from_slice(b"\n\n");
    } else {
        out.extend_from_slice(b"\n");
    }
}

fn props_block(props: &BTreeMap<String, String>, generated: bool) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in props {
        out.extend_from_slice(format!("K {}\n{}\n", key.len(), key).as_bytes());
        out.extend_from_slice(format!("V {}\n{}\n", value.len(), value).as_bytes());
    }
    if generated {
        out.extend_from_slice(b"K 23\nsvndumpfilter generated\nV 4\nTrue\n");
    }
    out.extend_from_slice(b"PROPS-END\n");
    out
}

fn compare_dumps(actual: &[u8], expected: &[u8]) -> Result<(), String> {
    if actual == expected {
        return Ok(());
    }

    let mismatch = actual
        .iter()
        .zip(expected.iter())
        .position(|(a, e)| a != e)
        .unwrap_or(actual.len().min(expected.len()));

    let context_start = mismatch.saturating_sub(60);
    let actual_end = (mismatch + 60).min(actual.len());
    let expected_end = (mismatch + 60).min(expected.len());

    Err(format!(
        "output dump mismatch at byte {mismatch}\n  actual   ({} bytes): ...{}...\n  expected ({} bytes): ...{}...",
        actual.len(),
        actual[context_start..actual_end].escape_ascii(),
        expected.len(),
        expected[context_start..expected_end].escape_ascii(),
    ))
}
