use super::{untangle_trigger, FilterError, FilterOptions, UntangleFinding};
use crate::filter::matcher::PathMatcher;
use crate::filter::renumber::RenumberMap;
use crate::svn::dump::{DumpReader, Record};

// Scan mode walks the stream with the same inclusion and renumbering logic
// as the filter, but emits nothing and never touches the repository; it only
// reports which nodes would need untangling.

/// Returns the untangle findings the filter would produce for this input.
pub fn run(
    input: &mut dyn std::io::BufRead,
    matcher: &PathMatcher,
    options: &FilterOptions,
) -> Result<Vec<UntangleFinding>, FilterError> {
    let mut reader = DumpReader::new(input)?;
    let mut renumber = RenumberMap::new(options.renumber);
    let mut findings = Vec::new();

    let mut pending: Option<(u32, bool)> = None;
    loop {
        let at = reader.position();
        match reader.next_record()? {
            None => break,
            Some(Record::Uuid(_)) => {}
            Some(Record::Rev(rev)) => {
                if let Some((input_no, had_included)) = pending.take() {
                    close_rev(&mut renumber, options, input_no, had_included);
                }
                pending = Some((rev.rev_no, false));
            }
            Some(Record::Node(node)) => {
                let Some((input_no, ref mut had_included)) = pending else {
                    return Err(FilterError::NodeOutsideRevision { at });
                };
                if !matcher.is_included(&node.path) {
                    continue;
                }
                *had_included = true;

                let in_range = options
                    .start_revision
                    .is_none_or(|start| input_no >= start);
                if !in_range {
                    continue;
                }

                if let Some(finding) =
                    untangle_trigger(matcher, &renumber, options, input_no, &node)
                {
                    findings.push(finding);
                }
            }
        }
    }
    if let Some((input_no, had_included)) = pending.take() {
        close_rev(&mut renumber, options, input_no, had_included);
    }

    Ok(findings)
}

fn close_rev(renumber: &mut RenumberMap, options: &FilterOptions, input_no: u32, had_included: bool) {
    if had_included || options.keep_empty_revs || input_no == 0 {
        renumber.assign(input_no);
    } else {
        renumber.record_drop(input_no);
    }
}
