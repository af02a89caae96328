use std::collections::BTreeMap;

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Test {
    #[serde(rename = "svn-dump-version", default = "dump_version_2")]
    pub(crate) svn_dump_version: SvnDumpVersion,
    #[serde(rename = "svn-uuid")]
    pub(crate) svn_uuid: Option<String>,
    pub(crate) mode: Mode,
    #[serde(default = "Vec::new")]
    pub(crate) paths: Vec<String>,
    #[serde(rename = "keep-empty-revs", default = "false_")]
    pub(crate) keep_empty_revs: bool,
    #[serde(rename = "stop-renumber-revs", default = "false_")]
    pub(crate) stop_renumber_revs: bool,
    #[serde(rename = "strip-mergeinfo", default = "false_")]
    pub(crate) strip_mergeinfo: bool,
    #[serde(rename = "start-revision")]
    pub(crate) start_revision: Option<u32>,
    /// Repository contents visible to the probe, keyed by revision and path.
    #[serde(default = "Vec::new")]
    pub(crate) repo: Vec<RepoNode>,
    #[serde(rename = "svn-revs")]
    pub(crate) svn_revs: Vec<SvnRev>,
    #[serde(rename = "expected-revs")]
    pub(crate) expected_revs: Option<Vec<SvnRev>>,
    #[serde(rename = "expected-findings", default = "Vec::new")]
    pub(crate) expected_findings: Vec<Finding>,
    /// Substring expected in the filter error message.
    #[serde(rename = "expected-error")]
    pub(crate) expected_error: Option<String>,
}

#[derive(serde::Deserialize, Copy, Clone)]
pub(crate) enum Mode {
    #[serde(rename = "include")]
    Include,
    #[serde(rename = "exclude")]
    Exclude,
}

#[derive(serde::Deserialize, Copy, Clone)]
pub(crate) enum SvnDumpVersion {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
}

impl SvnDumpVersion {
    pub(crate) fn number(self) -> u32 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

#[inline(always)]
fn dump_version_2() -> SvnDumpVersion {
    SvnDumpVersion::Two
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RepoNode {
    pub(crate) rev: u32,
    pub(crate) path: String,
    pub(crate) kind: SvnNodeKind,
    #[serde(default = "BTreeMap::new")]
    pub(crate) props: BTreeMap<String, String>,
    pub(crate) text: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SvnRev {
    pub(crate) no: Option<u32>,
    #[serde(default = "BTreeMap::new")]
    pub(crate) props: BTreeMap<String, String>,
    #[serde(default = "Vec::new")]
    pub(crate) nodes: Vec<SvnNode>,
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SvnNode {
    pub(crate) path: String,
    pub(crate) kind: Option<SvnNodeKind>,
    pub(crate) action: SvnNodeAction,
    #[serde(rename = "copy-from-path")]
    pub(crate) copy_from_path: Option<String>,
    #[serde(rename = "copy-from-rev")]
    pub(crate) copy_from_rev: Option<u32>,
    pub(crate) props: Option<BTreeMap<String, String>>,
    pub(crate) text: Option<String>,
    /// Append the `svndumpfilter generated` marker to the property block.
    #[serde(default = "false_")]
    pub(crate) generated: bool,
    /// Emit Text-content-md5/-sha1 headers computed from `text`.
    #[serde(rename = "text-hashes", default = "false_")]
    pub(crate) text_hashes: bool,
}

#[derive(serde::Deserialize, Copy, Clone)]
pub(crate) enum SvnNodeKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Dir,
}

#[derive(serde::Deserialize, Copy, Clone)]
pub(crate) enum SvnNodeAction {
    #[serde(rename = "change")]
    Change,
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "delete")]
    Delete,
    #[serde(rename = "replace")]
    Replace,
}

impl SvnNodeAction {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Add => "add",
            Self::Delete => "delete",
            Self::Replace => "replace",
        }
    }
}

impl SvnNodeKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Finding {
    pub(crate) rev: u32,
    pub(crate) path: String,
    #[serde(rename = "copy-from-rev")]
    pub(crate) copy_from_rev: u32,
    #[serde(rename = "copy-from-path")]
    pub(crate) copy_from_path: String,
}

#[inline(always)]
fn false_() -> bool {
    false
}
