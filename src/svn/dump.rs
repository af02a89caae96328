use crate::svn::props::{PropertyBlock, PropsError};
use crate::svn::reader::ByteReader;

// SVN dump file format described in
// https://svn.apache.org/repos/asf/subversion/trunk/notes/dump-load-format.txt

pub const FORMAT_VERSION: &[u8] = b"SVN-fs-dump-format-version";
pub const UUID: &[u8] = b"UUID";
pub const REV_NUMBER: &[u8] = b"Revision-number";
pub const NODE_PATH: &[u8] = b"Node-path";
pub const NODE_KIND: &[u8] = b"Node-kind";
pub const NODE_ACTION: &[u8] = b"Node-action";
pub const NODE_COPYFROM_REV: &[u8] = b"Node-copyfrom-rev";
pub const NODE_COPYFROM_PATH: &[u8] = b"Node-copyfrom-path";
pub const TEXT_COPY_SOURCE_MD5: &[u8] = b"Text-copy-source-md5";
pub const TEXT_COPY_SOURCE_SHA1: &[u8] = b"Text-copy-source-sha1";
pub const TEXT_CONTENT_MD5: &[u8] = b"Text-content-md5";
pub const TEXT_CONTENT_SHA1: &[u8] = b"Text-content-sha1";
pub const PROP_DELTA: &[u8] = b"Prop-delta";
pub const TEXT_DELTA: &[u8] = b"Text-delta";
pub const TEXT_DELTA_BASE_MD5: &[u8] = b"Text-delta-base-md5";
pub const TEXT_DELTA_BASE_SHA1: &[u8] = b"Text-delta-base-sha1";
pub const PROP_CONTENT_LENGTH: &[u8] = b"Prop-content-length";
pub const TEXT_CONTENT_LENGTH: &[u8] = b"Text-content-length";
pub const CONTENT_LENGTH: &[u8] = b"Content-length";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DumpVersion {
    Two,
    Three,
}

impl DumpVersion {
    fn parse(s: &[u8]) -> Option<Self> {
        match s {
            b"2" => Some(Self::Two),
            b"3" => Some(Self::Three),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }

    pub fn allows_deltas(self) -> bool {
        match self {
            Self::Two => false,
            Self::Three => true,
        }
    }
}

/// Record headers in the order they appeared in the stream. The emitter
/// re-emits them in this order, so rewrites mutate entries in place.
#[derive(Clone, Debug, Default)]
pub struct Headers {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Replaces the value of an existing header in place, or appends the
    /// header at the end.
    pub fn set(&mut self, key: &[u8], value: Vec<u8>) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key.to_vec(), value)),
        }
    }

    pub fn push(&mut self, key: &[u8], value: Vec<u8>) {
        self.entries.push((key.to_vec(), value));
    }

    pub fn remove(&mut self, key: &[u8]) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() != before
    }

    /// Inserts `key` directly before `anchor`, or at the end when the anchor
    /// is absent. Replaces in place when `key` already exists.
    pub fn set_before(&mut self, anchor: &[u8], key: &[u8], value: Vec<u8>) {
        if let Some((_, v)) = self.entries.iter_mut().find(|(k, _)| k == key) {
            *v = value;
            return;
        }
        let at = self
            .entries
            .iter()
            .position(|(k, _)| k == anchor)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, (key.to_vec(), value));
    }

    /// Inserts `key` directly after `anchor`, or at the end when the anchor
    /// is absent. Replaces in place when `key` already exists.
    pub fn set_after(&mut self, anchor: &[u8], key: &[u8], value: Vec<u8>) {
        if let Some((_, v)) = self.entries.iter_mut().find(|(k, _)| k == key) {
            *v = value;
            return;
        }
        let at = self
            .entries
            .iter()
            .position(|(k, _)| k == anchor)
            .map(|i| i + 1)
            .unwrap_or(self.entries.len());
        self.entries.insert(at, (key.to_vec(), value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }
}

pub enum Record {
    Uuid(UuidRecord),
    Rev(RevRecord),
    Node(NodeRecord),
}

pub struct UuidRecord {
    /// Raw header value, re-emitted verbatim.
    pub raw: Vec<u8>,
    pub trailing_blanks: u32,
}

pub struct RevRecord {
    pub rev_no: u32,
    pub headers: Headers,
    pub props: Option<PropertyBlock>,
    pub trailing_blanks: u32,
}

impl RevRecord {
    pub fn set_rev_no(&mut self, rev_no: u32) {
        self.rev_no = rev_no;
        self.headers.set(REV_NUMBER, rev_no.to_string().into_bytes());
    }
}

#[derive(Clone)]
pub struct NodeRecord {
    pub headers: Headers,
    pub path: Vec<u8>,
    pub kind: Option<NodeKind>,
    pub action: NodeAction,
    pub copy_from: Option<NodeCopyFrom>,
    pub props: Option<PropertyBlock>,
    pub props_delta: bool,
    pub text: Option<Vec<u8>>,
    pub text_delta: bool,
    pub trailing_blanks: u32,
}

impl NodeRecord {
    /// Drops the copy-from headers along with everything that only makes
    /// sense for a copied or delta text source.
    pub fn strip_copy_from(&mut self) {
        self.copy_from = None;
        self.headers.remove(NODE_COPYFROM_REV);
        self.headers.remove(NODE_COPYFROM_PATH);
        self.headers.remove(TEXT_COPY_SOURCE_MD5);
        self.headers.remove(TEXT_COPY_SOURCE_SHA1);
    }

    pub fn set_copyfrom_rev(&mut self, rev: u32) {
        if let Some(ref mut copy_from) = self.copy_from {
            copy_from.rev = rev;
            self.headers
                .set(NODE_COPYFROM_REV, rev.to_string().into_bytes());
        }
    }

    pub fn set_kind(&mut self, kind: NodeKind) {
        self.kind = Some(kind);
        self.headers
            .set_after(NODE_PATH, NODE_KIND, kind.name().to_vec());
    }

    /// Replaces the text block, recording fresh content hashes and dropping
    /// any delta bookkeeping that no longer applies.
    pub fn replace_text(&mut self, text: Vec<u8>) {
        use sha1::Digest as _;

        let md5 = hex::encode(md5::Md5::digest(&text));
        let sha1 = hex::encode(sha1::Sha1::digest(&text));

        self.text = Some(text);
        self.text_delta = false;
        self.headers.remove(TEXT_DELTA);
        self.headers.remove(TEXT_DELTA_BASE_MD5);
        self.headers.remove(TEXT_DELTA_BASE_SHA1);
        self.headers
            .set_before(PROP_CONTENT_LENGTH, TEXT_CONTENT_MD5, md5.into_bytes());
        self.headers
            .set_before(PROP_CONTENT_LENGTH, TEXT_CONTENT_SHA1, sha1.into_bytes());
    }

    /// Replaces the property block with a full (non-delta) representation.
    pub fn replace_props(&mut self, props: PropertyBlock) {
        self.props = Some(props);
        self.props_delta = false;
        self.headers.remove(PROP_DELTA);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeAction {
    Change,
    Add,
    Delete,
    Replace,
}

impl NodeAction {
    fn parse(s: &[u8]) -> Option<Self> {
        match s {
            b"change" => Some(Self::Change),
            b"add" => Some(Self::Add),
            b"delete" => Some(Self::Delete),
            b"replace" => Some(Self::Replace),
            _ => None,
        }
    }

    pub fn name(self) -> &'static [u8] {
        match self {
            Self::Change => b"change",
            Self::Add => b"add",
            Self::Delete => b"delete",
            Self::Replace => b"replace",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
}

impl NodeKind {
    fn parse(s: &[u8]) -> Option<Self> {
        match s {
            b"file" => Some(Self::File),
            b"dir" => Some(Self::Dir),
            _ => None,
        }
    }

    pub fn name(self) -> &'static [u8] {
        match self {
            Self::File => b"file",
            Self::Dir => b"dir",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeCopyFrom {
    pub rev: u32,
    pub path: Vec<u8>,
}

fn parse_bool(s: &[u8]) -> Option<bool> {
    match s {
        b"true" => Some(true),
        b"false" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ReadError {
    Io(std::io::Error),
    MalformedHeader { at: u64 },
    UnexpectedRecord { at: u64 },
    TruncatedBody { at: u64 },
    UnsupportedFormatVersion { version: Vec<u8> },
    MissingHeaderEntry { key: Vec<u8> },
    UnexpectedHeaderEntry { key: Vec<u8> },
    InvalidHeaderEntry { key: Vec<u8>, value: Vec<u8> },
    MismatchedContentLen { at: u64 },
    BrokenProperties { at: u64, error: PropsError },
}

impl From<std::io::Error> for ReadError {
    #[inline]
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl std::fmt::Display for ReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Io(ref e) => write!(f, "failed to read dump: {e}"),
            Self::MalformedHeader { at } => write!(f, "malformed header at byte {at}"),
            Self::UnexpectedRecord { at } => write!(f, "unexpected record at byte {at}"),
            Self::TruncatedBody { at } => write!(f, "truncated record body at byte {at}"),
            Self::UnsupportedFormatVersion { ref version } => {
                write!(
                    f,
                    "unsupported dump format version: \"{}\"",
                    version.escape_ascii(),
                )
            }
            Self::MissingHeaderEntry { ref key } => {
                write!(f, "missing header entry: \"{}\"", key.escape_ascii())
            }
            Self::UnexpectedHeaderEntry { ref key } => {
                write!(f, "unexpected header entry: \"{}\"", key.escape_ascii())
            }
            Self::InvalidHeaderEntry { ref key, ref value } => write!(
                f,
                "invalid value for header entry \"{}\": \"{}\"",
                key.escape_ascii(),
                value.escape_ascii(),
            ),
            Self::MismatchedContentLen { at } => {
                write!(f, "mismatched content length at byte {at}")
            }
            Self::BrokenProperties { at, ref error } => {
                write!(f, "broken property block at byte {at}: {error}")
            }
        }
    }
}

pub struct DumpReader<'a> {
    reader: ByteReader<'a>,
    version: DumpVersion,
    format_trailing_blanks: u32,
}

impl<'a> DumpReader<'a> {
    pub fn new(source: &'a mut dyn std::io::BufRead) -> Result<Self, ReadError> {
        let mut reader = ByteReader::new(source);

        let at = reader.position();
        let headers = read_header_block(&mut reader)?.ok_or(ReadError::TruncatedBody { at })?;
        let raw_version =
            headers
                .get(FORMAT_VERSION)
                .ok_or_else(|| ReadError::MissingHeaderEntry {
                    key: FORMAT_VERSION.to_vec(),
                })?;
        let version =
            DumpVersion::parse(raw_version).ok_or_else(|| ReadError::UnsupportedFormatVersion {
                version: raw_version.to_vec(),
            })?;
        let format_trailing_blanks = count_trailing_blanks(&mut reader)?;

        Ok(Self {
            reader,
            version,
            format_trailing_blanks,
        })
    }

    pub fn version(&self) -> DumpVersion {
        self.version
    }

    /// Blank lines that followed the format header, re-emitted verbatim.
    pub fn format_trailing_blanks(&self) -> u32 {
        self.format_trailing_blanks
    }

    pub fn position(&self) -> u64 {
        self.reader.position()
    }

    pub fn next_record(&mut self) -> Result<Option<Record>, ReadError> {
        let at = self.reader.position();
        let Some(headers) = read_header_block(&mut self.reader)? else {
            return Ok(None);
        };

        let type_cnt = usize::from(headers.contains(UUID))
            + usize::from(headers.contains(REV_NUMBER))
            + usize::from(headers.contains(NODE_PATH));
        if type_cnt != 1 {
            return Err(ReadError::UnexpectedRecord { at });
        }

        if headers.contains(UUID) {
            self.parse_uuid(headers).map(Some)
        } else if headers.contains(REV_NUMBER) {
            self.parse_rev(at, headers).map(Some)
        } else {
            self.parse_node(at, headers).map(Some)
        }
    }

    fn parse_uuid(&mut self, headers: Headers) -> Result<Record, ReadError> {
        let raw = headers.get(UUID).unwrap().to_vec();
        if uuid::Uuid::try_parse_ascii(&raw).is_err() {
            return Err(ReadError::InvalidHeaderEntry {
                key: UUID.to_vec(),
                value: raw,
            });
        }

        if get_u64(&headers, CONTENT_LENGTH)?.unwrap_or(0) != 0 {
            return Err(ReadError::MismatchedContentLen {
                at: self.reader.position(),
            });
        }

        let trailing_blanks = count_trailing_blanks(&mut self.reader)?;
        Ok(Record::Uuid(UuidRecord {
            raw,
            trailing_blanks,
        }))
    }

    fn parse_rev(&mut self, at: u64, headers: Headers) -> Result<Record, ReadError> {
        let rev_no = get_u32_required(&headers, REV_NUMBER)?;

        let prop_content_len = get_u64(&headers, PROP_CONTENT_LENGTH)?;
        let content_len = get_u64(&headers, CONTENT_LENGTH)?;
        if prop_content_len.unwrap_or(0) != content_len.unwrap_or(0) {
            return Err(ReadError::MismatchedContentLen { at });
        }

        let props = prop_content_len
            .map(|len| self.read_props(len, false))
            .transpose()?;

        let trailing_blanks = count_trailing_blanks(&mut self.reader)?;
        Ok(Record::Rev(RevRecord {
            rev_no,
            headers,
            props,
            trailing_blanks,
        }))
    }

    fn parse_node(&mut self, at: u64, headers: Headers) -> Result<Record, ReadError> {
        let path = headers.get(NODE_PATH).unwrap().to_vec();

        let kind = headers
            .get(NODE_KIND)
            .map(|raw| {
                NodeKind::parse(raw).ok_or_else(|| ReadError::InvalidHeaderEntry {
                    key: NODE_KIND.to_vec(),
                    value: raw.to_vec(),
                })
            })
            .transpose()?;

        let raw_action = headers
            .get(NODE_ACTION)
            .ok_or_else(|| ReadError::MissingHeaderEntry {
                key: NODE_ACTION.to_vec(),
            })?;
        let action =
            NodeAction::parse(raw_action).ok_or_else(|| ReadError::InvalidHeaderEntry {
                key: NODE_ACTION.to_vec(),
                value: raw_action.to_vec(),
            })?;

        let copy_from = match (
            get_u32(&headers, NODE_COPYFROM_REV)?,
            headers.get(NODE_COPYFROM_PATH),
        ) {
            (None, None) => None,
            (Some(rev), Some(path)) => Some(NodeCopyFrom {
                rev,
                path: path.to_vec(),
            }),
            (Some(_), None) => {
                return Err(ReadError::MissingHeaderEntry {
                    key: NODE_COPYFROM_PATH.to_vec(),
                });
            }
            (None, Some(_)) => {
                return Err(ReadError::MissingHeaderEntry {
                    key: NODE_COPYFROM_REV.to_vec(),
                });
            }
        };

        let prop_content_len = get_u64(&headers, PROP_CONTENT_LENGTH)?;
        let text_content_len = get_u64(&headers, TEXT_CONTENT_LENGTH)?;
        let content_len = get_u64(&headers, CONTENT_LENGTH)?;

        let expected_content_len = prop_content_len
            .unwrap_or(0)
            .checked_add(text_content_len.unwrap_or(0))
            .ok_or(ReadError::MismatchedContentLen { at })?;
        if content_len.unwrap_or(0) != expected_content_len {
            return Err(ReadError::MismatchedContentLen { at });
        }

        let props_delta = self.delta_flag(&headers, PROP_DELTA)?;
        let text_delta = self.delta_flag(&headers, TEXT_DELTA)?;

        let props = prop_content_len
            .map(|len| self.read_props(len, props_delta))
            .transpose()?;

        let text = text_content_len
            .map(|len| {
                let at = self.reader.position();
                self.reader.read_exact(len).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        ReadError::TruncatedBody { at }
                    } else {
                        ReadError::Io(e)
                    }
                })
            })
            .transpose()?;

        let trailing_blanks = count_trailing_blanks(&mut self.reader)?;
        Ok(Record::Node(NodeRecord {
            headers,
            path,
            kind,
            action,
            copy_from,
            props,
            props_delta,
            text,
            text_delta,
            trailing_blanks,
        }))
    }

    fn delta_flag(&self, headers: &Headers, key: &[u8]) -> Result<bool, ReadError> {
        let Some(raw) = headers.get(key) else {
            return Ok(false);
        };
        if !self.version.allows_deltas() {
            return Err(ReadError::UnexpectedHeaderEntry { key: key.to_vec() });
        }
        parse_bool(raw).ok_or_else(|| ReadError::InvalidHeaderEntry {
            key: key.to_vec(),
            value: raw.to_vec(),
        })
    }

    fn read_props(&mut self, len: u64, allow_deletes: bool) -> Result<PropertyBlock, ReadError> {
        let at = self.reader.position();
        let raw = self.reader.read_exact(len).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ReadError::TruncatedBody { at }
            } else {
                ReadError::Io(e)
            }
        })?;
        PropertyBlock::parse(&raw, allow_deletes)
            .map_err(|error| ReadError::BrokenProperties { at, error })
    }
}

/// Reads one block of "Key: Value" lines up to and including its blank-line
/// terminator. Returns `None` at end of stream.
fn read_header_block(reader: &mut ByteReader<'_>) -> Result<Option<Headers>, ReadError> {
    let Some(first) = reader.read_line()? else {
        return Ok(None);
    };

    let mut headers = Headers::new();
    let mut line = first;
    loop {
        if line == b"\n" {
            return Ok(Some(headers));
        }

        let at = reader.position() - line.len() as u64;
        let line_body = line
            .strip_suffix(b"\n")
            .ok_or(ReadError::MalformedHeader { at })?;
        let sep_pos = line_body
            .windows(2)
            .position(|w| w == b": ")
            .ok_or(ReadError::MalformedHeader { at })?;
        headers.push(&line_body[..sep_pos], line_body[(sep_pos + 2)..].to_vec());

        line = reader
            .read_line()?
            .ok_or(ReadError::MalformedHeader { at: reader.position() })?;
    }
}

/// Counts the blank lines following a record's body; the first non-blank
/// line is pushed back for the next record.
fn count_trailing_blanks(reader: &mut ByteReader<'_>) -> Result<u32, std::io::Error> {
    let mut count = 0;
    loop {
        match reader.read_line()? {
            None => return Ok(count),
            Some(line) if line == b"\n" => count += 1,
            Some(line) => {
                reader.unread_line(line);
                return Ok(count);
            }
        }
    }
}

fn get_u64(headers: &Headers, key: &[u8]) -> Result<Option<u64>, ReadError> {
    headers
        .get(key)
        .map(|raw| {
            std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or_else(|| ReadError::InvalidHeaderEntry {
                    key: key.to_vec(),
                    value: raw.to_vec(),
                })
        })
        .transpose()
}

fn get_u32(headers: &Headers, key: &[u8]) -> Result<Option<u32>, ReadError> {
    headers
        .get(key)
        .map(|raw| {
            std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .ok_or_else(|| ReadError::InvalidHeaderEntry {
                    key: key.to_vec(),
                    value: raw.to_vec(),
                })
        })
        .transpose()
}

fn get_u32_required(headers: &Headers, key: &[u8]) -> Result<u32, ReadError> {
    get_u32(headers, key)?.ok_or_else(|| ReadError::MissingHeaderEntry { key: key.to_vec() })
}
