use crate::svn::dump::{
    self, DumpVersion, Headers, NodeRecord, RevRecord, UuidRecord, CONTENT_LENGTH,
    PROP_CONTENT_LENGTH, TEXT_CONTENT_LENGTH,
};

/// Serializes records back into dump-stream bytes.
///
/// Headers are written in the order carried by the record. The three length
/// headers are recomputed from the bytes about to be written; values parsed
/// from the input are overwritten, and headers for blocks a rewrite removed
/// are dropped.
pub struct DumpWriter<W: std::io::Write> {
    out: W,
    written: u64,
}

impl<W: std::io::Write> DumpWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, written: 0 }
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    pub fn write_format(
        &mut self,
        version: DumpVersion,
        trailing_blanks: u32,
    ) -> Result<(), std::io::Error> {
        let line = format!(
            "{}: {}\n\n",
            String::from_utf8_lossy(dump::FORMAT_VERSION),
            version.number(),
        );
        self.write_all(line.as_bytes())?;
        self.write_blanks(trailing_blanks)
    }

    pub fn write_uuid(&mut self, record: &UuidRecord) -> Result<(), std::io::Error> {
        self.write_all(b"UUID: ")?;
        self.write_all(&record.raw)?;
        self.write_all(b"\n\n")?;
        self.write_blanks(record.trailing_blanks)
    }

    pub fn write_rev(&mut self, record: &mut RevRecord) -> Result<(), std::io::Error> {
        let props = record.props.as_ref().map(|p| p.to_bytes());
        sync_length_headers(
            &mut record.headers,
            props.as_ref().map(|p| p.len() as u64),
            None,
        );

        self.write_headers(&record.headers)?;
        if let Some(ref props) = props {
            self.write_all(props)?;
        }
        self.write_blanks(record.trailing_blanks)
    }

    pub fn write_node(&mut self, record: &mut NodeRecord) -> Result<(), std::io::Error> {
        let props = record.props.as_ref().map(|p| p.to_bytes());
        sync_length_headers(
            &mut record.headers,
            props.as_ref().map(|p| p.len() as u64),
            record.text.as_ref().map(|t| t.len() as u64),
        );

        self.write_headers(&record.headers)?;
        if let Some(ref props) = props {
            self.write_all(props)?;
        }
        if let Some(ref text) = record.text {
            self.write_all(text)?;
        }
        self.write_blanks(record.trailing_blanks)
    }

    pub fn write_blanks(&mut self, count: u32) -> Result<(), std::io::Error> {
        for _ in 0..count {
            self.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), std::io::Error> {
        self.out.flush()
    }

    fn write_headers(&mut self, headers: &Headers) -> Result<(), std::io::Error> {
        for (key, value) in headers.iter() {
            self.write_all(key)?;
            self.write_all(b": ")?;
            self.write_all(value)?;
            self.write_all(b"\n")?;
        }
        self.write_all(b"\n")
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), std::io::Error> {
        self.out.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }
}

fn sync_length_headers(headers: &mut Headers, prop_len: Option<u64>, text_len: Option<u64>) {
    match prop_len {
        Some(len) => {
            if headers.contains(TEXT_CONTENT_LENGTH) {
                headers.set_before(
                    TEXT_CONTENT_LENGTH,
                    PROP_CONTENT_LENGTH,
                    len.to_string().into_bytes(),
                );
            } else {
                headers.set_before(
                    CONTENT_LENGTH,
                    PROP_CONTENT_LENGTH,
                    len.to_string().into_bytes(),
                );
            }
        }
        None => {
            headers.remove(PROP_CONTENT_LENGTH);
        }
    }

    match text_len {
        Some(len) => {
            headers.set_before(CONTENT_LENGTH, TEXT_CONTENT_LENGTH, len.to_string().into_bytes());
        }
        None => {
            headers.remove(TEXT_CONTENT_LENGTH);
        }
    }

    if prop_len.is_some() || text_len.is_some() {
        let total = prop_len.unwrap_or(0) + text_len.unwrap_or(0);
        headers.set(CONTENT_LENGTH, total.to_string().into_bytes());
    } else {
        headers.remove(CONTENT_LENGTH);
    }
}

#[cfg(test)]
mod tests {
    use super::DumpWriter;
    use crate::svn::dump::{DumpReader, Record};
    use crate::svn::props::PropertyBlock;

    const DUMP: &[u8] = b"SVN-fs-dump-format-version: 2\n\
        \n\
        UUID: 7bf7a5ef-cabf-0310-b7d4-93df341afa7e\n\
        \n\
        Revision-number: 0\n\
        Prop-content-length: 56\n\
        Content-length: 56\n\
        \n\
        K 8\nsvn:date\nV 27\n2005-05-03T19:09:41.129900Z\nPROPS-END\n\
        \n\
        Revision-number: 1\n\
        Prop-content-length: 30\n\
        Content-length: 30\n\
        \n\
        K 7\nsvn:log\nV 3\nadd\nPROPS-END\n\
        \n\
        Node-path: trunk\n\
        Node-kind: dir\n\
        Node-action: add\n\
        Prop-content-length: 10\n\
        Content-length: 10\n\
        \n\
        PROPS-END\n\
        \n\
        \n\
        Node-path: trunk/a.txt\n\
        Node-kind: file\n\
        Node-action: add\n\
        Node-copyfrom-rev: 1\n\
        Node-copyfrom-path: old/a.txt\n\
        Text-content-length: 6\n\
        Content-length: 6\n\
        \n\
        hello\n\
        \n\
        \n\
        Node-path: trunk/gone\n\
        Node-action: delete\n\
        \n";

    /// Parsing and re-emitting an untouched stream must reproduce it
    /// byte for byte.
    #[test]
    fn test_roundtrip_is_byte_exact() {
        let mut src = DUMP;
        let mut reader = DumpReader::new(&mut src).unwrap();

        let mut out = Vec::new();
        let mut writer = DumpWriter::new(&mut out);
        writer
            .write_format(reader.version(), reader.format_trailing_blanks())
            .unwrap();

        while let Some(record) = reader.next_record().unwrap() {
            match record {
                Record::Uuid(uuid) => writer.write_uuid(&uuid).unwrap(),
                Record::Rev(mut rev) => writer.write_rev(&mut rev).unwrap(),
                Record::Node(mut node) => writer.write_node(&mut node).unwrap(),
            }
        }

        assert_eq!(writer.bytes_written(), DUMP.len() as u64);
        assert_eq!(out, DUMP);
    }

    /// A rewrite that changes the property block must be reflected in the
    /// emitted length headers.
    #[test]
    fn test_lengths_recomputed_after_rewrite() {
        let mut src = DUMP;
        let mut reader = DumpReader::new(&mut src).unwrap();

        let node = loop {
            match reader.next_record().unwrap().unwrap() {
                Record::Node(node) if node.path == b"trunk" => break node,
                _ => {}
            }
        };

        let mut node = node;
        let mut props = PropertyBlock::new();
        props.set(b"svn:ignore", b"*.o\n".to_vec());
        node.props = Some(props);

        let mut out = Vec::new();
        let mut writer = DumpWriter::new(&mut out);
        writer.write_node(&mut node).unwrap();

        let expected: &[u8] = b"Node-path: trunk\n\
            Node-kind: dir\n\
            Node-action: add\n\
            Prop-content-length: 35\n\
            Content-length: 35\n\
            \n\
            K 10\nsvn:ignore\nV 4\n*.o\n\n\
            PROPS-END\n\
            \n\
            \n";
        assert_eq!(out, expected);
    }

    /// Dropping the property block entirely must drop its length headers.
    #[test]
    fn test_removed_block_drops_headers() {
        let mut src = DUMP;
        let mut reader = DumpReader::new(&mut src).unwrap();

        let mut node = loop {
            match reader.next_record().unwrap().unwrap() {
                Record::Node(node) if node.path == b"trunk" => break node,
                _ => {}
            }
        };
        node.props = None;

        let mut out = Vec::new();
        let mut writer = DumpWriter::new(&mut out);
        writer.write_node(&mut node).unwrap();

        let expected: &[u8] = b"Node-path: trunk\n\
            Node-kind: dir\n\
            Node-action: add\n\
            \n\
            \n\
            \n";
        assert_eq!(out, expected);
    }
}
