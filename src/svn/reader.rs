// Byte-level access to the dump stream. Header lines are ASCII with
// LF terminators, but property and text blocks are arbitrary bytes, so
// nothing here decodes.

pub struct ByteReader<'a> {
    source: &'a mut dyn std::io::BufRead,
    position: u64,
    unread: Option<Vec<u8>>,
}

impl<'a> ByteReader<'a> {
    pub fn new(source: &'a mut dyn std::io::BufRead) -> Self {
        Self {
            source,
            position: 0,
            unread: None,
        }
    }

    /// Byte offset of the next unconsumed byte.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads one line including its terminating LF. Returns `None` at end of
    /// stream. The final line of a stream may come back without an LF.
    pub fn read_line(&mut self) -> Result<Option<Vec<u8>>, std::io::Error> {
        if let Some(line) = self.unread.take() {
            self.position += line.len() as u64;
            return Ok(Some(line));
        }

        let mut buf = Vec::new();
        self.source.read_until(b'\n', &mut buf)?;
        if buf.is_empty() {
            return Ok(None);
        }
        self.position += buf.len() as u64;
        Ok(Some(buf))
    }

    /// Pushes a line back so the next `read_line` returns it again. Only one
    /// line of lookahead is supported.
    pub fn unread_line(&mut self, line: Vec<u8>) {
        assert!(self.unread.is_none(), "unread slot already occupied");
        self.position -= line.len() as u64;
        self.unread = Some(line);
    }

    /// Reads exactly `len` bytes, failing if the stream ends early.
    pub fn read_exact(&mut self, len: u64) -> Result<Vec<u8>, std::io::Error> {
        assert!(self.unread.is_none(), "read_exact during line lookahead");

        let len_usize =
            usize::try_from(len).map_err(|_| std::io::Error::from(std::io::ErrorKind::OutOfMemory))?;
        let mut buf = vec![0; len_usize];
        self.source.read_exact(&mut buf)?;
        self.position += len;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::ByteReader;

    #[test]
    fn test_lines_and_position() {
        let data = b"first\nsecond\n\nlast";
        let mut src = &data[..];
        let mut reader = ByteReader::new(&mut src);

        assert_eq!(reader.read_line().unwrap().unwrap(), b"first\n");
        assert_eq!(reader.position(), 6);
        assert_eq!(reader.read_line().unwrap().unwrap(), b"second\n");
        assert_eq!(reader.read_line().unwrap().unwrap(), b"\n");
        assert_eq!(reader.read_line().unwrap().unwrap(), b"last");
        assert_eq!(reader.read_line().unwrap(), None);
    }

    #[test]
    fn test_unread() {
        let data = b"one\ntwo\n";
        let mut src = &data[..];
        let mut reader = ByteReader::new(&mut src);

        let line = reader.read_line().unwrap().unwrap();
        reader.unread_line(line);
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.read_line().unwrap().unwrap(), b"one\n");
        assert_eq!(reader.read_line().unwrap().unwrap(), b"two\n");
    }

    #[test]
    fn test_read_exact() {
        let data = b"K 3\nabc\n";
        let mut src = &data[..];
        let mut reader = ByteReader::new(&mut src);

        assert_eq!(reader.read_line().unwrap().unwrap(), b"K 3\n");
        assert_eq!(reader.read_exact(4).unwrap(), b"abc\n");
        assert_eq!(reader.position(), 8);
        assert!(reader.read_exact(1).is_err());
    }
}
