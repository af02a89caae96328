/// Reads a path-list file: one path per line, blank lines ignored. Paths are
/// kept as raw bytes; only the line terminators are stripped.
pub fn read_paths(src: &mut dyn std::io::BufRead) -> Result<Vec<Vec<u8>>, std::io::Error> {
    let mut paths = Vec::new();

    let mut line = Vec::new();
    loop {
        line.clear();
        src.read_until(b'\n', &mut line)?;
        if line.is_empty() {
            break;
        }

        let mut entry = line.as_slice();
        entry = entry.strip_suffix(b"\n").unwrap_or(entry);
        entry = entry.strip_suffix(b"\r").unwrap_or(entry);
        if !entry.is_empty() {
            paths.push(entry.to_vec());
        }

        if !line.ends_with(b"\n") {
            break;
        }
    }

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::read_paths;

    #[test]
    fn test_read_paths() {
        let mut src = b"trunk/project\n\nbranches/stable\r\ntags".as_slice();
        let paths = read_paths(&mut src).unwrap();
        assert_eq!(
            paths,
            vec![
                b"trunk/project".to_vec(),
                b"branches/stable".to_vec(),
                b"tags".to_vec(),
            ],
        );
    }

    #[test]
    fn test_read_paths_empty_file() {
        let mut src = b"".as_slice();
        assert!(read_paths(&mut src).unwrap().is_empty());
    }
}
