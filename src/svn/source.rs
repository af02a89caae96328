use std::ffi::OsString;
use std::io::{Read as _, Seek as _};
use std::path::PathBuf;

use crate::pipe;

// The input dump may be a plain or compressed dump file, or a repository
// directory (in which case "svnadmin dump" produces the stream).

#[derive(Debug)]
pub enum OpenError {
    MetadataFetchError {
        path: PathBuf,
        error: std::io::Error,
    },
    FileOpenError {
        path: PathBuf,
        error: std::io::Error,
    },
    FileReadError {
        path: PathBuf,
        error: std::io::Error,
    },
    FileSeekError {
        path: PathBuf,
        error: std::io::Error,
    },
    SpawnProcessError {
        arg0: OsString,
        error: std::io::Error,
    },
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MetadataFetchError { path, error } => {
                write!(f, "failed to fetch metadata for {path:?}: {error}")
            }
            Self::FileOpenError { path, error } => {
                write!(f, "failed to open file {path:?}: {error}")
            }
            Self::FileReadError { path, error } => {
                write!(f, "failed to read file {path:?}: {error}")
            }
            Self::FileSeekError { path, error } => {
                write!(f, "failed to seek file {path:?}: {error}")
            }
            Self::SpawnProcessError { arg0, error } => {
                write!(f, "failed to spawn process {arg0:?}: {error}")
            }
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Compression {
    None,
    Zstd,
    Gzip,
    Bzip2,
    Xz,
    Lz4,
}

impl Compression {
    fn sniff(header: &[u8]) -> Self {
        const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
        const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
        const BZIP2_MAGIC: &[u8] = b"BZh";
        const XZ_MAGIC: &[u8] = &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
        const LZ4_MAGIC: &[u8] = &[0x04, 0x22, 0x4D, 0x18];

        if header.starts_with(ZSTD_MAGIC) {
            Self::Zstd
        } else if header.starts_with(GZIP_MAGIC) {
            Self::Gzip
        } else if header.starts_with(BZIP2_MAGIC) {
            Self::Bzip2
        } else if header.starts_with(XZ_MAGIC) {
            Self::Xz
        } else if header.starts_with(LZ4_MAGIC) {
            Self::Lz4
        } else {
            Self::None
        }
    }

    fn decode_into(
        self,
        mut file: std::fs::File,
        mut dest: pipe::PipeWriter,
    ) -> Result<(), std::io::Error> {
        match self {
            Self::Zstd => zstd::stream::copy_decode(&file, &mut dest),
            Self::Gzip => {
                let mut decoder = flate2::read::GzDecoder::new(&file);
                std::io::copy(&mut decoder, &mut dest).map(|_| ())
            }
            Self::Bzip2 => {
                let mut decoder = bzip2::read::BzDecoder::new(&file);
                std::io::copy(&mut decoder, &mut dest).map(|_| ())
            }
            Self::Xz => liblzma::copy_decode(&file, &mut dest),
            Self::Lz4 => {
                let mut decoder = lz4_flex::frame::FrameDecoder::new(&file);
                std::io::copy(&mut decoder, &mut dest).map(|_| ())
            }
            Self::None => std::io::copy(&mut file, &mut dest).map(|_| ()),
        }
    }
}

pub enum DumpSource {
    ThreadPipe(
        std::thread::JoinHandle<Result<(), std::io::Error>>,
        std::io::BufReader<pipe::PipeReader>,
    ),
    Command(
        std::process::Child,
        std::io::BufReader<std::process::ChildStdout>,
    ),
}

impl DumpSource {
    pub fn open(path: &std::path::Path) -> Result<Self, OpenError> {
        let path_meta = std::fs::metadata(path).map_err(|e| OpenError::MetadataFetchError {
            path: path.to_path_buf(),
            error: e,
        })?;
        if path_meta.file_type().is_dir() {
            Self::open_repository(path)
        } else {
            Self::open_file(path)
        }
    }

    fn open_repository(path: &std::path::Path) -> Result<Self, OpenError> {
        let mut child = std::process::Command::new("svnadmin")
            .arg("dump")
            .arg(path)
            .arg("-q")
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| OpenError::SpawnProcessError {
                arg0: "svnadmin".into(),
                error: e,
            })?;
        let stdout = child.stdout.take().unwrap();
        Ok(Self::Command(child, std::io::BufReader::new(stdout)))
    }

    fn open_file(path: &std::path::Path) -> Result<Self, OpenError> {
        const HEADER_SIZE: usize = 6;

        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|e| OpenError::FileOpenError {
                path: path.to_path_buf(),
                error: e,
            })?;

        let mut header = Vec::<u8>::with_capacity(HEADER_SIZE);
        while header.len() < HEADER_SIZE {
            let mut buf = [0; HEADER_SIZE];
            match file.read(&mut buf[..(HEADER_SIZE - header.len())]) {
                Ok(0) => break,
                Ok(n) => header.extend(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    return Err(OpenError::FileReadError {
                        path: path.to_path_buf(),
                        error: e,
                    });
                }
            }
        }

        file.seek(std::io::SeekFrom::Start(0))
            .map_err(|e| OpenError::FileSeekError {
                path: path.to_path_buf(),
                error: e,
            })?;

        let compression = Compression::sniff(&header);
        let (pipe_read, pipe_write) = pipe::create();

        let joiner = std::thread::Builder::new()
            .name("dump source".into())
            .spawn(move || compression.decode_into(file, pipe_write))
            .expect("failed to spawn thread");

        Ok(Self::ThreadPipe(joiner, std::io::BufReader::new(pipe_read)))
    }

    pub fn close(self) -> Result<(), std::io::Error> {
        match self {
            Self::ThreadPipe(joiner, pipe) => {
                drop(pipe);
                match joiner.join() {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e),
                    Err(e) => {
                        std::panic::resume_unwind(e);
                    }
                }
            }
            Self::Command(mut child, _) => {
                let exit_code = child.wait()?;
                if exit_code.success() {
                    Ok(())
                } else {
                    Err(std::io::Error::other(format!(
                        "process finished code {exit_code}"
                    )))
                }
            }
        }
    }

    pub fn stream(&mut self) -> &mut dyn std::io::BufRead {
        match self {
            Self::ThreadPipe(_, pipe) => pipe,
            Self::Command(_, stdout) => stdout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Compression;

    #[test]
    fn test_sniff() {
        assert_eq!(Compression::sniff(b"SVN-fs"), Compression::None);
        assert_eq!(
            Compression::sniff(&[0x28, 0xB5, 0x2F, 0xFD, 0, 0]),
            Compression::Zstd,
        );
        assert_eq!(Compression::sniff(&[0x1F, 0x8B, 8, 0, 0, 0]), Compression::Gzip);
        assert_eq!(Compression::sniff(b"BZh91AY"), Compression::Bzip2);
        assert_eq!(
            Compression::sniff(&[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00]),
            Compression::Xz,
        );
        assert_eq!(
            Compression::sniff(&[0x04, 0x22, 0x4D, 0x18, 0, 0]),
            Compression::Lz4,
        );
    }
}
