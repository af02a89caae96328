use std::sync::mpsc;

// In-process pipe connecting the decompression thread to the dump reader.
// Data moves as owned chunks through a bounded channel, so the writer side
// blocks once the reader falls behind.

const MAX_CHUNK: usize = 64 * 1024;
const MAX_QUEUED_CHUNKS: usize = 16;

pub(crate) struct PipeReader {
    receiver: mpsc::Receiver<Vec<u8>>,
    current: Vec<u8>,
    consumed: usize,
}

pub(crate) struct PipeWriter {
    sender: mpsc::SyncSender<Vec<u8>>,
}

pub(crate) fn create() -> (PipeReader, PipeWriter) {
    let (sender, receiver) = mpsc::sync_channel(MAX_QUEUED_CHUNKS);

    (
        PipeReader {
            receiver,
            current: Vec::new(),
            consumed: 0,
        },
        PipeWriter { sender },
    )
}

impl std::io::Read for PipeReader {
    fn read(&mut self, dest_buf: &mut [u8]) -> std::io::Result<usize> {
        if self.consumed == self.current.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.current = chunk;
                    self.consumed = 0;
                }
                // Writer gone and queue drained
                Err(mpsc::RecvError) => return Ok(0),
            }
        }

        let to_read = dest_buf.len().min(self.current.len() - self.consumed);
        dest_buf[..to_read].copy_from_slice(&self.current[self.consumed..(self.consumed + to_read)]);
        self.consumed += to_read;
        Ok(to_read)
    }
}

impl std::io::Write for PipeWriter {
    fn write(&mut self, src_buf: &[u8]) -> std::io::Result<usize> {
        if src_buf.is_empty() {
            return Ok(0);
        }

        let to_write = src_buf.len().min(MAX_CHUNK);
        self.sender
            .send(src_buf[..to_write].to_vec())
            .map_err(|mpsc::SendError(_)| std::io::Error::from(std::io::ErrorKind::BrokenPipe))?;
        Ok(to_write)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read as _, Write as _};

    #[test]
    fn test_roundtrip() {
        let (mut reader, mut writer) = super::create();

        let payload: Vec<u8> = (0..200_000u32).map(|n| (n % 251) as u8).collect();
        let payload_in_thread = payload.clone();

        let joiner = std::thread::spawn(move || {
            writer.write_all(&payload_in_thread).unwrap();
        });

        let mut received = Vec::new();
        reader.read_to_end(&mut received).unwrap();
        joiner.join().unwrap();

        assert_eq!(received, payload);
    }

    #[test]
    fn test_reader_sees_eof_after_writer_drop() {
        let (mut reader, writer) = super::create();
        drop(writer);

        let mut buf = [0; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}
