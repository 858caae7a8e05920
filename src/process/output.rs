// Output Reader Threads
//
// Blocking line reads over one of the child's pipes. Lines go straight to
// the presenter queue; the controller only hears about the end of the stream.

use crate::error::MinerError;
use crate::event::Emitter;
use std::io::{self, BufRead, BufReader, Read};
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// Start a reader thread. `on_close` runs once when the stream ends, with
/// the read error if it broke instead of reaching EOF.
pub fn start_output_reader<R, F>(
    stream: R,
    kind: StreamKind,
    emitter: Emitter,
    on_close: F,
) -> thread::JoinHandle<()>
where
    R: Read + Send + 'static,
    F: FnOnce(StreamKind, Option<MinerError>) + Send + 'static,
{
    thread::spawn(move || {
        let result = read_lines(stream, &emitter);
        let error = match result {
            Ok(count) => {
                tracing::debug!(stream = kind.as_str(), lines = count, "Miner output closed");
                None
            }
            Err(e) => {
                // Process exit detection takes over; the child is left alone
                tracing::warn!(stream = kind.as_str(), error = %e, "Error reading miner output");
                let error = MinerError::StreamReadFailure(e);
                emitter.line(error.user_message());
                Some(error)
            }
        };
        on_close(kind, error);
    })
}

fn read_lines<R: Read>(stream: R, emitter: &Emitter) -> io::Result<u64> {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(count);
        }
        emitter.line(decode_line(&buf));
        count += 1;
    }
}

fn decode_line(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    text.trim_end_matches(&['\n', '\r'][..]).to_string()
}
