//! Reassembles newline-terminated frames from arbitrarily chunked bytes.

/// Per-direction frame accumulator.
///
/// Bytes are buffered until a `\n` arrives; everything before the last
/// newline is released as complete frames and the tail is carried over to
/// the next call. Frames are decoded lossily, so a stray invalid byte never
/// stalls the stream.
#[derive(Debug, Default)]
pub struct FrameSplitter {
    carry: Vec<u8>,
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the frames it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames {
        // Only the new bytes can hold a newline; the carry never does.
        let Some(last_newline) = chunk
            .iter()
            .rposition(|&b| b == b'\n')
            .map(|i| self.carry.len() + i)
        else {
            self.carry.extend_from_slice(chunk);
            return Frames::empty();
        };
        self.carry.extend_from_slice(chunk);

        let tail = self.carry.split_off(last_newline + 1);
        let ready = std::mem::replace(&mut self.carry, tail);
        Frames { ready, pos: 0 }
    }

    /// Bytes of the incomplete trailing fragment.
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

/// Lazy iterator over the complete frames released by one `feed` call.
///
/// Blank and whitespace-only lines are skipped; surrounding whitespace
/// (including a `\r` before the newline) is trimmed.
#[derive(Debug)]
pub struct Frames {
    ready: Vec<u8>,
    pos: usize,
}

impl Frames {
    const fn empty() -> Self {
        Self {
            ready: Vec::new(),
            pos: 0,
        }
    }
}

impl Iterator for Frames {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while self.pos < self.ready.len() {
            let rest = &self.ready[self.pos..];
            let len = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
            let line = String::from_utf8_lossy(&rest[..len]);
            self.pos += len + 1;

            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        None
    }
}
