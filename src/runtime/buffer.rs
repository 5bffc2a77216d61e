//! Per-connection read buffer with line framing.
//!
//! Each read appends at most `limit` bytes. Complete lines are split off in
//! arrival order; a partial line waits for more data. A partial line that
//! reaches `limit` bytes without a terminator is discarded, so a buffer
//! never holds more than one read beyond the limit.

use bytes::{Bytes, BytesMut};
use std::io::{self, Read};

/// One unit of framed input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line with its `\n` or `\r\n` removed.
    Line(Bytes),
    /// Input that reached the limit without forming a line; it was dropped.
    Overlong,
}

/// Growable read buffer bounded by an explicit limit.
#[derive(Debug)]
pub struct LineBuffer {
    buf: BytesMut,
    limit: usize,
}

impl LineBuffer {
    /// Create a buffer reading at most `limit` bytes at a time.
    pub fn new(limit: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(limit),
            limit,
        }
    }

    /// Perform a single read of up to `limit` bytes from `reader`.
    ///
    /// Returns the number of bytes read; `Ok(0)` means end of stream.
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> io::Result<usize> {
        let filled = self.buf.len();
        self.buf.resize(filled + self.limit, 0);

        let result = reader.read(&mut self.buf[filled..]);
        let n = *result.as_ref().unwrap_or(&0);
        self.buf.truncate(filled + n);
        result
    }

    /// Split off the next frame, if one is available.
    pub fn next_frame(&mut self) -> Option<Frame> {
        if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line = self.buf.split_to(pos + 1);
            line.truncate(pos);
            if line.last() == Some(&b'\r') {
                line.truncate(pos - 1);
            }
            return Some(Frame::Line(line.freeze()));
        }

        if self.buf.len() >= self.limit {
            self.buf.clear();
            return Some(Frame::Overlong);
        }

        None
    }

    /// Bytes buffered but not yet returned as a frame.
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Option<Frame> {
        Some(Frame::Line(Bytes::copy_from_slice(s.as_bytes())))
    }

    #[test]
    fn test_single_line() {
        let mut buffer = LineBuffer::new(1024);
        let n = buffer.read_from(&mut &b"INCR 45\r\n"[..]).unwrap();
        assert_eq!(n, 9);
        assert_eq!(buffer.next_frame(), line("INCR 45"));
        assert_eq!(buffer.next_frame(), None);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_read() {
        let mut buffer = LineBuffer::new(1024);
        buffer.read_from(&mut &b"INCR 1\r\nOUTPUT\nDECR"[..]).unwrap();
        assert_eq!(buffer.next_frame(), line("INCR 1"));
        assert_eq!(buffer.next_frame(), line("OUTPUT"));
        assert_eq!(buffer.next_frame(), None);
        assert_eq!(buffer.pending(), 4);
    }

    #[test]
    fn test_line_split_across_reads() {
        let mut buffer = LineBuffer::new(1024);
        buffer.read_from(&mut &b"INC"[..]).unwrap();
        assert_eq!(buffer.next_frame(), None);
        buffer.read_from(&mut &b"R 3\r\n"[..]).unwrap();
        assert_eq!(buffer.next_frame(), line("INCR 3"));
    }

    #[test]
    fn test_blank_line() {
        let mut buffer = LineBuffer::new(1024);
        buffer.read_from(&mut &b"\r\n \r\n"[..]).unwrap();
        assert_eq!(buffer.next_frame(), line(""));
        assert_eq!(buffer.next_frame(), line(" "));
    }

    #[test]
    fn test_read_is_bounded() {
        let mut buffer = LineBuffer::new(8);
        let input = [b'x'; 20];
        let n = buffer.read_from(&mut &input[..]).unwrap();
        assert_eq!(n, 8);
        assert_eq!(buffer.pending(), 8);
    }

    #[test]
    fn test_overlong_line_is_dropped() {
        let mut buffer = LineBuffer::new(8);
        buffer.read_from(&mut &b"xxxxxxxx"[..]).unwrap();
        assert_eq!(buffer.next_frame(), Some(Frame::Overlong));
        assert_eq!(buffer.pending(), 0);

        buffer.read_from(&mut &b"OUTPUT\r\n"[..]).unwrap();
        assert_eq!(buffer.next_frame(), line("OUTPUT"));
    }

    #[test]
    fn test_end_of_stream() {
        let mut buffer = LineBuffer::new(1024);
        assert_eq!(buffer.read_from(&mut &b""[..]).unwrap(), 0);
        assert_eq!(buffer.next_frame(), None);
    }
}
