//! Raw byte providers the scanner decodes characters from.
//!
//! A source hands out one raw unit at a time. `Ok(None)` is a clean end of input;
//! running dry in the middle of something is [`SourceError::OutOfData`], which
//! is how a caller feeding data incrementally aborts a parse.

use std::{collections::VecDeque, io::Read};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("the input ran out of data")]
    OutOfData,
    #[error("the input was reset while it was being read")]
    StreamReset,
    #[error("could not read the input: {0}")]
    Io(String),
}

/// Anything that can produce raw input bytes for a [`Scanner`](crate::scan::Scanner).
pub trait ByteSource: Send {
    /// Read the next raw unit.
    fn next_raw_unit(&mut self) -> Result<Option<u8>, SourceError>;

    /// Whether another unit is known to be available without blocking.
    fn has_more(&mut self) -> bool;

    /// Name used in diagnostics.
    fn name(&self) -> &str {
        "<input>"
    }
}

/// A source over bytes already in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
    cursor: usize,
}

impl MemorySource {
    pub fn new<B: Into<Vec<u8>>>(data: B) -> Self {
        Self::named("<input>", data)
    }

    pub fn named<N: Into<String>, B: Into<Vec<u8>>>(name: N, data: B) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            cursor: 0,
        }
    }

    /// Start reading from the beginning again.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}

impl ByteSource for MemorySource {
    fn next_raw_unit(&mut self) -> Result<Option<u8>, SourceError> {
        let byte = self.data.get(self.cursor).copied();
        if byte.is_some() {
            self.cursor += 1;
        }
        Ok(byte)
    }

    fn has_more(&mut self) -> bool {
        self.cursor < self.data.len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A source pulling from anything implementing [`Read`].
pub struct ReaderSource<R> {
    name: String,
    reader: R,
    peeked: Option<u8>,
    finished: bool,
}

impl<R: Read + Send> ReaderSource<R> {
    pub fn new<N: Into<String>>(name: N, reader: R) -> Self {
        Self {
            name: name.into(),
            reader,
            peeked: None,
            finished: false,
        }
    }

    fn fill(&mut self) -> Result<(), SourceError> {
        if self.peeked.is_some() || self.finished {
            return Ok(());
        }
        let mut byte = [0u8];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => {
                    self.finished = true;
                    return Ok(());
                }
                Ok(_) => {
                    self.peeked = Some(byte[0]);
                    return Ok(());
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SourceError::Io(e.to_string())),
            }
        }
    }
}

impl<R: Read + Send> ByteSource for ReaderSource<R> {
    fn next_raw_unit(&mut self) -> Result<Option<u8>, SourceError> {
        self.fill()?;
        Ok(self.peeked.take())
    }

    fn has_more(&mut self) -> bool {
        self.fill().is_ok() && self.peeked.is_some()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A source the caller pushes bytes into while parsing is under way.
///
/// Until [`close`](FeedSource::close) is called an empty queue reports
/// [`SourceError::OutOfData`] instead of a clean end.
#[derive(Debug, Clone, Default)]
pub struct FeedSource {
    queue: VecDeque<u8>,
    closed: bool,
}

impl FeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<B: AsRef<[u8]>>(&mut self, data: B) {
        self.queue.extend(data.as_ref().iter().copied());
    }

    /// No more data will follow; the end of the queue becomes a clean end of input.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ByteSource for FeedSource {
    fn next_raw_unit(&mut self) -> Result<Option<u8>, SourceError> {
        match self.queue.pop_front() {
            Some(byte) => Ok(Some(byte)),
            None if self.closed => Ok(None),
            None => Err(SourceError::OutOfData),
        }
    }

    fn has_more(&mut self) -> bool {
        !self.queue.is_empty()
    }

    fn name(&self) -> &str {
        "<feed>"
    }
}

#[test]
fn feed_source_runs_dry() {
    let mut feed = FeedSource::new();
    feed.push("ab");
    assert_eq!(feed.next_raw_unit(), Ok(Some(b'a')));
    assert_eq!(feed.next_raw_unit(), Ok(Some(b'b')));
    assert_eq!(feed.next_raw_unit(), Err(SourceError::OutOfData));
    feed.close();
    assert_eq!(feed.next_raw_unit(), Ok(None));
}

#[test]
fn reader_source_reads_everything() {
    let mut source = ReaderSource::new("bytes", &b"xyz"[..]);
    assert!(source.has_more());
    let mut out = Vec::new();
    while let Some(b) = source.next_raw_unit().unwrap() {
        out.push(b);
    }
    assert_eq!(out, b"xyz");
    assert!(!source.has_more());
}
