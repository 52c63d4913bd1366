//! Charset resolution and streaming transcoding to UTF-8.
//!
//! Detection samples the head of a file: a BOM wins, then valid UTF-8,
//! then a `chardetng` guess. It never fails; an unreadable sample falls
//! back to UTF-8 and the subsequent open reports the real I/O error.

use chardetng::EncodingDetector;
use csvcompare_common::{CompareError, Result};
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tracing::debug;

const SAMPLE_SIZE: usize = 64 * 1024;
const BUFFER_SIZE: usize = 16 * 1024;

/// Pick the charset for `path`: the override if given, else detection.
pub fn resolve(path: &Path, charset: Option<&'static Encoding>) -> &'static Encoding {
    match charset {
        Some(encoding) => encoding,
        None => detect(path),
    }
}

/// Detect the charset of a file from its first 64 KiB.
pub fn detect(path: &Path) -> &'static Encoding {
    let sample = match read_sample(path) {
        Ok(sample) => sample,
        Err(e) => {
            debug!("Charset detection skipped for {:?}: {}", path, e);
            return UTF_8;
        }
    };

    let complete = sample.len() < SAMPLE_SIZE;
    let encoding = detect_bytes(&sample, complete);
    debug!("Detected charset {} for {:?}", encoding.name(), path);
    encoding
}

/// Detect the charset of a byte sample.
///
/// `complete` tells whether the sample is the whole input; when it is not,
/// a UTF-8 sequence cut at the end of the sample is still accepted.
pub fn detect_bytes(sample: &[u8], complete: bool) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return encoding;
    }

    match simdutf8::compat::from_utf8(sample) {
        Ok(_) => return UTF_8,
        Err(e) if e.error_len().is_none() && !complete => return UTF_8,
        Err(_) => {}
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, complete);
    detector.guess(None, true)
}

/// Open `path` as a UTF-8 byte stream decoded from `encoding`.
///
/// A BOM in the file takes precedence over `encoding` and is stripped.
pub fn open(path: &Path, encoding: &'static Encoding) -> Result<DecodingReader<File>> {
    let file = File::open(path).map_err(|e| CompareError::file_io(path, e))?;
    Ok(DecodingReader::new(file, encoding))
}

fn read_sample(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(SAMPLE_SIZE);
    file.take(SAMPLE_SIZE as u64).read_to_end(&mut sample)?;
    Ok(sample)
}

/// `Read` adapter that transcodes an inner byte stream to UTF-8 on the fly.
pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    input: Vec<u8>,
    input_start: usize,
    input_end: usize,
    output: Vec<u8>,
    output_start: usize,
    output_end: usize,
    eof: bool,
    finished: bool,
}

impl<R: Read> DecodingReader<R> {
    pub fn new(inner: R, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            decoder: encoding.new_decoder(),
            input: vec![0; BUFFER_SIZE],
            input_start: 0,
            input_end: 0,
            output: vec![0; BUFFER_SIZE],
            output_start: 0,
            output_end: 0,
            eof: false,
            finished: false,
        }
    }

    /// Charset actually in use; after the first read it reflects BOM sniffing
    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.output_start < self.output_end {
                let available = &self.output[self.output_start..self.output_end];
                let n = available.len().min(buf.len());
                buf[..n].copy_from_slice(&available[..n]);
                self.output_start += n;
                return Ok(n);
            }

            if self.finished || buf.is_empty() {
                return Ok(0);
            }

            if self.input_start == self.input_end && !self.eof {
                let n = self.inner.read(&mut self.input)?;
                self.input_start = 0;
                self.input_end = n;
                self.eof = n == 0;
            }

            let (result, read, written, _) = self.decoder.decode_to_utf8(
                &self.input[self.input_start..self.input_end],
                &mut self.output,
                self.eof,
            );
            self.input_start += read;
            self.output_start = 0;
            self.output_end = written;

            if self.eof && result == CoderResult::InputEmpty {
                self.finished = true;
            }
        }
    }
}
