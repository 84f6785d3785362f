//! Buffered source reader.
//!
//! Decodes a byte stream into a stream of runes with lookahead of one,
//! tracking the line and column of the current rune and supporting segment
//! capture between `start` and `stop` marks. Encoding and I/O errors are
//! reported through the installed handler and never abort the read loop.

use std::io::{self, Read};

use crate::error::ScanHandler;
use crate::pos::{COL_BASE, LINE_BASE};

// =============================================================================
// UTF-8 decoding tables
// =============================================================================

// 0 = invalid lead byte, 1..4 = sequence length
const UTF8_LEN: [u8; 256] = {
    let mut t = [0u8; 256];
    let mut i = 0usize;
    while i < 256 {
        let b = i as u8;
        t[i] = if b < 0x80 {
            1
        } else if b >= 0xC2 && b <= 0xDF {
            2
        } else if b >= 0xE0 && b <= 0xEF {
            3
        } else if b >= 0xF0 && b <= 0xF4 {
            4
        } else {
            0
        };
        i += 1;
    }
    t
};

const UTF8_FIRST_MASK: [u8; 5] = [0, 0x7F, 0x1F, 0x0F, 0x07];

// Bounds on the second byte prevent overlong encodings, surrogates and
// values above 0x10FFFF.
const UTF8_B1_MIN: [u8; 256] = {
    let mut t = [0u8; 256];
    let mut i = 0usize;
    while i < 256 {
        let b = i as u8;
        t[i] = if UTF8_LEN[i] < 2 {
            0
        } else if b == 0xE0 {
            0xA0
        } else if b == 0xF0 {
            0x90
        } else {
            0x80
        };
        i += 1;
    }
    t
};

const UTF8_B1_MAX: [u8; 256] = {
    let mut t = [0u8; 256];
    let mut i = 0usize;
    while i < 256 {
        let b = i as u8;
        t[i] = if UTF8_LEN[i] < 2 {
            0
        } else if b == 0xED {
            0x9F
        } else if b == 0xF4 {
            0x8F
        } else {
            0xBF
        };
        i += 1;
    }
    t
};

// Decode one rune from the front of buf, or None if the bytes are not valid
// UTF-8 (the caller then skips a single byte).
fn decode_rune(buf: &[u8]) -> Option<(char, usize)> {
    let b0 = buf[0];
    let len = UTF8_LEN[b0 as usize] as usize;
    if len == 0 || buf.len() < len {
        return None;
    }
    if len == 1 {
        return Some((b0 as char, 1));
    }
    let b1 = buf[1];
    if b1 < UTF8_B1_MIN[b0 as usize] || b1 > UTF8_B1_MAX[b0 as usize] {
        return None;
    }
    let mut cp = (b0 & UTF8_FIRST_MASK[len]) as u32;
    cp = cp << 6 | (b1 & 0x3F) as u32;
    let mut i = 2;
    while i < len {
        let b = buf[i];
        if b & 0xC0 != 0x80 {
            return None;
        }
        cp = cp << 6 | (b & 0x3F) as u32;
        i += 1;
    }
    char::from_u32(cp).map(|c| (c, len))
}

// Reports whether buf starts with a complete rune or with bytes that already
// cannot begin one (so decoding may proceed and fail).
fn full_rune(buf: &[u8]) -> bool {
    if buf.is_empty() {
        return false;
    }
    let len = UTF8_LEN[buf[0] as usize] as usize;
    if len == 0 || buf.len() >= len {
        return true;
    }
    // a malformed continuation makes the prefix decodable (as an error)
    buf[1..].iter().any(|&b| b & 0xC0 != 0x80)
}

fn next_size(size: usize) -> usize {
    const MIN: usize = 4 << 10; // 4K: minimum buffer size
    const MAX: usize = 1 << 20; // 1M: maximum buffer size which is still doubled
    if size < MIN {
        MIN
    } else if size <= MAX {
        size << 1
    } else {
        size + MAX
    }
}

// =============================================================================
// Reader
// =============================================================================

/// The buffer holds [... <segment start> ... <read position> ... <fill end> ...];
/// bytes before the active segment may be discarded when the buffer fills.
pub(crate) struct Source<'a> {
    src: &'a mut dyn Read,
    pub(crate) errh: ScanHandler<'a>,

    buf: Vec<u8>,
    ioerr: Option<io::Error>,
    eof: bool,
    b: Option<usize>, // segment start, None if no segment is active
    r: usize,         // read position
    e: usize,         // fill end
    line: u32,        // 0-based line of ch
    col: u32,         // 0-based byte column of ch
    pub(crate) ch: Option<char>, // current rune; None at end of file
    chw: usize,       // width of ch in bytes
}

impl<'a> Source<'a> {
    pub(crate) fn new(src: &'a mut dyn Read, errh: ScanHandler<'a>) -> Source<'a> {
        Source {
            src,
            errh,
            buf: vec![0; next_size(0)],
            ioerr: None,
            eof: false,
            b: None,
            r: 0,
            e: 0,
            line: 0,
            col: 0,
            ch: Some(' '),
            chw: 0,
        }
    }

    /// The 1-based (line, col) position of the current rune.
    pub(crate) fn pos(&self) -> (u32, u32) {
        (LINE_BASE + self.line, COL_BASE + self.col)
    }

    /// Reports msg at the position of the current rune.
    pub(crate) fn error(&mut self, msg: &str) {
        let (line, col) = self.pos();
        (self.errh)(line, col, msg);
    }

    /// Advances to the next rune. Idempotent at end of file.
    pub(crate) fn nextch(&mut self) {
        loop {
            self.col += self.chw as u32;
            if self.ch == Some('\n') {
                self.line += 1;
                self.col = 0;
            }

            // fast common case: at least one ASCII character
            if self.r < self.e && self.buf[self.r] < 0x80 {
                let b = self.buf[self.r];
                self.r += 1;
                self.chw = 1;
                if b == 0 {
                    self.ch = Some('\0');
                    self.error("invalid NUL character");
                    continue;
                }
                self.ch = Some(b as char);
                return;
            }

            // add more bytes to the buffer until we have a full rune
            while self.e - self.r < 4
                && !full_rune(&self.buf[self.r..self.e])
                && self.ioerr.is_none()
                && !self.eof
            {
                self.fill();
            }

            // end of file
            if self.r == self.e {
                if let Some(err) = self.ioerr.take() {
                    self.error(&format!("I/O error: {err}"));
                }
                self.ch = None;
                self.chw = 0;
                return;
            }

            match decode_rune(&self.buf[self.r..self.e]) {
                Some((c, w)) => {
                    self.ch = Some(c);
                    self.chw = w;
                    self.r += w;
                    if c == '\0' {
                        self.error("invalid NUL character");
                        continue;
                    }
                    return;
                }
                None => {
                    self.ch = Some('\u{FFFD}');
                    self.chw = 1;
                    self.r += 1;
                    self.error("invalid UTF-8 encoding");
                    continue;
                }
            }
        }
    }

    /// Starts a new segment at the current rune.
    pub(crate) fn start(&mut self) {
        self.b = Some(self.r - self.chw);
    }

    /// Ends the active segment, if any.
    pub(crate) fn stop(&mut self) {
        self.b = None;
    }

    /// The bytes from the segment start up to (excluding) the current rune.
    pub(crate) fn segment(&self) -> &[u8] {
        let b = self.b.expect("no active segment");
        &self.buf[b..self.r - self.chw]
    }

    /// Rewinds to the start of the active segment and re-reads its first
    /// rune. The segment must not span a newline. May be invoked at most once
    /// between segment start and the following `nextch`.
    pub(crate) fn rewind(&mut self) {
        let b = self.b.expect("no active segment");
        self.col -= (self.r - self.chw - b) as u32;
        self.r = b;
        self.ch = Some(' ');
        self.chw = 0;
        self.nextch();
    }

    fn fill(&mut self) {
        // determine content to preserve
        let b = match self.b {
            Some(b) => {
                self.b = Some(0); // after the content has moved down
                b
            }
            None => self.r,
        };
        let content_len = self.e - b;

        // grow the buffer or move the content down
        if content_len * 2 > self.buf.len() {
            let mut buf = vec![0; next_size(self.buf.len())];
            buf[..content_len].copy_from_slice(&self.buf[b..self.e]);
            self.buf = buf;
        } else if b > 0 {
            self.buf.copy_within(b..self.e, 0);
        }
        self.r -= b;
        self.e -= b;

        loop {
            match self.src.read(&mut self.buf[self.e..]) {
                Ok(0) => {
                    self.eof = true;
                    return;
                }
                Ok(n) => {
                    self.e += n;
                    return;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.ioerr = Some(err);
                    return;
                }
            }
        }
    }
}
