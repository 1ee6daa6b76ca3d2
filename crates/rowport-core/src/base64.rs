//! Line-wrapped Base64 used to embed binary columns in text formats.
//!
//! Encoding uses the standard alphabet (`A-Z a-z 0-9 + /`) with `=` padding
//! and breaks lines after [`ENCODED_LINE_LENGTH`] symbols. The encoder tracks
//! the current column so a value can be encoded in several chunks and still
//! wrap exactly like a single-shot encode, provided every chunk except the
//! last is a multiple of 3 bytes ([`DECODED_CHUNK_SIZE`] is the natural one).
//!
//! Decoding is permissive: `=` and every byte outside the alphabet are
//! skipped, so wrapped text, CRLF line ends and stray whitespace all decode.
//! Corrupt input is never reported; compare lengths if you need strictness.

/// Bytes that encode to exactly one full output line.
pub const DECODED_CHUNK_SIZE: usize = 57;

/// Output symbols per line.
pub const ENCODED_LINE_LENGTH: usize = 76;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PAD: u8 = b'=';
const INVALID: u8 = 0xFF;
const DECODE_TABLE: [u8; 256] = build_decode_table();

const fn build_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < ALPHABET.len() {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Encode `bytes` starting at column 0.
pub fn encode(bytes: &[u8]) -> String {
    encode_at(bytes, 0).0
}

/// Encode `bytes` as if `start_column` symbols were already on the current
/// line. Returns the text and the column after the last symbol.
pub fn encode_at(bytes: &[u8], start_column: usize) -> (String, usize) {
    let mut enc = Base64Encoder::starting_at(start_column);
    let mut out = String::with_capacity(encoded_len(bytes.len()));
    enc.encode_chunk(bytes, &mut out);
    (out, enc.column())
}

/// Decode permissively; see the module docs.
pub fn decode(text: &str) -> Vec<u8> {
    let mut dec = Base64Decoder::new();
    let mut out = Vec::with_capacity(text.len() / 4 * 3 + 2);
    dec.decode_chunk(text.as_bytes(), &mut out);
    dec.finish(&mut out);
    out
}

/// True for every character encoded text can contain besides line breaks:
/// the alphabet and the `=` pad.
pub fn is_symbol(c: char) -> bool {
    c.is_ascii() && (c as u8 == PAD || DECODE_TABLE[c as usize] != INVALID)
}

/// Upper bound on encoded text length for `n` input bytes, line breaks included.
pub fn encoded_len(n: usize) -> usize {
    let symbols = n.div_ceil(3) * 4;
    symbols + symbols / ENCODED_LINE_LENGTH
}

#[derive(Debug, Clone)]
pub struct Base64Encoder {
    column: usize,
    wrap: bool,
}

impl Default for Base64Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Base64Encoder {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    pub fn starting_at(column: usize) -> Self {
        Self { column, wrap: true }
    }

    /// An encoder that never inserts line breaks.
    pub fn unwrapped() -> Self {
        Self {
            column: 0,
            wrap: false,
        }
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// Append the encoding of `bytes` to `out`. A trailing group of 1 or 2
    /// bytes is padded, so only the last chunk of a value may have a length
    /// that is not a multiple of 3.
    pub fn encode_chunk(&mut self, bytes: &[u8], out: &mut String) {
        for group in bytes.chunks(3) {
            let b0 = group[0];
            let b1 = group.get(1).copied().unwrap_or(0);
            let b2 = group.get(2).copied().unwrap_or(0);

            self.push_symbol(ALPHABET[(b0 >> 2) as usize], out);
            self.push_symbol(ALPHABET[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize], out);
            if group.len() > 1 {
                self.push_symbol(ALPHABET[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize], out);
            } else {
                self.push_symbol(PAD, out);
            }
            if group.len() > 2 {
                self.push_symbol(ALPHABET[(b2 & 0x3f) as usize], out);
            } else {
                self.push_symbol(PAD, out);
            }
        }
    }

    // The break goes before the 77th symbol, never after the 76th, so a
    // value never ends with a dangling line break.
    fn push_symbol(&mut self, symbol: u8, out: &mut String) {
        if self.wrap && self.column >= ENCODED_LINE_LENGTH {
            out.push('\n');
            self.column = 0;
        }
        out.push(symbol as char);
        self.column += 1;
    }
}

/// Streaming decoder; carries an incomplete 4-symbol group between chunks.
#[derive(Debug, Clone, Default)]
pub struct Base64Decoder {
    group: [u8; 4],
    filled: usize,
}

impl Base64Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode_chunk(&mut self, text: &[u8], out: &mut Vec<u8>) {
        for &c in text {
            let v = DECODE_TABLE[c as usize];
            if v == INVALID {
                continue;
            }
            self.group[self.filled] = v;
            self.filled += 1;
            if self.filled == 4 {
                let [g0, g1, g2, g3] = self.group;
                out.push((g0 << 2) | (g1 >> 4));
                out.push((g1 << 4) | (g2 >> 2));
                out.push((g2 << 6) | g3);
                self.filled = 0;
            }
        }
    }

    /// Emit the 1 or 2 bytes held by a final short group. A lone symbol
    /// carries fewer than 8 bits and is dropped.
    pub fn finish(self, out: &mut Vec<u8>) {
        let [g0, g1, g2, _] = self.group;
        match self.filled {
            2 => out.push((g0 << 2) | (g1 >> 4)),
            3 => {
                out.push((g0 << 2) | (g1 >> 4));
                out.push((g1 << 4) | (g2 >> 2));
            }
            _ => {}
        }
    }
}
