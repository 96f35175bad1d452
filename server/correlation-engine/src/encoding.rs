//! Byte-order-mark detection and line splitting for log byte streams.
//!
//! UTF-16 (LE/BE) files carrying a BOM are decoded transparently; everything
//! else is treated as UTF-8 (invalid sequences replaced, never rejected).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
  Utf8,
  Utf16Le,
  Utf16Be,
}

impl TextEncoding {
  /// Detect the encoding from leading bytes. Returns the BOM length to skip.
  pub fn detect(prefix: &[u8]) -> (Self, usize) {
    match prefix {
      [0xFF, 0xFE, ..] => (Self::Utf16Le, 2),
      [0xFE, 0xFF, ..] => (Self::Utf16Be, 2),
      [0xEF, 0xBB, 0xBF, ..] => (Self::Utf8, 3),
      _ => (Self::Utf8, 0),
    }
  }

  /// Decode a whole buffer, honoring (and skipping) a leading BOM.
  pub fn decode_with_bom(bytes: &[u8]) -> String {
    let (enc, bom) = Self::detect(bytes);
    enc.decode(&bytes[bom..])
  }

  /// Decode bytes that carry no BOM.
  pub fn decode(self, bytes: &[u8]) -> String {
    match self {
      Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
      Self::Utf16Le | Self::Utf16Be => {
        let units = bytes.chunks_exact(2).map(|pair| self.unit([pair[0], pair[1]]));
        char::decode_utf16(units)
          .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
          .collect()
      }
    }
  }

  fn unit(self, pair: [u8; 2]) -> u16 {
    match self {
      Self::Utf16Be => u16::from_be_bytes(pair),
      _ => u16::from_le_bytes(pair),
    }
  }

  /// Remove one complete line (without its terminator) from the front of
  /// `pending`. Returns `None` while no full line is buffered.
  pub fn split_line(self, pending: &mut Vec<u8>) -> Option<String> {
    let (end, terminator) = match self {
      Self::Utf8 => (pending.iter().position(|&b| b == b'\n')?, 1),
      Self::Utf16Le | Self::Utf16Be => {
        let unit_idx = pending
          .chunks_exact(2)
          .position(|pair| self.unit([pair[0], pair[1]]) == u16::from(b'\n'))?;
        (unit_idx * 2, 2)
      }
    };
    let raw: Vec<u8> = pending.drain(..end + terminator).take(end).collect();
    let mut line = self.decode(&raw);
    if line.ends_with('\r') {
      line.pop();
    }
    Some(line)
  }
}

/// Incremental decoder for an append-only byte stream.
///
/// When the stream is read from its first byte the encoding is detected from
/// the BOM once enough bytes have arrived.
#[derive(Debug, Default)]
pub struct LineDecoder {
  encoding: Option<TextEncoding>,
  pending: Vec<u8>,
}

impl LineDecoder {
  /// Decoder for a stream starting at byte zero (BOM not yet seen).
  pub fn from_start() -> Self {
    Self::default()
  }

  /// Decoder for a stream positioned mid-file with a known encoding.
  pub fn with_encoding(encoding: TextEncoding) -> Self {
    Self {
      encoding: Some(encoding),
      pending: Vec::new(),
    }
  }

  pub fn encoding(&self) -> Option<TextEncoding> {
    self.encoding
  }

  pub fn push(&mut self, bytes: &[u8]) {
    self.pending.extend_from_slice(bytes);
  }

  pub fn next_line(&mut self) -> Option<String> {
    let enc = self.resolve()?;
    enc.split_line(&mut self.pending)
  }

  fn resolve(&mut self) -> Option<TextEncoding> {
    if let Some(enc) = self.encoding {
      return Some(enc);
    }
    let p = &self.pending;
    let decidable = p.len() >= 3
      || p.starts_with(&[0xFF, 0xFE])
      || p.starts_with(&[0xFE, 0xFF])
      || p.contains(&b'\n');
    if !decidable {
      return None;
    }
    let (enc, bom) = TextEncoding::detect(p);
    self.pending.drain(..bom);
    self.encoding = Some(enc);
    Some(enc)
  }
}

#[cfg(test)]
pub(crate) fn utf16_bytes(text: &str, enc: TextEncoding) -> Vec<u8> {
  let mut out = match enc {
    TextEncoding::Utf16Le => vec![0xFF, 0xFE],
    TextEncoding::Utf16Be => vec![0xFE, 0xFF],
    TextEncoding::Utf8 => return text.as_bytes().to_vec(),
  };
  for unit in text.encode_utf16() {
    match enc {
      TextEncoding::Utf16Be => out.extend_from_slice(&unit.to_be_bytes()),
      _ => out.extend_from_slice(&unit.to_le_bytes()),
    }
  }
  out
}
