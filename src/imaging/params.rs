//! Format-specific save parameters.
//!
//! A [`SaveParams`] value is chosen once, when the source is decoded, and
//! carries only what that container preserves on re-encode. The encoder in
//! [`encode`](super::encode) matches on it; nothing else dispatches on format.
//!
//! ## Types
//!
//! - [`Quality`]: JPEG quality (1–100, default 70). Clamped on construction.
//! - [`TiffCompression`]: compression schemes the TIFF encoder can write.
//! - [`TextField`]: a descriptive key/value carried from source to output.
//! - [`Palette`]: a PNG color table kept for indexed sources.
//! - [`SaveParams`]: the closed per-container variant.

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// TIFF compression schemes that survive a re-encode.
///
/// Sources using anything else (JPEG-in-TIFF, CCITT fax, ...) are written
/// with LZW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiffCompression {
    #[default]
    Uncompressed,
    Lzw,
    Deflate,
    PackBits,
}

impl TiffCompression {
    /// Map a TIFF `Compression` tag value (259).
    pub fn from_tag(value: u16) -> Self {
        match value {
            1 => Self::Uncompressed,
            5 => Self::Lzw,
            8 | 32946 => Self::Deflate,
            32773 => Self::PackBits,
            _ => Self::Lzw,
        }
    }
}

/// A descriptive text field (TIFF ASCII tag or PNG text chunk).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    pub key: String,
    pub value: String,
}

impl TextField {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// `PLTE` entries plus the optional per-entry alpha from `tRNS`.
///
/// Entries past the end of `alpha` are opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub entries: Vec<[u8; 3]>,
    pub alpha: Vec<u8>,
}

impl Palette {
    /// Build from raw `PLTE` bytes (RGB triples) and `tRNS` bytes.
    pub fn from_chunks(plte: &[u8], trns: Option<&[u8]>) -> Self {
        Self {
            entries: plte
                .chunks_exact(3)
                .map(|rgb| [rgb[0], rgb[1], rgb[2]])
                .collect(),
            alpha: trns.map(<[u8]>::to_vec).unwrap_or_default(),
        }
    }

    fn alpha_at(&self, index: usize) -> u8 {
        self.alpha.get(index).copied().unwrap_or(u8::MAX)
    }

    /// Index of an opaque white entry, adding one when the table has room.
    ///
    /// A full table without white falls back to the lightest opaque entry,
    /// then to index 255.
    pub fn white_index(&mut self) -> u8 {
        let opaque_white = (0..self.entries.len())
            .find(|&i| self.entries[i] == [u8::MAX; 3] && self.alpha_at(i) == u8::MAX);
        if let Some(i) = opaque_white {
            return i as u8;
        }
        if self.entries.len() < 256 {
            self.entries.push([u8::MAX; 3]);
            return (self.entries.len() - 1) as u8;
        }
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, _)| self.alpha_at(*i) == u8::MAX)
            .max_by_key(|(_, rgb)| rgb.iter().map(|&c| u16::from(c)).sum::<u16>())
            .map_or(u8::MAX, |(i, _)| i as u8)
    }

    /// Raw `PLTE` chunk bytes.
    pub fn plte(&self) -> Vec<u8> {
        self.entries.concat()
    }

    /// Raw `tRNS` chunk bytes, or `None` when every entry is opaque.
    pub fn trns(&self) -> Option<&[u8]> {
        (!self.alpha.is_empty()).then_some(self.alpha.as_slice())
    }
}

/// What each container keeps across the rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveParams {
    Jpeg {
        quality: Quality,
    },
    Tiff {
        compression: TiffCompression,
        /// `(tag number, value)` pairs for ASCII tags.
        tags: Vec<(u16, String)>,
    },
    Png {
        /// `tRNS` key for grey/RGB sources, two big-endian bytes per sample.
        transparency: Option<Vec<u8>>,
        text: Vec<TextField>,
        /// Color table of an indexed source; its pixels stay indices.
        palette: Option<Palette>,
    },
    Other,
}

impl SaveParams {
    pub fn format_name(&self) -> &'static str {
        match self {
            Self::Jpeg { .. } => "JPEG",
            Self::Tiff { .. } => "TIFF",
            Self::Png { .. } => "PNG",
            Self::Other => "other",
        }
    }

    /// Whether a declared transparency key must be honoured when compositing.
    pub fn has_transparency_key(&self) -> bool {
        matches!(self, Self::Png { transparency: Some(_), .. })
    }
}
