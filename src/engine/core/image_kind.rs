use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Still image encodings accepted for cover art
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Heic,
}

/// Image file extensions accepted at validation time
const IMAGE_EXTENSIONS: &[(&str, ImageKind)] = &[
    ("jpg", ImageKind::Jpeg),
    ("jpeg", ImageKind::Jpeg),
    ("jpe", ImageKind::Jpeg),
    ("png", ImageKind::Png),
    ("heic", ImageKind::Heic),
    ("heif", ImageKind::Heic),
];

/// ISO-BMFF brands that mark a HEIF/HEIC still
const HEIC_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"mif1", b"msf1",
];

impl ImageKind {
    /// Classify by file extension only
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        IMAGE_EXTENSIONS
            .iter()
            .find(|(candidate, _)| *candidate == ext)
            .map(|(_, kind)| *kind)
    }

    /// Classify by the leading bytes of the encoded image
    pub fn from_signature(header: &[u8]) -> Option<Self> {
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageKind::Jpeg);
        }
        if header.starts_with(&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n']) {
            return Some(ImageKind::Png);
        }
        if header.len() >= 12 && &header[4..8] == b"ftyp" {
            let brand = &header[8..12];
            if HEIC_BRANDS.iter().any(|b| b.as_slice() == brand) {
                return Some(ImageKind::Heic);
            }
        }
        None
    }

    /// Sniff the file's byte signature, falling back to its extension
    pub fn detect(path: &Path) -> io::Result<Option<Self>> {
        let mut header = [0u8; 16];
        let mut file = File::open(path)?;
        let mut filled = 0;
        while filled < header.len() {
            let n = file.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(Self::from_signature(&header[..filled]).or_else(|| Self::from_extension(path)))
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Heic => "image/heic",
        }
    }

    /// Codec used for the attached cover-art stream. MP4 cover art only
    /// carries JPEG or PNG, so HEIC is re-encoded to JPEG.
    pub fn cover_codec(&self) -> &'static str {
        match self {
            ImageKind::Jpeg | ImageKind::Heic => "mjpeg",
            ImageKind::Png => "png",
        }
    }
}
