//! Openability checks
//!
//! Encryption destroys a file's structure along with its contents: a .docx
//! that no longer starts with a ZIP signature, a .json that no longer parses,
//! a .txt that is no longer text. Each registered extension maps to a cheap
//! verifier that answers "could a reader for this type open it?" without
//! parsing the format in full.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Reports whether a file can be opened by a reader for its type
pub trait OpenabilityProbe: Send + Sync {
    /// `Ok(false)` means the file was read and does not look like its type.
    /// I/O failures are returned as errors so the caller can tell them apart.
    fn can_open(&self, path: &Path, extension: &str) -> std::io::Result<bool>;
}

/// A byte pattern expected at a fixed offset
#[derive(Debug, Clone, Copy)]
pub struct Magic {
    pub offset: usize,
    pub bytes: &'static [u8],
}

const fn magic(bytes: &'static [u8]) -> Magic {
    Magic { offset: 0, bytes }
}

const ZIP: &[Magic] = &[magic(b"PK\x03\x04")];
const PDF: &[Magic] = &[magic(b"%PDF")];
const PNG: &[Magic] = &[magic(b"\x89PNG\r\n\x1A\n")];
const JPEG: &[Magic] = &[magic(b"\xFF\xD8\xFF")];
const GIF: &[Magic] = &[magic(b"GIF87a"), magic(b"GIF89a")];
const BMP: &[Magic] = &[magic(b"BM")];
const RIFF: &[Magic] = &[magic(b"RIFF")];
const MP3: &[Magic] = &[
    magic(b"ID3"),
    magic(b"\xFF\xFB"),
    magic(b"\xFF\xF3"),
    magic(b"\xFF\xF2"),
];
const ISO_MEDIA: &[Magic] = &[Magic { offset: 4, bytes: b"ftyp" }];
const MATROSKA: &[Magic] = &[magic(b"\x1A\x45\xDF\xA3")];

/// How an extension is verified
#[derive(Debug, Clone, Copy)]
pub enum Verifier {
    /// Container or image signature
    Signature(&'static [Magic]),
    /// Must parse as JSON
    Json,
    /// First character must decode as UTF-8
    Text,
}

/// Verifier registered for an extension, if any
pub fn verifier_for(extension: &str) -> Option<Verifier> {
    let verifier = match extension {
        // Documents
        "docx" | "xlsx" | "pptx" | "odt" | "ods" | "odp" | "zip" => Verifier::Signature(ZIP),
        "pdf" => Verifier::Signature(PDF),

        // Images
        "png" => Verifier::Signature(PNG),
        "jpg" | "jpeg" => Verifier::Signature(JPEG),
        "gif" => Verifier::Signature(GIF),
        "bmp" => Verifier::Signature(BMP),
        "webp" => Verifier::Signature(RIFF),

        // Media containers
        "mp3" => Verifier::Signature(MP3),
        "mp4" | "m4a" | "mov" => Verifier::Signature(ISO_MEDIA),
        "avi" | "wav" => Verifier::Signature(RIFF),
        "mkv" | "webm" => Verifier::Signature(MATROSKA),

        // Structured text
        "json" => Verifier::Json,

        // Plain text and source
        "txt" | "csv" | "md" | "html" | "htm" | "xml" | "c" | "cpp" | "h" | "java" | "php"
        | "py" | "js" | "rs" | "sh" => Verifier::Text,

        _ => return None,
    };
    Some(verifier)
}

/// Probe backed by the built-in verifier registry
#[derive(Debug, Clone)]
pub struct FormatProbe {
    unknown_is_openable: bool,
}

impl FormatProbe {
    /// `unknown_is_openable` decides the answer for extensions with no verifier
    pub fn new(unknown_is_openable: bool) -> Self {
        Self { unknown_is_openable }
    }
}

impl Default for FormatProbe {
    fn default() -> Self {
        Self::new(true)
    }
}

impl OpenabilityProbe for FormatProbe {
    fn can_open(&self, path: &Path, extension: &str) -> std::io::Result<bool> {
        let extension = extension.to_lowercase();
        match verifier_for(&extension) {
            Some(Verifier::Signature(signatures)) => {
                let header = read_prefix(path, 16)?;
                Ok(matches_any(&header, signatures))
            }
            Some(Verifier::Json) => {
                let reader = BufReader::new(File::open(path)?);
                Ok(serde_json::from_reader::<_, serde::de::IgnoredAny>(reader).is_ok())
            }
            Some(Verifier::Text) => {
                let prefix = read_prefix(path, 4)?;
                Ok(starts_with_text(&prefix))
            }
            None => {
                // Still surface a vanished or unreadable file
                std::fs::metadata(path)?;
                Ok(self.unknown_is_openable)
            }
        }
    }
}

/// Whether the header carries any of the signatures
pub fn matches_any(header: &[u8], signatures: &[Magic]) -> bool {
    signatures.iter().any(|sig| {
        header
            .get(sig.offset..sig.offset + sig.bytes.len())
            .is_some_and(|window| window == sig.bytes)
    })
}

/// Empty input counts as text; a truncated trailing sequence is tolerated
fn starts_with_text(prefix: &[u8]) -> bool {
    match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(e) => e.valid_up_to() > 0 || e.error_len().is_none(),
    }
}

fn read_prefix(path: &Path, len: u64) -> std::io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(len as usize);
    File::open(path)?.take(len).read_to_end(&mut buffer)?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_valid_signatures() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FormatProbe::default();

        let png = write(dir.path(), "a.png", b"\x89PNG\r\n\x1A\n\x00\x00\x00\rIHDR");
        let pdf = write(dir.path(), "b.pdf", b"%PDF-1.4\n%\xE2\xE3\xCF\xD3");
        let docx = write(dir.path(), "c.docx", b"PK\x03\x04\x14\x00\x06\x00");
        let mp4 = write(dir.path(), "d.mp4", b"\x00\x00\x00\x20ftypisom");

        assert!(probe.can_open(&png, "png").unwrap());
        assert!(probe.can_open(&pdf, "PDF").unwrap());
        assert!(probe.can_open(&docx, "docx").unwrap());
        assert!(probe.can_open(&mp4, "mp4").unwrap());
    }

    #[test]
    fn test_encrypted_header() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FormatProbe::default();

        let pdf = write(dir.path(), "doc.pdf", b"\x7B\x2F\x8A\x3C\x99\x12\xAB\xCD");
        let short = write(dir.path(), "img.png", b"\x89P");

        assert!(!probe.can_open(&pdf, "pdf").unwrap());
        assert!(!probe.can_open(&short, "png").unwrap());
    }

    #[test]
    fn test_json() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FormatProbe::default();

        let good = write(dir.path(), "a.json", br#"{"name": "report", "pages": [1, 2]}"#);
        let bad = write(dir.path(), "b.json", b"\xDE\xAD\xBE\xEF{");

        assert!(probe.can_open(&good, "json").unwrap());
        assert!(!probe.can_open(&bad, "json").unwrap());
    }

    #[test]
    fn test_text() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FormatProbe::default();

        let plain = write(dir.path(), "a.txt", b"quarterly numbers");
        let empty = write(dir.path(), "b.csv", b"");
        let accented = write(dir.path(), "c.txt", "été".as_bytes());
        let binary = write(dir.path(), "d.txt", b"\xFF\xFE\x00\x81");

        assert!(probe.can_open(&plain, "txt").unwrap());
        assert!(probe.can_open(&empty, "csv").unwrap());
        assert!(probe.can_open(&accented, "txt").unwrap());
        assert!(!probe.can_open(&binary, "txt").unwrap());
    }

    #[test]
    fn test_unknown_extension_policy() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "secret.lock", b"\xDE\xAD\xBE\xEF");

        assert!(FormatProbe::new(true).can_open(&file, "lock").unwrap());
        assert!(!FormatProbe::new(false).can_open(&file, "lock").unwrap());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let probe = FormatProbe::default();
        let err = probe.can_open(&dir.path().join("gone.pdf"), "pdf").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
    }
}
