//! Content-based MIME type sniffing.
//!
//! Reads the head of a file and matches it against a table of magic byte
//! signatures. Files matching no signature are classified as text or binary
//! by inspecting their bytes, so sniffing a readable file always yields a
//! label.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Number of bytes read from the start of a file.
const SNIFF_LEN: usize = 8192;

pub const EMPTY: &str = "inode/x-empty";
pub const TEXT: &str = "text/plain";
pub const BINARY: &str = "application/octet-stream";

/// A magic byte signature at a fixed offset.
struct Signature {
    offset: usize,
    magic: &'static [u8],
    mime: &'static str,
}

const fn sig(offset: usize, magic: &'static [u8], mime: &'static str) -> Signature {
    Signature {
        offset,
        magic,
        mime,
    }
}

// Checked in order; more specific signatures come first.
static SIGNATURES: &[Signature] = &[
    // Documents
    sig(0, b"%PDF-", "application/pdf"),
    sig(0, b"{\\rtf", "text/rtf"),
    sig(0, b"%!PS", "application/postscript"),
    sig(0, &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1], "application/x-ole-storage"),
    sig(0, b"SQLite format 3\0", "application/vnd.sqlite3"),
    // Images
    sig(0, &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], "image/png"),
    sig(0, &[0xFF, 0xD8, 0xFF], "image/jpeg"),
    sig(0, b"GIF87a", "image/gif"),
    sig(0, b"GIF89a", "image/gif"),
    sig(8, b"WEBP", "image/webp"),
    sig(0, &[0x49, 0x49, 0x2A, 0x00], "image/tiff"),
    sig(0, &[0x4D, 0x4D, 0x00, 0x2A], "image/tiff"),
    sig(0, &[0x00, 0x00, 0x01, 0x00], "image/vnd.microsoft.icon"),
    sig(0, b"8BPS", "image/vnd.adobe.photoshop"),
    // Audio and video
    sig(0, b"ID3", "audio/mpeg"),
    sig(0, b"fLaC", "audio/flac"),
    sig(0, b"OggS", "audio/ogg"),
    sig(8, b"WAVE", "audio/x-wav"),
    sig(8, b"AVI ", "video/x-msvideo"),
    sig(4, b"ftypqt", "video/quicktime"),
    sig(4, b"ftypM4A", "audio/mp4"),
    sig(4, b"ftyp", "video/mp4"),
    sig(0, &[0x1A, 0x45, 0xDF, 0xA3], "video/x-matroska"),
    // Archives
    sig(0, &[0x1F, 0x8B], "application/gzip"),
    sig(0, b"BZh", "application/x-bzip2"),
    sig(0, &[0xFD, b'7', b'z', b'X', b'Z', 0x00], "application/x-xz"),
    sig(0, &[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C], "application/x-7z-compressed"),
    sig(0, b"Rar!\x1A\x07", "application/vnd.rar"),
    sig(257, b"ustar", "application/x-tar"),
    sig(0, &[b'P', b'K', 0x03, 0x04], "application/zip"),
    // Executables
    sig(0, &[0x7F, b'E', b'L', b'F'], "application/x-executable"),
    sig(0, b"MZ", "application/x-dosexec"),
    sig(0, &[0x00, b'a', b's', b'm'], "application/wasm"),
    // Markup
    sig(0, b"<?xml", "text/xml"),
];

/// Sniff the MIME type of the file at `path`.
pub fn sniff_file(path: &Path) -> io::Result<&'static str> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(sniff_bytes(&head))
}

/// Sniff the MIME type of a buffer holding the start of a file.
pub fn sniff_bytes(head: &[u8]) -> &'static str {
    if head.is_empty() {
        return EMPTY;
    }

    if let Some(signature) = SIGNATURES.iter().find(|s| matches_at(head, s)) {
        if signature.mime == "application/zip" {
            return office_container(head).unwrap_or(signature.mime);
        }
        return signature.mime;
    }

    if looks_like_html(head) {
        return "text/html";
    }

    if looks_like_text(head) {
        TEXT
    } else {
        BINARY
    }
}

fn matches_at(head: &[u8], signature: &Signature) -> bool {
    head.get(signature.offset..signature.offset + signature.magic.len())
        .map_or(false, |window| window == signature.magic)
}

/// Office Open XML and OpenDocument files are zip archives; tell them apart
/// from plain archives by the entry names near the start.
fn office_container(head: &[u8]) -> Option<&'static str> {
    if contains(head, b"mimetypeapplication/vnd.oasis.opendocument.text") {
        return Some("application/vnd.oasis.opendocument.text");
    }
    if contains(head, b"mimetypeapplication/vnd.oasis.opendocument.spreadsheet") {
        return Some("application/vnd.oasis.opendocument.spreadsheet");
    }
    if contains(head, b"word/") {
        return Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document");
    }
    if contains(head, b"xl/") {
        return Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet");
    }
    if contains(head, b"ppt/") {
        return Some("application/vnd.openxmlformats-officedocument.presentationml.presentation");
    }
    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn looks_like_html(head: &[u8]) -> bool {
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let prefix: Vec<u8> = head[start..]
        .iter()
        .take(15)
        .map(|b| b.to_ascii_lowercase())
        .collect();
    prefix.starts_with(b"<!doctype html") || prefix.starts_with(b"<html")
}

/// Text if the head decodes as UTF-8 (ignoring a character cut off at the
/// end of the buffer) and holds no control bytes besides common whitespace.
fn looks_like_text(head: &[u8]) -> bool {
    let valid = match std::str::from_utf8(head) {
        Ok(_) => head.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => return false,
    };

    head[..valid]
        .iter()
        .all(|&b| b >= 0x20 || matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B | 0x08))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signatures() {
        assert_eq!(sniff_bytes(b"%PDF-1.7\n..."), "application/pdf");
        assert_eq!(
            sniff_bytes(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]),
            "image/png"
        );
        assert_eq!(sniff_bytes(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_bytes(b"RIFF\x24\x00\x00\x00WAVEfmt "), "audio/x-wav");
        assert_eq!(sniff_bytes(b"\x00\x00\x00\x18ftypmp42"), "video/mp4");
    }

    #[test]
    fn test_tar_offset() {
        let mut head = vec![0u8; 512];
        head[..8].copy_from_slice(b"file.txt");
        head[257..262].copy_from_slice(b"ustar");
        assert_eq!(sniff_bytes(&head), "application/x-tar");
    }

    #[test]
    fn test_office_documents() {
        let mut docx = vec![b'P', b'K', 0x03, 0x04];
        docx.extend_from_slice(b"\x14\x00\x06\x00....[Content_Types].xml....word/document.xml");
        assert_eq!(
            sniff_bytes(&docx),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );

        let mut zip = vec![b'P', b'K', 0x03, 0x04];
        zip.extend_from_slice(b"\x14\x00\x00\x00photos/beach.jpg");
        assert_eq!(sniff_bytes(&zip), "application/zip");
    }

    #[test]
    fn test_text_and_binary() {
        assert_eq!(sniff_bytes(b""), EMPTY);
        assert_eq!(sniff_bytes(b"hello world\n"), TEXT);
        assert_eq!(sniff_bytes("grüße\n".as_bytes()), TEXT);
        assert_eq!(sniff_bytes(&[0x01, 0x02, 0x03, 0x00, 0xFF]), BINARY);
        assert_eq!(sniff_bytes(b"  <!DOCTYPE html><html>"), "text/html");
    }

    #[test]
    fn test_truncated_utf8_is_text() {
        let mut head = "abc".as_bytes().to_vec();
        head.extend_from_slice(&"é".as_bytes()[..1]);
        assert_eq!(sniff_bytes(&head), TEXT);
    }
}
