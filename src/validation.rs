//! Input validation shared by the HTTP handlers and offline tooling.
//!
//! Lookup rows (branch codes, batch years, semester numbers) are checked by
//! the small `check_*`/`normalize_*` helpers below.
//!
//! Uploads are first matched against a small set of magic-byte signatures
//! (PDF, PNG, JPEG, WEBP). A sniffed type always wins over whatever the
//! client declared. Files without a known signature fall back to matching
//! the file-name extension against an allow-list, with the declared MIME
//! type required to agree with that extension.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("File is empty")]
    Empty,
    #[error("File exceeds maximum upload size of {max} bytes")]
    TooLarge { max: u64 },
    #[error("File content does not match its .{extension} extension")]
    SignatureMismatch { extension: String },
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum LookupError {
    #[error("code must not be empty")]
    EmptyCode,
    #[error("code must be alphanumeric")]
    NonAlphanumericCode,
    #[error("batch_year must be between 2000 and 2100")]
    BatchYearOutOfRange,
    #[error("semester_number must be 1 or 2")]
    SemesterNumberOutOfRange,
}

/// Trim and uppercase a branch code, rejecting anything but ASCII letters and digits.
pub fn normalize_branch_code(raw: &str) -> Result<String, LookupError> {
    let code = raw.trim().to_uppercase();
    if code.is_empty() {
        return Err(LookupError::EmptyCode);
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(LookupError::NonAlphanumericCode);
    }
    Ok(code)
}

pub fn check_batch_year(batch_year: i32) -> Result<(), LookupError> {
    if !(2000..=2100).contains(&batch_year) {
        return Err(LookupError::BatchYearOutOfRange);
    }
    Ok(())
}

pub fn check_semester_number(n: u8) -> Result<(), LookupError> {
    if !(1..=2).contains(&n) {
        return Err(LookupError::SemesterNumberOutOfRange);
    }
    Ok(())
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedFile {
    pub mime_type: String,
    /// Canonical extension for the stored object
    pub extension: String,
}

struct Signature {
    mime_type: &'static str,
    extension: &'static str,
    /// Extensions that claim this type
    aliases: &'static [&'static str],
    matches: fn(&[u8]) -> bool,
}

const SIGNATURES: &[Signature] = &[
    Signature {
        mime_type: "application/pdf",
        extension: "pdf",
        aliases: &["pdf"],
        matches: is_pdf,
    },
    Signature {
        mime_type: "image/png",
        extension: "png",
        aliases: &["png"],
        matches: is_png,
    },
    Signature {
        mime_type: "image/jpeg",
        extension: "jpg",
        aliases: &["jpg", "jpeg"],
        matches: is_jpeg,
    },
    Signature {
        mime_type: "image/webp",
        extension: "webp",
        aliases: &["webp"],
        matches: is_webp,
    },
];

fn is_pdf(b: &[u8]) -> bool {
    b.starts_with(b"%PDF-")
}

fn is_png(b: &[u8]) -> bool {
    b.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
}

fn is_jpeg(b: &[u8]) -> bool {
    b.starts_with(&[0xFF, 0xD8, 0xFF])
}

fn is_webp(b: &[u8]) -> bool {
    b.len() >= 12 && &b[0..4] == b"RIFF" && &b[8..12] == b"WEBP"
}

/// Extensions accepted without a recognised signature.
const FALLBACK_EXTENSIONS: &[&str] = &["doc", "docx", "ppt", "pptx", "txt", "xls", "xlsx"];

/// Identify a supported type from the leading bytes alone.
pub fn sniff(bytes: &[u8]) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|s| (s.matches)(bytes))
        .map(|s| s.mime_type)
}

fn extension_of(file_name: Option<&str>) -> Option<String> {
    let name = file_name?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Validate an upload and decide the MIME type it is stored under.
pub fn validate_upload(
    bytes: &[u8],
    file_name: Option<&str>,
    declared_mime: Option<&str>,
    max_size: u64,
) -> Result<ValidatedFile, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::Empty);
    }
    if bytes.len() as u64 > max_size {
        return Err(ValidationError::TooLarge { max: max_size });
    }

    if let Some(sig) = SIGNATURES.iter().find(|s| (s.matches)(bytes)) {
        return Ok(ValidatedFile {
            mime_type: sig.mime_type.to_string(),
            extension: sig.extension.to_string(),
        });
    }

    let extension = extension_of(file_name)
        .ok_or_else(|| ValidationError::Unsupported("missing file extension".to_string()))?;

    // A sniffable extension without its signature is a disguised file
    if SIGNATURES.iter().any(|s| s.aliases.contains(&extension.as_str())) {
        return Err(ValidationError::SignatureMismatch { extension });
    }

    if !FALLBACK_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ValidationError::Unsupported(format!(".{extension}")));
    }

    let expected = mime_guess::from_ext(&extension)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let declared = declared_mime
        .map(|m| m.split(';').next().unwrap_or("").trim().to_lowercase())
        .filter(|m| !m.is_empty() && m != "application/octet-stream");

    match declared {
        Some(declared) if declared != expected => Err(ValidationError::Unsupported(format!(
            "declared type {declared} does not match .{extension}"
        ))),
        _ => Ok(ValidatedFile {
            mime_type: expected,
            extension,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 1024;

    #[test]
    fn test_lookup_rules() {
        assert_eq!(normalize_branch_code(" cse "), Ok("CSE".to_string()));
        assert_eq!(normalize_branch_code("  "), Err(LookupError::EmptyCode));
        assert_eq!(
            normalize_branch_code("C-S"),
            Err(LookupError::NonAlphanumericCode)
        );
        assert!(check_batch_year(2000).is_ok());
        assert!(check_batch_year(2100).is_ok());
        assert_eq!(
            check_batch_year(1999),
            Err(LookupError::BatchYearOutOfRange)
        );
        assert!(check_semester_number(2).is_ok());
        assert_eq!(
            check_semester_number(0),
            Err(LookupError::SemesterNumberOutOfRange)
        );
    }

    #[test]
    fn test_sniffs_known_signatures() {
        assert_eq!(sniff(b"%PDF-1.7\n..."), Some("application/pdf"));
        assert_eq!(
            sniff(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]),
            Some("image/png")
        );
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff(b"RIFF\x10\x00\x00\x00WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff(b"RIFF\x10\x00\x00\x00WAVEfmt "), None);
        assert_eq!(sniff(b"hello"), None);
    }

    #[test]
    fn test_signature_wins_over_declared_type() {
        let file = validate_upload(
            b"%PDF-1.4 body",
            Some("notes.png"),
            Some("image/png"),
            MAX,
        )
        .unwrap();
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.extension, "pdf");
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert_eq!(
            validate_upload(b"", Some("a.pdf"), None, MAX),
            Err(ValidationError::Empty)
        );
        let big = vec![b'%'; 2048];
        assert_eq!(
            validate_upload(&big, Some("a.txt"), None, MAX),
            Err(ValidationError::TooLarge { max: MAX })
        );
    }

    #[test]
    fn test_disguised_pdf_is_rejected() {
        let err = validate_upload(b"MZ\x90\x00", Some("unit1.PDF"), Some("application/pdf"), MAX)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::SignatureMismatch {
                extension: "pdf".to_string()
            }
        );
    }

    #[test]
    fn test_fallback_accepts_office_documents() {
        let file = validate_upload(
            b"PK\x03\x04 zip body",
            Some("record.docx"),
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            MAX,
        )
        .unwrap();
        assert_eq!(file.extension, "docx");
        assert_eq!(
            file.mime_type,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );

        // Generic declared types defer to the extension
        let file = validate_upload(
            b"plain text",
            Some("syllabus.txt"),
            Some("application/octet-stream"),
            MAX,
        )
        .unwrap();
        assert_eq!(file.mime_type, "text/plain");
    }

    #[test]
    fn test_fallback_rejects_mismatched_mime() {
        let err =
            validate_upload(b"plain", Some("syllabus.txt"), Some("text/html"), MAX).unwrap_err();
        assert!(matches!(err, ValidationError::Unsupported(_)));
    }

    #[test]
    fn test_rejects_unknown_extension() {
        assert!(matches!(
            validate_upload(b"#!/bin/sh", Some("run.sh"), None, MAX),
            Err(ValidationError::Unsupported(_))
        ));
        assert!(matches!(
            validate_upload(b"data", Some("noext"), None, MAX),
            Err(ValidationError::Unsupported(_))
        ));
    }
}
