//! Upload validation against size and type policy.
//!
//! Runs before any processing. Pure function of the file descriptor.

use crate::domain::{AppError, Result, UploadedFile, ValidationKind, DEFAULT_MAX_UPLOAD_BYTES};

/// Document types accepted for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Doc,
    Docx,
    Txt,
    Xls,
    Xlsx,
    Csv,
    Json,
}

impl DocumentKind {
    /// Every accepted kind, in allow-list order.
    pub const ALL: [Self; 8] = [
        Self::Pdf,
        Self::Doc,
        Self::Docx,
        Self::Txt,
        Self::Xls,
        Self::Xlsx,
        Self::Csv,
        Self::Json,
    ];

    /// Canonical extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Txt => "txt",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Look up a kind by extension (case-insensitive, leading dot allowed).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        Self::ALL.into_iter().find(|k| k.extension() == ext)
    }

    /// Look up a kind by MIME type, ignoring parameters such as `charset`.
    #[must_use]
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/msword" => Some(Self::Doc),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" => Some(Self::Txt),
            "application/vnd.ms-excel" => Some(Self::Xls),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(Self::Xlsx)
            }
            "text/csv" => Some(Self::Csv),
            "application/json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Size and type policy for uploads.
#[derive(Debug, Clone, Copy)]
pub struct FileValidator {
    max_size_bytes: u64,
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl FileValidator {
    /// Create a validator with the given size ceiling.
    #[must_use]
    pub const fn new(max_size_bytes: u64) -> Self {
        Self { max_size_bytes }
    }

    /// Configured size ceiling.
    #[must_use]
    pub const fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Validate an upload and return its document kind.
    ///
    /// Size is checked first so oversized files are rejected regardless of type.
    /// The extension decides the kind; the MIME type is consulted only when the
    /// name has no extension. Empty files are valid.
    ///
    /// # Errors
    /// Returns `FileTooLarge` or `UnsupportedType` validation errors.
    pub fn validate(&self, file: &UploadedFile) -> Result<DocumentKind> {
        if file.size_bytes > self.max_size_bytes {
            return Err(AppError::validation(
                ValidationKind::FileTooLarge,
                format!(
                    "{} is {} bytes; the limit is {} bytes",
                    file.original_name, file.size_bytes, self.max_size_bytes
                ),
            ));
        }

        let kind = match file.extension() {
            Some(ext) => DocumentKind::from_extension(&ext),
            None => DocumentKind::from_mime(&file.mime_type),
        };

        kind.ok_or_else(|| {
            AppError::validation(
                ValidationKind::UnsupportedType,
                format!(
                    "Invalid file type for {}. Allowed: {}",
                    file.original_name,
                    allowed_list()
                ),
            )
        })
    }
}

/// Human-readable allow-list.
fn allowed_list() -> String {
    DocumentKind::ALL
        .iter()
        .map(|k| k.extension().to_uppercase())
        .collect::<Vec<_>>()
        .join(", ")
}
