use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid PDF structure: {0}")]
    InvalidStructure(String),

    /// A structural element the file format requires is missing.
    #[error("Consistency fault: {0}")]
    ConsistencyFault(String),

    /// An extension callback declared failure at one of the hook points.
    #[error("Extension failed during {hook} write: {source}")]
    ExtensionFailure {
        hook: &'static str,
        #[source]
        source: Box<PdfError>,
    },

    #[error("Protected document: {0}")]
    ProtectedDocument(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Deferred task failed: {0}")]
    TaskFailure(String),

    #[error("Compression error: {0}")]
    CompressionError(String),

    #[error("Invalid object reference: {0} {1} R")]
    InvalidObjectReference(u32, u16),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl PdfError {
    pub(crate) fn extension(hook: &'static str, source: PdfError) -> Self {
        PdfError::ExtensionFailure {
            hook,
            source: Box::new(source),
        }
    }

    /// Whether this failure leaves the output stream unusable.
    ///
    /// Encoding failures are rejected before any byte is written, every other
    /// failure may have left a partial object behind.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PdfError::EncodingError(_))
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoError, ErrorKind};

    #[test]
    fn test_pdf_error_display() {
        let error = PdfError::ConsistencyFault("no Root".to_string());
        assert_eq!(error.to_string(), "Consistency fault: no Root");
    }

    #[test]
    fn test_extension_failure_keeps_source() {
        let error = PdfError::extension(
            "catalog",
            PdfError::TaskFailure("outline missing".to_string()),
        );
        assert_eq!(
            error.to_string(),
            "Extension failed during catalog write: Deferred task failed: outline missing"
        );

        let source = std::error::Error::source(&error).unwrap();
        assert!(source.to_string().contains("outline missing"));
    }

    #[test]
    fn test_pdf_error_from_io_error() {
        let io_error = IoError::new(ErrorKind::NotFound, "file not found");
        let pdf_error = PdfError::from(io_error);

        match pdf_error {
            PdfError::Io(ref err) => {
                assert_eq!(err.kind(), ErrorKind::NotFound);
            }
            _ => panic!("Expected IO error variant"),
        }
    }

    #[test]
    fn test_only_encoding_errors_are_recoverable() {
        assert!(!PdfError::EncodingError("é".to_string()).is_fatal());
        assert!(PdfError::ProtectedDocument("encrypted".to_string()).is_fatal());
        assert!(PdfError::ConsistencyFault("root".to_string()).is_fatal());
        assert!(PdfError::InvalidObjectReference(3, 0).is_fatal());
    }

    #[test]
    fn test_error_chain_display() {
        let errors = [
            (
                "Invalid PDF structure: corrupted header",
                PdfError::InvalidStructure("corrupted header".to_string()),
            ),
            (
                "Invalid object reference: 999 0 R",
                PdfError::InvalidObjectReference(999, 0),
            ),
            (
                "Encoding error: unsupported encoding",
                PdfError::EncodingError("unsupported encoding".to_string()),
            ),
            (
                "Protected document: copy refused",
                PdfError::ProtectedDocument("copy refused".to_string()),
            ),
            (
                "Compression error: deflate failed",
                PdfError::CompressionError("deflate failed".to_string()),
            ),
        ];

        for (expected, error) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfError>();
    }
}
