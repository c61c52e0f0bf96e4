use std::fmt;
use std::io;

use thiserror::Error;

/// Stable numeric codes returned at the public boundary.
///
/// The discriminants are part of the external contract and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    Unspecified = -1,
    FileUnsupported = -2,
    NoSuchImage = -3,
    OutOfOrderCall = -4,
    NoThumbnail = -5,
    UnsupportedThumbnail = -6,
    OutOfMemory = -100007,
    DataError = -100008,
    IoError = -100009,
    CancelledByCallback = -100010,
    BadCrop = -100011,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Looks a code up by its numeric value. Unknown values map to `Unspecified`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Success,
            -2 => Self::FileUnsupported,
            -3 => Self::NoSuchImage,
            -4 => Self::OutOfOrderCall,
            -5 => Self::NoThumbnail,
            -6 => Self::UnsupportedThumbnail,
            -100007 => Self::OutOfMemory,
            -100008 => Self::DataError,
            -100009 => Self::IoError,
            -100010 => Self::CancelledByCallback,
            -100011 => Self::BadCrop,
            _ => Self::Unspecified,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Success => "No error",
            Self::Unspecified => "Unspecified error",
            Self::FileUnsupported => "Unsupported file format or not RAW file",
            Self::NoSuchImage => "Request for nonexisting image number",
            Self::OutOfOrderCall => "Out of order call of processing function",
            Self::NoThumbnail => "No thumbnail in file",
            Self::UnsupportedThumbnail => "Unsupported thumbnail format",
            Self::OutOfMemory => "Unsufficient memory",
            Self::DataError => "Corrupted data or unexpected EOF",
            Self::IoError => "Input/output error",
            Self::CancelledByCallback => "Cancelled by user callback",
            Self::BadCrop => "Bad crop box",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Internal failure kinds raised by decoders and pipeline stages.
///
/// This set is closed: every kind maps to exactly one [`ErrorCode`] through
/// `From<Fault> for ProcessingError`.
#[derive(Error, Debug)]
pub enum Fault {
    #[error("allocation failed: {0}")]
    Alloc(String),

    #[error("corrupted raw data: {0}")]
    DecodeRaw(String),

    #[error("corrupted JPEG stream: {0}")]
    DecodeJpeg(String),

    #[error("corrupted JPEG 2000 stream: {0}")]
    DecodeJpeg2000(String),

    #[error("unexpected end of stream: {0}")]
    IoEof(String),

    #[error("stream error: {0}")]
    IoCorrupt(String),

    #[error("cancelled by progress callback")]
    CancelledByCallback,

    #[error("bad crop box")]
    BadCrop,
}

impl From<io::Error> for Fault {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Fault::IoEof(err.to_string()),
            _ => Fault::IoCorrupt(err.to_string()),
        }
    }
}

impl From<std::collections::TryReserveError> for Fault {
    fn from(err: std::collections::TryReserveError) -> Self {
        Fault::Alloc(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Unspecified error: {0}")]
    Unspecified(String),

    #[error("Unsupported file format or not RAW file")]
    FileUnsupported,

    #[error("Request for nonexisting image number {requested} (file has {available})")]
    NoSuchImage { requested: u32, available: u32 },

    #[error("Out of order call: {0}")]
    OutOfOrderCall(String),

    #[error("No thumbnail in file")]
    NoThumbnail,

    #[error("Unsupported thumbnail format")]
    UnsupportedThumbnail,

    #[error("Unsufficient memory: {0}")]
    OutOfMemory(String),

    #[error("Corrupted data or unexpected EOF: {0}")]
    DataError(String),

    #[error("Input/output error: {0}")]
    IoError(String),

    #[error("Cancelled by user callback")]
    CancelledByCallback,

    #[error("Bad crop box")]
    BadCrop,
}

impl ProcessingError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unspecified(_) => ErrorCode::Unspecified,
            Self::FileUnsupported => ErrorCode::FileUnsupported,
            Self::NoSuchImage { .. } => ErrorCode::NoSuchImage,
            Self::OutOfOrderCall(_) => ErrorCode::OutOfOrderCall,
            Self::NoThumbnail => ErrorCode::NoThumbnail,
            Self::UnsupportedThumbnail => ErrorCode::UnsupportedThumbnail,
            Self::OutOfMemory(_) => ErrorCode::OutOfMemory,
            Self::DataError(_) => ErrorCode::DataError,
            Self::IoError(_) => ErrorCode::IoError,
            Self::CancelledByCallback => ErrorCode::CancelledByCallback,
            Self::BadCrop => ErrorCode::BadCrop,
        }
    }
}

impl From<Fault> for ProcessingError {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Alloc(msg) => Self::OutOfMemory(msg),
            Fault::DecodeRaw(msg) | Fault::DecodeJpeg(msg) | Fault::DecodeJpeg2000(msg) => {
                Self::DataError(msg)
            }
            Fault::IoEof(msg) | Fault::IoCorrupt(msg) => Self::IoError(msg),
            Fault::CancelledByCallback => Self::CancelledByCallback,
            Fault::BadCrop => Self::BadCrop,
        }
    }
}

impl From<io::Error> for ProcessingError {
    fn from(err: io::Error) -> Self {
        Self::from(Fault::from(err))
    }
}

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_mapping_is_one_to_one() {
        let cases = [
            (Fault::Alloc("x".into()), ErrorCode::OutOfMemory),
            (Fault::DecodeRaw("x".into()), ErrorCode::DataError),
            (Fault::DecodeJpeg("x".into()), ErrorCode::DataError),
            (Fault::DecodeJpeg2000("x".into()), ErrorCode::DataError),
            (Fault::IoEof("x".into()), ErrorCode::IoError),
            (Fault::IoCorrupt("x".into()), ErrorCode::IoError),
            (Fault::CancelledByCallback, ErrorCode::CancelledByCallback),
            (Fault::BadCrop, ErrorCode::BadCrop),
        ];
        for (fault, code) in cases {
            assert_eq!(ProcessingError::from(fault).code(), code);
        }
    }

    #[test]
    fn test_io_error_kinds() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "short read");
        assert!(matches!(Fault::from(eof), Fault::IoEof(_)));

        let other = io::Error::other("disk on fire");
        assert!(matches!(Fault::from(other), Fault::IoCorrupt(_)));
    }

    #[test]
    fn test_error_code_values_are_stable() {
        assert_eq!(ErrorCode::Success.as_i32(), 0);
        assert_eq!(ErrorCode::OutOfOrderCall.as_i32(), -4);
        assert_eq!(ErrorCode::BadCrop.as_i32(), -100011);
        assert_eq!(ErrorCode::from_i32(-100010), ErrorCode::CancelledByCallback);
        assert_eq!(ErrorCode::from_i32(42), ErrorCode::Unspecified);
        assert_eq!(ErrorCode::OutOfMemory.to_string(), "Unsufficient memory");
    }
}
