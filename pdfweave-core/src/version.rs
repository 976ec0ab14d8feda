//! PDF format versions

use crate::error::{PdfError, Result};
use std::fmt;
use std::str::FromStr;

/// Format version written to the header and compared when updating a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum PdfVersion {
    V1_0,
    V1_1,
    V1_2,
    V1_3,
    V1_4,
    V1_5,
    V1_6,
    #[default]
    V1_7,
    V2_0,
}

impl PdfVersion {
    pub const ALL: [PdfVersion; 9] = [
        PdfVersion::V1_0,
        PdfVersion::V1_1,
        PdfVersion::V1_2,
        PdfVersion::V1_3,
        PdfVersion::V1_4,
        PdfVersion::V1_5,
        PdfVersion::V1_6,
        PdfVersion::V1_7,
        PdfVersion::V2_0,
    ];

    pub fn major(self) -> u8 {
        match self {
            PdfVersion::V2_0 => 2,
            _ => 1,
        }
    }

    pub fn minor(self) -> u8 {
        match self {
            PdfVersion::V2_0 => 0,
            other => other as u8,
        }
    }

    /// Value of the catalog `Version` name, e.g. `1.4`.
    pub fn as_name(self) -> String {
        self.to_string()
    }

    /// Header comment body without the leading `%`, e.g. `PDF-1.4`.
    pub fn header_comment(self) -> String {
        format!("PDF-{self}")
    }

    /// Whether cross-reference streams exist in this version.
    pub fn supports_xref_streams(self) -> bool {
        self >= PdfVersion::V1_5
    }
}

impl fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl FromStr for PdfVersion {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .and_then(|(major, minor)| {
                Some((major.parse::<u8>().ok()?, minor.parse::<u8>().ok()?))
            })
            .ok_or_else(|| PdfError::ParseError(format!("unrecognized PDF version '{s}'")))?;
        PdfVersion::ALL
            .into_iter()
            .find(|version| version.major() == major && version.minor() == minor)
            .ok_or_else(|| PdfError::ParseError(format!("unsupported PDF version '{s}'")))
    }
}
