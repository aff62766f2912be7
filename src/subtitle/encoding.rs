use std::fmt;

use encoding_rs::{Encoding, UTF_8};
use tracing::debug;

use crate::error::{Result, SubtransError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Default candidate order used when decoding subtitle files.
pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "utf-8-bom", "windows-1252", "iso-8859-2"];

/// One entry of the ordered candidate list tried when decoding input bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Strict UTF-8; refuses input that starts with a byte-order mark.
    Utf8,
    /// UTF-8 that must start with a byte-order mark, which is stripped.
    Utf8Bom,
    /// Any other WHATWG encoding, typically a single-byte code page.
    Legacy(&'static Encoding),
}

impl TextEncoding {
    pub fn from_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_lowercase();
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-8-bom" | "utf-8-sig" | "utf8-bom" => Ok(Self::Utf8Bom),
            _ => match Encoding::for_label(normalized.as_bytes()) {
                Some(enc) if enc == UTF_8 => Ok(Self::Utf8),
                Some(enc) => Ok(Self::Legacy(enc)),
                None => Err(SubtransError::UnknownEncoding(label.to_string())),
            },
        }
    }

    /// Decode `bytes`, returning `None` if they are not valid in this encoding.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf8 => {
                if bytes.starts_with(UTF8_BOM) {
                    return None;
                }
                UTF_8
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(|text| text.into_owned())
            }
            Self::Utf8Bom => {
                let rest = bytes.strip_prefix(UTF8_BOM)?;
                UTF_8
                    .decode_without_bom_handling_and_without_replacement(rest)
                    .map(|text| text.into_owned())
            }
            Self::Legacy(enc) => {
                let text = enc.decode_without_bom_handling_and_without_replacement(bytes)?;
                // WHATWG maps bytes a code page leaves undefined onto C1 controls.
                if text.chars().any(|c| ('\u{80}'..='\u{9f}').contains(&c)) {
                    return None;
                }
                Some(text.into_owned())
            }
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => f.write_str("utf-8"),
            Self::Utf8Bom => f.write_str("utf-8-bom"),
            Self::Legacy(enc) => f.write_str(&enc.name().to_lowercase()),
        }
    }
}

/// Resolve a list of encoding labels into decoding candidates.
pub fn resolve_labels<S: AsRef<str>>(labels: &[S]) -> Result<Vec<TextEncoding>> {
    labels.iter().map(|l| TextEncoding::from_label(l.as_ref())).collect()
}

pub fn default_candidates() -> Vec<TextEncoding> {
    vec![
        TextEncoding::Utf8,
        TextEncoding::Utf8Bom,
        TextEncoding::Legacy(encoding_rs::WINDOWS_1252),
        TextEncoding::Legacy(encoding_rs::ISO_8859_2),
    ]
}

/// Try each candidate in order and return the first successful decoding
/// together with the encoding that produced it.
pub fn decode_with_candidates(
    bytes: &[u8],
    candidates: &[TextEncoding],
    source: &str,
) -> Result<(String, TextEncoding)> {
    for candidate in candidates {
        if let Some(text) = candidate.decode(bytes) {
            debug!("Decoded {} as {}", source, candidate);
            return Ok((text, *candidate));
        }
        debug!("{} is not valid {}", source, candidate);
    }

    Err(SubtransError::Decode {
        path: source.to_string(),
        tried: candidates
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_labels_match_default_candidates() {
        let resolved = resolve_labels(DEFAULT_ENCODINGS).unwrap();
        assert_eq!(resolved, default_candidates());
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        assert!(matches!(
            TextEncoding::from_label("klingon-8"),
            Err(SubtransError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_plain_utf8_wins_first() {
        let (text, used) =
            decode_with_candidates("héllo".as_bytes(), &default_candidates(), "test").unwrap();
        assert_eq!(text, "héllo");
        assert_eq!(used, TextEncoding::Utf8);
    }

    #[test]
    fn test_bom_is_stripped_by_bom_candidate() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"1\n00:00:00,000 --> 00:00:01,000\nHi\n");
        let (text, used) = decode_with_candidates(&bytes, &default_candidates(), "test").unwrap();
        assert!(text.starts_with('1'));
        assert_eq!(used, TextEncoding::Utf8Bom);
    }

    #[test]
    fn test_falls_back_to_windows_1252() {
        // "café" in windows-1252
        let bytes = b"caf\xE9";
        let (text, used) = decode_with_candidates(bytes, &default_candidates(), "test").unwrap();
        assert_eq!(text, "café");
        assert_eq!(used, TextEncoding::Legacy(encoding_rs::WINDOWS_1252));
    }

    #[test]
    fn test_undefined_bytes_fail_every_candidate() {
        let bytes = b"1\n\x81\x8D\n";
        let err = decode_with_candidates(bytes, &default_candidates(), "broken.srt").unwrap_err();
        match err {
            SubtransError::Decode { path, tried } => {
                assert_eq!(path, "broken.srt");
                assert!(tried.contains("windows-1252"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_input_decodes() {
        let (text, _) = decode_with_candidates(b"", &default_candidates(), "empty").unwrap();
        assert!(text.is_empty());
    }
}
