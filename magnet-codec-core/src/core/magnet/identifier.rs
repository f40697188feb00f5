use base32::Alphabet;
use log::trace;

use crate::core::magnet::{MagnetError, Result};

pub(crate) const V1_TOPIC_PREFIX: &str = "urn:btih:";
pub(crate) const V2_TOPIC_PREFIX: &str = "urn:btmh:1220";
pub(crate) const PUBLIC_KEY_PREFIX: &str = "urn:btpk:";

const V1_HEX_LEN: usize = 40;
const V1_BASE32_LEN: usize = 32;
const V2_HEX_LEN: usize = 64;
const PUBLIC_KEY_HEX_LEN: usize = 64;

/// The encoding of the identifier within a URN.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Encoding {
    Hex,
    Base32,
}

/// The kind of identifier a URN carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum IdentifierKind {
    InfoHashV1,
    InfoHashV2,
    PublicKey,
}

/// An identifier extracted from an exact topic or exact source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Identifier {
    pub kind: IdentifierKind,
    /// The lowercase hex value of the identifier.
    pub hex: String,
}

struct Pattern {
    prefix: &'static str,
    len: usize,
    encoding: Encoding,
    kind: IdentifierKind,
}

/// The exact topic patterns, in the order they're tried.
/// The 40 character hex form must precede the 32 character base32 form as both share the same prefix.
const TOPIC_PATTERNS: [Pattern; 3] = [
    Pattern {
        prefix: V1_TOPIC_PREFIX,
        len: V1_HEX_LEN,
        encoding: Encoding::Hex,
        kind: IdentifierKind::InfoHashV1,
    },
    Pattern {
        prefix: V1_TOPIC_PREFIX,
        len: V1_BASE32_LEN,
        encoding: Encoding::Base32,
        kind: IdentifierKind::InfoHashV1,
    },
    Pattern {
        prefix: V2_TOPIC_PREFIX,
        len: V2_HEX_LEN,
        encoding: Encoding::Hex,
        kind: IdentifierKind::InfoHashV2,
    },
];

/// The exact source patterns, in the order they're tried.
const SOURCE_PATTERNS: [Pattern; 1] = [Pattern {
    prefix: PUBLIC_KEY_PREFIX,
    len: PUBLIC_KEY_HEX_LEN,
    encoding: Encoding::Hex,
    kind: IdentifierKind::PublicKey,
}];

/// Extract the info hash identifier of the given exact topic.
///
/// It returns `None` when the topic doesn't carry a known identifier,
/// or an error when the identifier is corrupt.
pub(crate) fn parse_exact_topic(topic: &str) -> Result<Option<Identifier>> {
    parse(topic, &TOPIC_PATTERNS)
}

/// Extract the public key identifier of the given exact source.
pub(crate) fn parse_exact_source(source: &str) -> Result<Option<Identifier>> {
    parse(source, &SOURCE_PATTERNS)
}

/// Try the given patterns in order, the first pattern of which the prefix matches and
/// the minimum length is met decides the identifier.
/// Only the leading `len` characters after the prefix are used, trailing data is ignored.
fn parse(urn: &str, patterns: &[Pattern]) -> Result<Option<Identifier>> {
    let Some((pattern, remainder)) = patterns.iter().find_map(|pattern| {
        urn.strip_prefix(pattern.prefix)
            .filter(|e| e.len() >= pattern.len)
            .map(|e| (pattern, e))
    }) else {
        return Ok(None);
    };
    let value = remainder.get(..pattern.len);

    match pattern.encoding {
        Encoding::Hex => match value.filter(|e| e.bytes().all(|e| e.is_ascii_hexdigit())) {
            Some(value) => {
                trace!("Parsed {:?} from hex urn {}", pattern.kind, urn);
                Ok(Some(Identifier {
                    kind: pattern.kind,
                    hex: value.to_ascii_lowercase(),
                }))
            }
            None => {
                trace!("Urn {} doesn't contain a hex identifier", urn);
                Ok(None)
            }
        },
        Encoding::Base32 => {
            let bytes = value
                .and_then(|e| base32::decode(Alphabet::Rfc4648 { padding: false }, e))
                .ok_or_else(|| MagnetError::InvalidIdentifier(urn.to_string()))?;
            trace!("Parsed {:?} from base32 urn {}", pattern.kind, urn);
            Ok(Some(Identifier {
                kind: pattern.kind,
                hex: hex::encode(bytes),
            }))
        }
    }
}
