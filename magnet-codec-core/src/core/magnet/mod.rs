//! Decoding and encoding of `magnet:` URIs ([BEP-9], [BEP-53]).
//!
//! A magnet URI is decoded into a [MagnetRecord] which holds the raw query parameters,
//! in the order they were given, together with the convenience fields derived from them.
//! Encoding folds the convenience fields back into the raw parameters.
//!
//! ```
//! use magnet_codec_core::core::magnet::{decode, encode};
//!
//! let record = decode("magnet:?xt=urn:btih:aad050ee1bb22e196939547b134535824dabf0ce&dn=Example+File");
//!
//! assert_eq!(Some("aad050ee1bb22e196939547b134535824dabf0ce"), record.info_hash.as_deref());
//! assert_eq!(
//!     "magnet:?xt=urn:btih:aad050ee1bb22e196939547b134535824dabf0ce&dn=Example+File",
//!     encode(&record)
//! );
//! ```
//!
//! [BEP-9]: http://bittorrent.org/beps/bep_0009.html
//! [BEP-53]: http://bittorrent.org/beps/bep_0053.html

pub use decode::*;
pub use encode::*;
pub use errors::*;
pub use model::*;

mod decode;
mod encode;
mod errors;
mod identifier;
mod model;

/// The marker after which the query parameters of a magnet URI start.
const MAGNET_PREFIX: &str = "magnet:?";

const EXACT_TOPIC: &str = "xt";
const DISPLAY_NAME: &str = "dn";
const ADDRESS_TRACKER: &str = "tr";
const EXACT_SOURCE: &str = "xs";
const ACCEPTABLE_SOURCE: &str = "as";
const WEB_SEED: &str = "ws";
const KEYWORD_TOPIC: &str = "kt";
const SELECT_ONLY: &str = "so";
const FILE_INDEX: &str = "ix";
const EXACT_LENGTH: &str = "xl";
const PEER_ADDRESS: &str = "x.pe";
