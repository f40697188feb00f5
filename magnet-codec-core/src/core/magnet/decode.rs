use std::str::FromStr;

use itertools::Itertools;
use log::{debug, trace, warn};
use percent_encoding::percent_decode_str;

use crate::core::magnet::identifier::{parse_exact_source, parse_exact_topic, IdentifierKind};
use crate::core::magnet::{
    MagnetError, MagnetRecord, Params, Result, Value, ACCEPTABLE_SOURCE, ADDRESS_TRACKER,
    DISPLAY_NAME, EXACT_SOURCE, EXACT_TOPIC, FILE_INDEX, KEYWORD_TOPIC, MAGNET_PREFIX,
    PEER_ADDRESS, SELECT_ONLY, WEB_SEED,
};
use crate::core::range;

/// The policy for identifiers which cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeMode {
    /// Corrupt identifiers are logged and ignored.
    Lenient,
    /// Corrupt identifiers abort the decoding.
    Strict,
}

/// Decode the given magnet URI.
///
/// Decoding never fails, invalid parameters are dropped and corrupt identifiers are ignored.
/// The `announce`, `url_list` and `peer_addresses` fields are always present.
///
/// # Arguments
///
/// * `uri` - The magnet URI, which may be prefixed by another scheme such as `stream-magnet:?`.
pub fn decode(uri: &str) -> MagnetRecord {
    // the lenient mode swallows identifier errors, the fallback only applies to future error cases
    decode_with(uri, DecodeMode::Lenient).unwrap_or_else(|e| {
        warn!("Failed to decode magnet uri, {}", e);
        empty_record()
    })
}

/// Decode the given magnet URI.
/// It returns an error when an exact topic carries a corrupt base32 info hash.
pub fn decode_strict(uri: &str) -> Result<MagnetRecord> {
    decode_with(uri, DecodeMode::Strict)
}

/// Decode the given magnet URI with the given identifier policy.
pub fn decode_with(uri: &str, mode: DecodeMode) -> Result<MagnetRecord> {
    trace!("Decoding magnet uri {}", uri);
    let query = uri
        .find(MAGNET_PREFIX)
        .map(|index| &uri[index + MAGNET_PREFIX.len()..])
        .unwrap_or_default();

    let params = parse_query(query);
    let mut record = MagnetRecord {
        params,
        ..empty_record()
    };

    if let Some(topics) = record.params.get(EXACT_TOPIC) {
        for topic in topics.text_values() {
            match handle_identifier(parse_exact_topic(topic), mode)? {
                Some(e) if e.kind == IdentifierKind::InfoHashV2 => record.info_hash_v2 = Some(e.hex),
                Some(e) => record.info_hash = Some(e.hex),
                None => {}
            }
        }
    }

    if let Some(sources) = record.params.get(EXACT_SOURCE) {
        for source in sources.text_values() {
            if let Some(e) = handle_identifier(parse_exact_source(source), mode)? {
                record.public_key = Some(e.hex);
            }
        }
    }

    record.info_hash_bytes = record.info_hash.as_ref().and_then(|e| hex::decode(e).ok());
    record.info_hash_v2_bytes = record.info_hash_v2.as_ref().and_then(|e| hex::decode(e).ok());
    record.public_key_bytes = record.public_key.as_ref().and_then(|e| hex::decode(e).ok());

    record.name = record.params.get(DISPLAY_NAME).cloned();
    record.keywords = record.params.get(KEYWORD_TOPIC).cloned();

    let announce = texts_of(&record.params, &[ADDRESS_TRACKER]);
    let url_list = texts_of(&record.params, &[ACCEPTABLE_SOURCE, WEB_SEED]);
    let peer_addresses = texts_of(&record.params, &[PEER_ADDRESS]);

    record.announce = Some(announce.into_iter().sorted().dedup().collect());
    record.url_list = Some(url_list.into_iter().sorted().dedup().collect());
    record.peer_addresses = Some(peer_addresses.into_iter().unique().collect());

    debug!(
        "Decoded magnet uri with {} parameters",
        record.params.len()
    );
    Ok(record)
}

impl FromStr for MagnetRecord {
    type Err = MagnetError;

    fn from_str(uri: &str) -> Result<Self> {
        decode_strict(uri)
    }
}

/// Create a decoded record without any parameters.
fn empty_record() -> MagnetRecord {
    MagnetRecord {
        announce: Some(Vec::new()),
        url_list: Some(Vec::new()),
        peer_addresses: Some(Vec::new()),
        ..MagnetRecord::default()
    }
}

fn handle_identifier<T>(result: Result<Option<T>>, mode: DecodeMode) -> Result<Option<T>> {
    match result {
        Err(e) if mode == DecodeMode::Lenient => {
            warn!("Ignoring magnet identifier, {}", e);
            Ok(None)
        }
        result => result,
    }
}

/// Split the given query into its parameters.
/// Parameters without a key or with more than one `=` are dropped.
fn parse_query(query: &str) -> Params {
    let mut params = Params::new();

    for token in query.split('&').filter(|e| !e.is_empty()) {
        let (key, value) = match token.split_once('=') {
            Some((key, value)) if !key.is_empty() && !value.contains('=') => (key, value),
            _ => {
                debug!("Ignoring invalid magnet parameter {}", token);
                continue;
            }
        };

        match parse_value(key, value) {
            Some(value) => params.append(key, value),
            None => debug!("Ignoring magnet parameter {} with invalid value", key),
        }
    }

    params
}

/// Interpret the raw value of the given parameter key.
/// It returns `None` when the value should be skipped.
fn parse_value(key: &str, value: &str) -> Option<Value> {
    match key {
        DISPLAY_NAME => Some(Value::Text(decode_component(value).replace('+', " "))),
        ADDRESS_TRACKER | EXACT_SOURCE | ACCEPTABLE_SOURCE | WEB_SEED => {
            Some(Value::Text(decode_component(value)))
        }
        KEYWORD_TOPIC => Some(Value::Keywords(
            decode_component(value)
                .split('+')
                .map(|e| e.to_string())
                .collect(),
        )),
        SELECT_ONLY => {
            let decoded = decode_component(value);
            let tokens = decoded.split(',').collect::<Vec<_>>();
            range::parse_range_lenient(&tokens)
                .map(Value::Indices)
                .map_err(|e| trace!("Select only {} is invalid, {}", value, e))
                .ok()
        }
        FILE_INDEX => value.parse::<u64>().map(Value::Number).ok(),
        _ => Some(Value::Text(value.to_string())),
    }
}

fn decode_component(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

fn texts_of(params: &Params, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .filter_map(|key| params.get(key))
        .flat_map(|param| param.text_values())
        .map(|e| e.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::core::magnet::Param;
    use crate::init_logger;

    use super::*;

    const LEAVES_OF_GRASS: &str = "magnet:?xt=urn:btih:d2474e86c95b19b8bcfdb92bc12c9d44667cfa36&dn=Leaves+of+Grass+by+Walt+Whitman.epub&tr=udp%3A%2F%2Ftracker.example4.com%3A80&tr=udp%3A%2F%2Ftracker.example5.com%3A80&tr=udp%3A%2F%2Ftracker.example3.com%3A6969&tr=udp%3A%2F%2Ftracker.example2.com%3A80&tr=udp%3A%2F%2Ftracker.example1.com%3A1337";

    #[test]
    fn test_decode() {
        init_logger!();
        let info_hash = "d2474e86c95b19b8bcfdb92bc12c9d44667cfa36";
        let name = Param::from("Leaves of Grass by Walt Whitman.epub");
        let expected_result = MagnetRecord {
            params: vec![
                ("xt", Param::from(format!("urn:btih:{}", info_hash))),
                ("dn", name.clone()),
                (
                    "tr",
                    Param::texts(vec![
                        "udp://tracker.example4.com:80",
                        "udp://tracker.example5.com:80",
                        "udp://tracker.example3.com:6969",
                        "udp://tracker.example2.com:80",
                        "udp://tracker.example1.com:1337",
                    ]),
                ),
            ]
            .into_iter()
            .collect(),
            info_hash: Some(info_hash.to_string()),
            info_hash_bytes: Some(hex::decode(info_hash).unwrap()),
            name: Some(name),
            announce: Some(vec![
                "udp://tracker.example1.com:1337".to_string(),
                "udp://tracker.example2.com:80".to_string(),
                "udp://tracker.example3.com:6969".to_string(),
                "udp://tracker.example4.com:80".to_string(),
                "udp://tracker.example5.com:80".to_string(),
            ]),
            url_list: Some(vec![]),
            peer_addresses: Some(vec![]),
            ..MagnetRecord::default()
        };

        let result = decode(LEAVES_OF_GRASS);

        assert_eq!(expected_result, result);
    }

    #[test]
    fn test_decode_empty_uri() {
        init_logger!();
        let expected_result = empty_record();

        assert_eq!(expected_result, decode(""));
        assert_eq!(expected_result, decode("magnet:"));
        assert_eq!(expected_result, decode("magnet:?"));
    }

    #[test]
    fn test_decode_empty_values() {
        init_logger!();
        let expected_result = MagnetRecord {
            params: vec![
                ("a", Param::from("")),
                ("b", Param::from("")),
                ("c", Param::from("")),
            ]
            .into_iter()
            .collect(),
            ..empty_record()
        };

        let result = decode("magnet:?a=&b=&c=");

        assert_eq!(expected_result, result);
    }

    #[test]
    fn test_decode_invalid_uri() {
        init_logger!();
        let expected_result = empty_record();

        assert_eq!(expected_result, decode("magnet:?xt=urn:btih:==="));
        assert_eq!(expected_result, decode("magnet:?xt"));
        assert_eq!(expected_result, decode("magnet:?xt=?dn="));
    }

    #[test]
    fn test_decode_invalid_parameters() {
        init_logger!();
        let expected_a = MagnetRecord {
            params: vec![("a", Param::from("a"))].into_iter().collect(),
            ..empty_record()
        };
        let expected_b = MagnetRecord {
            params: vec![("b", Param::from("b"))].into_iter().collect(),
            ..empty_record()
        };
        let expected_c = MagnetRecord {
            params: vec![("c", Param::from("c"))].into_iter().collect(),
            ..empty_record()
        };

        assert_eq!(expected_a, decode("magnet:?a=a&==="));
        assert_eq!(expected_b, decode("magnet:?a==&b=b"));
        assert_eq!(expected_c, decode("magnet:?a=b=&c=c&d==="));
    }

    #[test]
    fn test_decode_info_hash_hex() {
        init_logger!();
        let result = decode("magnet:?xt=urn:btih:aad050ee1bb22e196939547b134535824dabf0ce");

        assert_eq!(
            Some("aad050ee1bb22e196939547b134535824dabf0ce"),
            result.info_hash.as_deref()
        );
        assert_eq!(Some(20), result.info_hash_bytes.as_ref().map(|e| e.len()));
    }

    #[test]
    fn test_decode_info_hash_base32() {
        init_logger!();
        let result = decode("magnet:?xt=urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL6");

        assert_eq!(
            Some("f7079c66cca02ab45934b9868572060010dfc97e"),
            result.info_hash.as_deref()
        );
    }

    #[test]
    fn test_decode_info_hash_trailing_data() {
        init_logger!();
        let result =
            decode("magnet:?xt=urn:btih:aad050ee1bb22e196939547b134535824dabf0ce.torrent");
        assert_eq!(
            Some("aad050ee1bb22e196939547b134535824dabf0ce"),
            result.info_hash.as_deref()
        );
        assert_eq!(
            vec!["urn:btih:aad050ee1bb22e196939547b134535824dabf0ce.torrent"],
            result.exact_topics()
        );

        let result = decode("magnet:?xt=urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL6X");
        assert_eq!(
            Some("f7079c66cca02ab45934b9868572060010dfc97e"),
            result.info_hash.as_deref()
        );
    }

    #[test]
    fn test_decode_info_hash_invalid_base32() {
        init_logger!();
        let uri = "magnet:?xt=urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL1&dn=foo";

        let result = decode(uri);
        assert_eq!(None, result.info_hash);
        assert_eq!(None, result.info_hash_bytes);
        assert_eq!(
            vec!["urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL1"],
            result.exact_topics()
        );
        assert_eq!(Some(Param::from("foo")), result.name);

        let result = decode_strict(uri);
        assert_eq!(
            Err(MagnetError::InvalidIdentifier(
                "urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL1".to_string()
            )),
            result
        );

        let result = MagnetRecord::from_str(uri);
        assert!(result.is_err(), "expected the base32 identifier to be rejected");
    }

    #[test]
    fn test_decode_keywords() {
        init_logger!();
        let result =
            decode("magnet:?xt=urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL6&kt=joe+blow+mp3");

        assert_eq!(
            Some(Param::One(Value::Keywords(vec![
                "joe".to_string(),
                "blow".to_string(),
                "mp3".to_string()
            ]))),
            result.keywords
        );
        assert_eq!(result.keywords.as_ref(), result.kt());
    }

    #[test]
    fn test_decode_multiple_topics_and_sources() {
        init_logger!();
        let result = decode("magnet:?xt=urn:ed2k:354B15E68FB8F36D7CD88FF94116CDC1&xt=urn:tree:tiger:7N5OAMRNGMSSEUE3ORHOKWN4WWIQ5X4EBOOTLJY&xt=urn:btih:QHQXPYWMACKDWKP47RRVIV7VOURXFE5Q&xl=10826029&dn=mediawiki-1.15.1.tar.gz&tr=udp%3A%2F%2Ftracker.example4.com%3A80%2Fannounce&as=http%3A%2F%2Fdownload.wikimedia.org%2Fmediawiki%2F1.15%2Fmediawiki-1.15.1.tar.gz&xs=http%3A%2F%2Fcache.example.org%2FXRX2PEFXOOEJFRVUCX6HMZMKS5TWG4K5&xs=dchub://example.org");
        let announce = "udp://tracker.example4.com:80/announce";
        let source = "http://download.wikimedia.org/mediawiki/1.15/mediawiki-1.15.1.tar.gz";

        assert_eq!(
            Some("81e177e2cc00943b29fcfc635457f575237293b0"),
            result.info_hash.as_deref()
        );
        assert_eq!(
            vec![
                "urn:ed2k:354B15E68FB8F36D7CD88FF94116CDC1",
                "urn:tree:tiger:7N5OAMRNGMSSEUE3ORHOKWN4WWIQ5X4EBOOTLJY",
                "urn:btih:QHQXPYWMACKDWKP47RRVIV7VOURXFE5Q",
            ],
            result.exact_topics()
        );
        assert_eq!(Some(&Param::from("10826029")), result.xl());
        assert_eq!(Some(&Param::from("mediawiki-1.15.1.tar.gz")), result.dn());
        assert_eq!(Some(&Param::from(announce)), result.tr());
        assert_eq!(Some(vec![announce.to_string()]), result.announce);
        assert_eq!(Some(&Param::from(source)), result.as_());
        assert_eq!(Some(vec![source.to_string()]), result.url_list);
        assert_eq!(
            Some(&Param::texts(vec![
                "http://cache.example.org/XRX2PEFXOOEJFRVUCX6HMZMKS5TWG4K5",
                "dchub://example.org",
            ])),
            result.xs()
        );
        assert_eq!(None, result.public_key);
    }

    #[test]
    fn test_decode_url_list() {
        init_logger!();
        let result = decode("magnet:?xt=urn:ed2k:354B15E68FB8F36D7CD88FF94116CDC1&ws=http%3A%2F%2Fdownload.wikimedia.org%2Fmediawiki%2F1.15%2Fmediawiki-1.15.1.tar.gz3&as=http%3A%2F%2Fdownload.wikimedia.org%2Fmediawiki%2F1.15%2Fmediawiki-1.15.1.tar.gz&as=http%3A%2F%2Fdownload.wikimedia.org%2Fmediawiki%2F1.15%2Fmediawiki-1.15.1.tar.gz1&ws=http%3A%2F%2Fdownload.wikimedia.org%2Fmediawiki%2F1.15%2Fmediawiki-1.15.1.tar.gz2&ws=http%3A%2F%2Fdownload.wikimedia.org%2Fmediawiki%2F1.15%2Fmediawiki-1.15.1.tar.gz");

        assert_eq!(
            Some(vec![
                "http://download.wikimedia.org/mediawiki/1.15/mediawiki-1.15.1.tar.gz".to_string(),
                "http://download.wikimedia.org/mediawiki/1.15/mediawiki-1.15.1.tar.gz1".to_string(),
                "http://download.wikimedia.org/mediawiki/1.15/mediawiki-1.15.1.tar.gz2".to_string(),
                "http://download.wikimedia.org/mediawiki/1.15/mediawiki-1.15.1.tar.gz3".to_string(),
            ]),
            result.url_list
        );
    }

    #[test]
    fn test_decode_deduplicate_trackers() {
        init_logger!();
        let result = decode("magnet:?xt=urn:ed2k:354B15E68FB8F36D7CD88FF94116CDC1&tr=udp%3A%2F%2Ftracker.example4.com%3A80&tr=udp%3A%2F%2Ftracker.example4.com%3A80&tr=udp%3A%2F%2Ftracker.example5.com%3A80&tr=udp%3A%2F%2Ftracker.example3.com%3A6969&tr=udp%3A%2F%2Ftracker.example2.com%3A80&tr=udp%3A%2F%2Ftracker.example1.com%3A1337");

        assert_eq!(
            Some(vec![
                "udp://tracker.example1.com:1337".to_string(),
                "udp://tracker.example2.com:80".to_string(),
                "udp://tracker.example3.com:6969".to_string(),
                "udp://tracker.example4.com:80".to_string(),
                "udp://tracker.example5.com:80".to_string(),
            ]),
            result.announce
        );
        assert_eq!(Some(6), result.tr().map(|e| e.values().len()));
    }

    #[test]
    fn test_decode_file_index() {
        init_logger!();
        let result = decode(format!("{}&ix=1", LEAVES_OF_GRASS).as_str());
        assert_eq!(Some(&Param::One(Value::Number(1))), result.ix());

        let result = decode(format!("{}&ix=foo", LEAVES_OF_GRASS).as_str());
        assert_eq!(None, result.ix());
    }

    #[test]
    fn test_decode_v2() {
        init_logger!();
        let result = decode("magnet:?xt=urn:btmh:1220caf1e1c30e81cb361b9ee167c4aa64228a7fa4fa9f6105232b28ad099f3a302e&dn=bittorrent-v2-test");

        assert_eq!(
            Some(&Param::from(
                "urn:btmh:1220caf1e1c30e81cb361b9ee167c4aa64228a7fa4fa9f6105232b28ad099f3a302e"
            )),
            result.xt()
        );
        assert_eq!(
            Some("caf1e1c30e81cb361b9ee167c4aa64228a7fa4fa9f6105232b28ad099f3a302e"),
            result.info_hash_v2.as_deref()
        );
        assert_eq!(Some(32), result.info_hash_v2_bytes.as_ref().map(|e| e.len()));
        assert_eq!(None, result.info_hash);
    }

    #[test]
    fn test_decode_hybrid() {
        init_logger!();
        let result = decode("magnet:?xt=urn:btih:631a31dd0a46257d5078c0dee4e66e26f73e42ac&xt=urn:btmh:1220d8dd32ac93357c368556af3ac1d95c9d76bd0dff6fa9833ecdac3d53134efabb&dn=bittorrent-v1-v2-hybrid-test");

        assert_eq!(
            vec![
                "urn:btih:631a31dd0a46257d5078c0dee4e66e26f73e42ac",
                "urn:btmh:1220d8dd32ac93357c368556af3ac1d95c9d76bd0dff6fa9833ecdac3d53134efabb",
            ],
            result.exact_topics()
        );
        assert_eq!(
            Some("631a31dd0a46257d5078c0dee4e66e26f73e42ac"),
            result.info_hash.as_deref()
        );
        assert_eq!(
            Some("d8dd32ac93357c368556af3ac1d95c9d76bd0dff6fa9833ecdac3d53134efabb"),
            result.info_hash_v2.as_deref()
        );
        assert_eq!(
            Some(&Param::from("bittorrent-v1-v2-hybrid-test")),
            result.dn()
        );
    }

    #[test]
    fn test_decode_last_info_hash_wins() {
        init_logger!();
        let result = decode("magnet:?xt=urn:btih:631a31dd0a46257d5078c0dee4e66e26f73e42ac&xt=urn:btih:AAD050EE1BB22E196939547B134535824DABF0CE");

        assert_eq!(
            Some("aad050ee1bb22e196939547b134535824dabf0ce"),
            result.info_hash.as_deref()
        );
    }

    #[test]
    fn test_decode_public_key() {
        init_logger!();
        let key = "9a36edf0988ddc1a0fc02d4e8652cce87a71aaac71fce936e650a597c0fb72e0";

        let result = decode(format!("magnet:?xs=urn:btpk:{}", key).as_str());

        assert_eq!(Some(key), result.public_key.as_deref());
        assert_eq!(hex::decode(key).ok(), result.public_key_bytes);
    }

    #[test]
    fn test_decode_select_only() {
        init_logger!();
        let result =
            decode("magnet:?xt=urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL6&so=0,2,4,6-8");

        assert_eq!(
            Some(&Param::One(Value::Indices(vec![0, 2, 4, 6, 7, 8]))),
            result.so()
        );
        assert_eq!(vec![0, 2, 4, 6, 7, 8], result.select_only());
    }

    #[test]
    fn test_decode_select_only_invalid() {
        init_logger!();
        let result = decode("magnet:?xt=urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL6&so=0,a-2");

        assert_eq!(Some(&Param::One(Value::Indices(vec![0]))), result.so());
    }

    #[test]
    fn test_decode_select_only_too_many_indexes() {
        init_logger!();
        let result = decode("magnet:?so=0-20000000&dn=foo");
        assert_eq!(None, result.so());
        assert_eq!(Vec::<u64>::new(), result.select_only());
        assert_eq!(Some(Param::from("foo")), result.name);

        let result = decode("magnet:?so=0-18446744073709551615");
        assert_eq!(None, result.so());
    }

    #[test]
    fn test_decode_peer_address() {
        init_logger!();
        let result = decode(
            "magnet:?xt=urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL6&x.pe=123.213.32.10:47450",
        );

        assert_eq!(Some(&Param::from("123.213.32.10:47450")), result.x_pe());
        assert_eq!(
            Some(vec!["123.213.32.10:47450".to_string()]),
            result.peer_addresses
        );
    }

    #[test]
    fn test_decode_peer_addresses() {
        init_logger!();
        let result = decode("magnet:?xt=urn:btih:64DZYZWMUAVLIWJUXGDIK4QGAAIN7SL6&x.pe=123.213.32.10:47450&x.pe=[2001:db8::2]:55013&x.pe=123.213.32.10:47450");

        assert_eq!(
            Some(&Param::texts(vec![
                "123.213.32.10:47450",
                "[2001:db8::2]:55013",
                "123.213.32.10:47450",
            ])),
            result.x_pe()
        );
        assert_eq!(
            Some(vec![
                "123.213.32.10:47450".to_string(),
                "[2001:db8::2]:55013".to_string(),
            ]),
            result.peer_addresses
        );
    }

    #[test]
    fn test_decode_prefixed_scheme() {
        init_logger!();
        let result =
            decode("stream-magnet:?xt=urn:btih:aad050ee1bb22e196939547b134535824dabf0ce");

        assert_eq!(
            Some("aad050ee1bb22e196939547b134535824dabf0ce"),
            result.info_hash.as_deref()
        );
    }
}
