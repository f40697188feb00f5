use std::fmt;
use std::fmt::{Display, Formatter};

use itertools::Itertools;
use log::trace;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::core::magnet::identifier::{PUBLIC_KEY_PREFIX, V1_TOPIC_PREFIX, V2_TOPIC_PREFIX};
use crate::core::magnet::{
    MagnetRecord, Param, Params, Value, ACCEPTABLE_SOURCE, ADDRESS_TRACKER, DISPLAY_NAME,
    EXACT_SOURCE, EXACT_TOPIC, KEYWORD_TOPIC, MAGNET_PREFIX, PEER_ADDRESS, SELECT_ONLY, WEB_SEED,
};
use crate::core::range;

/// The characters which are escaped within a URI component.
const URI_COMPONENT_RESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encode the given record into a magnet URI.
///
/// The convenience fields of the record take precedence over the raw parameters they're derived from,
/// see [fold_record] for the exact rules.
/// Only parameters with a two character key and `x.pe` are written, in the order of the record parameters.
pub fn encode(record: &MagnetRecord) -> String {
    let params = fold_record(record);
    let mut uri = String::from(MAGNET_PREFIX);
    let mut first = true;
    let mut write_pair = |key: &str, value: &str| {
        if !first {
            uri.push('&');
        }
        first = false;
        uri.push_str(key);
        uri.push('=');
        uri.push_str(value);
    };

    for (key, param) in params.iter() {
        if key.chars().count() != 2 && key != PEER_ADDRESS {
            continue;
        }

        match key {
            SELECT_ONLY => {
                let indexes = param
                    .values()
                    .iter()
                    .flat_map(|e| e.indices())
                    .collect::<Vec<_>>();
                write_pair(key, range::compose_range(&indexes).join(",").as_str());
            }
            KEYWORD_TOPIC => {
                let keywords = param
                    .values()
                    .iter()
                    .flat_map(|e| e.words())
                    .map(|e| encode_component(&e))
                    .collect::<Vec<_>>();
                if !keywords.is_empty() {
                    write_pair(key, keywords.join("+").as_str());
                }
            }
            _ => {
                for value in param.values() {
                    write_pair(key, encode_value(key, value).as_str());
                }
            }
        }
    }

    trace!("Encoded magnet uri {}", uri);
    uri
}

/// Fold the convenience fields of the given record into a copy of its raw parameters.
///
/// The `xt` parameter is resolved with the following priority, from low to high:
/// 1. the raw `xt` values
/// 2. the topics of `info_hash_bytes`, `info_hash`, `info_hash_v2_bytes` and `info_hash_v2`,
///    added in that order to the unique raw values
/// 3. `info_hash`, which replaces all topics with its single v1 topic
///
/// The `xs` parameter is replaced by `public_key_bytes`, which is replaced by `public_key`.
/// `name`, `keywords`, `announce`, `url_list` and `peer_addresses` replace
/// `dn`, `kt`, `tr`, `ws` and `x.pe` respectively, `url_list` also removes `as`.
pub fn fold_record(record: &MagnetRecord) -> Params {
    let mut params = record.params.clone();

    let topics = params
        .get(EXACT_TOPIC)
        .map(|e| e.values().iter().map(|e| e.to_string()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .chain(
            [
                record
                    .info_hash_bytes
                    .as_ref()
                    .map(|e| format!("{}{}", V1_TOPIC_PREFIX, hex::encode(e))),
                record
                    .info_hash
                    .as_ref()
                    .map(|e| format!("{}{}", V1_TOPIC_PREFIX, e)),
                record
                    .info_hash_v2_bytes
                    .as_ref()
                    .map(|e| format!("{}{}", V2_TOPIC_PREFIX, hex::encode(e))),
                record
                    .info_hash_v2
                    .as_ref()
                    .map(|e| format!("{}{}", V2_TOPIC_PREFIX, e)),
            ]
            .into_iter()
            .flatten(),
        )
        .unique()
        .collect::<Vec<_>>();

    if topics.len() == 1 {
        params.insert(EXACT_TOPIC, Param::from(topics[0].as_str()));
    } else if topics.len() > 1 {
        params.insert(EXACT_TOPIC, Param::texts(topics));
    }
    if let Some(info_hash) = record.info_hash.as_ref() {
        params.insert(
            EXACT_TOPIC,
            Param::from(format!("{}{}", V1_TOPIC_PREFIX, info_hash)),
        );
    }

    if let Some(bytes) = record.public_key_bytes.as_ref() {
        params.insert(
            EXACT_SOURCE,
            Param::from(format!("{}{}", PUBLIC_KEY_PREFIX, hex::encode(bytes))),
        );
    }
    if let Some(public_key) = record.public_key.as_ref() {
        params.insert(
            EXACT_SOURCE,
            Param::from(format!("{}{}", PUBLIC_KEY_PREFIX, public_key)),
        );
    }

    if let Some(name) = record.name.as_ref() {
        params.insert(DISPLAY_NAME, name.clone());
    }
    if let Some(keywords) = record.keywords.as_ref() {
        params.insert(KEYWORD_TOPIC, keywords.clone());
    }
    if let Some(announce) = record.announce.as_ref() {
        params.insert(ADDRESS_TRACKER, Param::texts(announce.clone()));
    }
    if let Some(url_list) = record.url_list.as_ref() {
        params.insert(WEB_SEED, Param::texts(url_list.clone()));
        params.remove(ACCEPTABLE_SOURCE);
    }
    if let Some(peer_addresses) = record.peer_addresses.as_ref() {
        params.insert(PEER_ADDRESS, Param::texts(peer_addresses.clone()));
    }

    params
}

impl Display for MagnetRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", encode(self))
    }
}

fn encode_value(key: &str, value: &Value) -> String {
    let value = value.to_string();

    match key {
        DISPLAY_NAME => encode_component(&value).replace("%20", "+"),
        ADDRESS_TRACKER | ACCEPTABLE_SOURCE | WEB_SEED => encode_component(&value),
        EXACT_SOURCE if !value.starts_with(PUBLIC_KEY_PREFIX) => encode_component(&value),
        _ => value,
    }
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT_RESERVED).to_string()
}
