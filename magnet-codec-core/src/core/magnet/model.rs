use std::fmt;
use std::fmt::{Display, Formatter};
use std::mem;

use itertools::Itertools;

use crate::core::magnet::{
    ACCEPTABLE_SOURCE, ADDRESS_TRACKER, DISPLAY_NAME, EXACT_LENGTH, EXACT_SOURCE, EXACT_TOPIC,
    FILE_INDEX, KEYWORD_TOPIC, PEER_ADDRESS, SELECT_ONLY, WEB_SEED,
};

/// A single interpreted value of a magnet query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A textual value, e.g. `dn`, `tr` or an unrecognized parameter.
    Text(String),
    /// A numeric value, e.g. `ix`.
    Number(u64),
    /// The `+` separated keywords of a `kt` parameter.
    Keywords(Vec<String>),
    /// The file indexes of a `so` parameter.
    Indices(Vec<u64>),
}

impl Value {
    /// Get the text of this value, if it's a [Value::Text].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(e) => Some(e.as_str()),
            _ => None,
        }
    }

    /// Get the value as a list of words.
    /// Text and numbers are returned as a single word.
    pub fn words(&self) -> Vec<String> {
        match self {
            Value::Keywords(e) => e.clone(),
            Value::Indices(e) => e.iter().map(|e| e.to_string()).collect(),
            Value::Text(e) => vec![e.clone()],
            Value::Number(e) => vec![e.to_string()],
        }
    }

    /// Get the value as a list of indexes.
    /// Values which can't be represented as an index result in an empty list.
    pub fn indices(&self) -> Vec<u64> {
        match self {
            Value::Indices(e) => e.clone(),
            Value::Number(e) => vec![*e],
            Value::Text(e) => e.parse::<u64>().map(|e| vec![e]).unwrap_or_default(),
            Value::Keywords(_) => Vec::new(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(e) => write!(f, "{}", e),
            Value::Number(e) => write!(f, "{}", e),
            Value::Keywords(e) => write!(f, "{}", e.join(",")),
            Value::Indices(e) => write!(f, "{}", e.iter().join(",")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Value::Number(value)
    }
}

/// The value of a magnet query parameter.
/// A parameter which occurred once holds a single value, a repeated parameter holds all its values.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    One(Value),
    Many(Vec<Value>),
}

impl Param {
    /// Create a parameter of the given texts.
    pub fn texts<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Param::Many(values.into_iter().map(|e| Value::Text(e.into())).collect())
    }

    /// Add another occurrence of the parameter.
    /// A single value becomes a list of both values, a list is appended.
    pub fn push(&mut self, value: Value) {
        *self = match mem::replace(self, Param::Many(Vec::new())) {
            Param::One(first) => Param::Many(vec![first, value]),
            Param::Many(mut values) => {
                values.push(value);
                Param::Many(values)
            }
        };
    }

    /// Get all values of the parameter.
    pub fn values(&self) -> &[Value] {
        match self {
            Param::One(e) => std::slice::from_ref(e),
            Param::Many(e) => e.as_slice(),
        }
    }

    /// Get the text values of the parameter.
    pub fn text_values(&self) -> Vec<&str> {
        self.values().iter().filter_map(|e| e.as_str()).collect()
    }
}

impl From<Value> for Param {
    fn from(value: Value) -> Self {
        Param::One(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::One(Value::from(value))
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::One(Value::from(value))
    }
}

/// The query parameters of a magnet URI in order of their first occurrence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Param)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the parameter of the given key.
    pub fn get(&self, key: &str) -> Option<&Param> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, param)| param)
    }

    /// Check if the given key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Set the parameter of the given key.
    /// An existing key keeps its position, a new key is added at the end.
    ///
    /// It returns the previous parameter of the key, if present.
    pub fn insert<S: Into<String>>(&mut self, key: S, param: Param) -> Option<Param> {
        let key = key.into();

        match self.position(key.as_str()) {
            Some(index) => Some(mem::replace(&mut self.entries[index].1, param)),
            None => {
                self.entries.push((key, param));
                None
            }
        }
    }

    /// Add an occurrence of the given key.
    /// The value is aggregated with the existing values of the key, if any.
    pub fn append<S: Into<String>>(&mut self, key: S, value: Value) {
        let key = key.into();

        match self.position(key.as_str()) {
            Some(index) => self.entries[index].1.push(value),
            None => self.entries.push((key, Param::One(value))),
        }
    }

    /// Remove the given key, the keys after it move up one position.
    pub fn remove(&mut self, key: &str) -> Option<Param> {
        self.position(key).map(|index| self.entries.remove(index).1)
    }

    /// Iterate over the parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.entries.iter().map(|(key, param)| (key.as_str(), param))
    }

    /// Get the keys in order.
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|(key, _)| key.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k.as_str() == key)
    }
}

impl<K: Into<String>> FromIterator<(K, Param)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, Param)>>(iter: T) -> Self {
        let mut params = Params::new();
        for (key, param) in iter {
            params.insert(key, param);
        }
        params
    }
}

/// Represents a decoded magnet URI.
///
/// The raw query parameters are kept in `params`, the remaining fields are convenience fields.
/// Decoding derives the convenience fields from the raw parameters,
/// encoding folds them back into the raw parameters with precedence over the raw values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagnetRecord {
    /// The raw query parameters in order of first occurrence.
    pub params: Params,
    /// The lowercase hex encoded v1 info hash.
    pub info_hash: Option<String>,
    pub info_hash_bytes: Option<Vec<u8>>,
    /// The lowercase hex encoded v2 info hash, without the multihash prefix.
    pub info_hash_v2: Option<String>,
    pub info_hash_v2_bytes: Option<Vec<u8>>,
    /// The lowercase hex encoded BEP46 public key.
    pub public_key: Option<String>,
    pub public_key_bytes: Option<Vec<u8>>,
    /// Alias of the `dn` parameter.
    pub name: Option<Param>,
    /// Alias of the `kt` parameter.
    pub keywords: Option<Param>,
    /// The unique trackers of the `tr` parameter, sorted.
    pub announce: Option<Vec<String>>,
    /// The unique `as` and `ws` sources, sorted.
    pub url_list: Option<Vec<String>>,
    /// The unique peers of the `x.pe` parameter, in order of first occurrence.
    pub peer_addresses: Option<Vec<String>>,
}

impl MagnetRecord {
    /// Creates a new `MagnetRecordBuilder` instance.
    pub fn builder() -> MagnetRecordBuilder {
        MagnetRecordBuilder::default()
    }

    /// Get the raw parameter of the given key.
    pub fn get(&self, key: &str) -> Option<&Param> {
        self.params.get(key)
    }

    /// Gets the 'xt' (exact topic) parameter.
    pub fn xt(&self) -> Option<&Param> {
        self.get(EXACT_TOPIC)
    }

    /// Gets the 'dn' (display name) parameter.
    pub fn dn(&self) -> Option<&Param> {
        self.get(DISPLAY_NAME)
    }

    /// Gets the 'tr' (address tracker) parameter.
    pub fn tr(&self) -> Option<&Param> {
        self.get(ADDRESS_TRACKER)
    }

    /// Gets the 'xs' (exact source) parameter.
    pub fn xs(&self) -> Option<&Param> {
        self.get(EXACT_SOURCE)
    }

    /// Gets the 'as' (acceptable source) parameter.
    pub fn as_(&self) -> Option<&Param> {
        self.get(ACCEPTABLE_SOURCE)
    }

    /// Gets the 'ws' (web seed) parameter.
    pub fn ws(&self) -> Option<&Param> {
        self.get(WEB_SEED)
    }

    /// Gets the 'kt' (keyword topic) parameter.
    pub fn kt(&self) -> Option<&Param> {
        self.get(KEYWORD_TOPIC)
    }

    /// Gets the 'so' (select only) parameter.
    pub fn so(&self) -> Option<&Param> {
        self.get(SELECT_ONLY)
    }

    /// Gets the 'ix' (file index) parameter.
    pub fn ix(&self) -> Option<&Param> {
        self.get(FILE_INDEX)
    }

    /// Gets the 'xl' (exact length) parameter.
    pub fn xl(&self) -> Option<&Param> {
        self.get(EXACT_LENGTH)
    }

    /// Gets the 'x.pe' (peer address) parameter.
    pub fn x_pe(&self) -> Option<&Param> {
        self.get(PEER_ADDRESS)
    }

    /// Get all exact topics of the magnet.
    pub fn exact_topics(&self) -> Vec<&str> {
        self.xt().map(|e| e.text_values()).unwrap_or_default()
    }

    /// Get all selected file indexes of the magnet.
    pub fn select_only(&self) -> Vec<u64> {
        self.so()
            .map(|e| e.values().iter().flat_map(|e| e.indices()).collect())
            .unwrap_or_default()
    }
}

/// A builder for constructing a [MagnetRecord].
#[derive(Debug, Clone, Default)]
pub struct MagnetRecordBuilder {
    record: MagnetRecord,
}

impl MagnetRecordBuilder {
    /// Creates a new `MagnetRecordBuilder` instance.
    pub fn builder() -> Self {
        Self::default()
    }

    /// Add an occurrence of the given raw parameter.
    /// Repeated parameters are aggregated the same way as decoding does.
    pub fn param<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.record.params.append(key, value.into());
        self
    }

    /// Add the given exact topic.
    pub fn exact_topic<S: Into<String>>(&mut self, exact_topic: S) -> &mut Self {
        self.param(EXACT_TOPIC, Value::Text(exact_topic.into()))
    }

    /// Add the given display name.
    pub fn display_name<S: Into<String>>(&mut self, display_name: S) -> &mut Self {
        self.param(DISPLAY_NAME, Value::Text(display_name.into()))
    }

    /// Add the given address tracker.
    pub fn address_tracker<S: Into<String>>(&mut self, address_tracker: S) -> &mut Self {
        self.param(ADDRESS_TRACKER, Value::Text(address_tracker.into()))
    }

    /// Add the given exact source.
    pub fn exact_source<S: Into<String>>(&mut self, exact_source: S) -> &mut Self {
        self.param(EXACT_SOURCE, Value::Text(exact_source.into()))
    }

    /// Add the given acceptable source.
    pub fn acceptable_source<S: Into<String>>(&mut self, acceptable_source: S) -> &mut Self {
        self.param(ACCEPTABLE_SOURCE, Value::Text(acceptable_source.into()))
    }

    /// Add the given web seed.
    pub fn web_seed<S: Into<String>>(&mut self, web_seed: S) -> &mut Self {
        self.param(WEB_SEED, Value::Text(web_seed.into()))
    }

    /// Add the given keyword topic.
    pub fn keyword_topic<S: Into<String>>(
        &mut self,
        keywords: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        let keywords = keywords.into_iter().map(|e| e.into()).collect();
        self.param(KEYWORD_TOPIC, Value::Keywords(keywords))
    }

    /// Add the given selected file indexes.
    pub fn select_only(&mut self, indexes: Vec<u64>) -> &mut Self {
        self.param(SELECT_ONLY, Value::Indices(indexes))
    }

    /// Add the given file index.
    pub fn file_index(&mut self, index: u64) -> &mut Self {
        self.param(FILE_INDEX, index)
    }

    /// Add the given exact length.
    pub fn exact_length<S: Into<String>>(&mut self, length: S) -> &mut Self {
        self.param(EXACT_LENGTH, Value::Text(length.into()))
    }

    /// Add the given peer address.
    pub fn peer_address<S: Into<String>>(&mut self, address: S) -> &mut Self {
        self.param(PEER_ADDRESS, Value::Text(address.into()))
    }

    /// Set the hex encoded v1 info hash.
    pub fn info_hash<S: Into<String>>(&mut self, info_hash: S) -> &mut Self {
        self.record.info_hash = Some(info_hash.into());
        self
    }

    /// Set the raw v1 info hash.
    pub fn info_hash_bytes(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.record.info_hash_bytes = Some(bytes);
        self
    }

    /// Set the hex encoded v2 info hash.
    pub fn info_hash_v2<S: Into<String>>(&mut self, info_hash: S) -> &mut Self {
        self.record.info_hash_v2 = Some(info_hash.into());
        self
    }

    /// Set the raw v2 info hash.
    pub fn info_hash_v2_bytes(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.record.info_hash_v2_bytes = Some(bytes);
        self
    }

    /// Set the hex encoded public key.
    pub fn public_key<S: Into<String>>(&mut self, public_key: S) -> &mut Self {
        self.record.public_key = Some(public_key.into());
        self
    }

    /// Set the raw public key.
    pub fn public_key_bytes(&mut self, bytes: Vec<u8>) -> &mut Self {
        self.record.public_key_bytes = Some(bytes);
        self
    }

    /// Set the name of the magnet.
    pub fn name<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.record.name = Some(Param::from(name.into()));
        self
    }

    /// Set the keywords of the magnet.
    pub fn keywords<S: Into<String>>(&mut self, keywords: impl IntoIterator<Item = S>) -> &mut Self {
        let keywords = keywords.into_iter().map(|e| e.into()).collect();
        self.record.keywords = Some(Param::One(Value::Keywords(keywords)));
        self
    }

    /// Set the trackers of the magnet.
    pub fn announce<S: Into<String>>(&mut self, trackers: impl IntoIterator<Item = S>) -> &mut Self {
        self.record.announce = Some(trackers.into_iter().map(|e| e.into()).collect());
        self
    }

    /// Set the web seeds of the magnet.
    pub fn url_list<S: Into<String>>(&mut self, urls: impl IntoIterator<Item = S>) -> &mut Self {
        self.record.url_list = Some(urls.into_iter().map(|e| e.into()).collect());
        self
    }

    /// Set the peer addresses of the magnet.
    pub fn peer_addresses<S: Into<String>>(
        &mut self,
        addresses: impl IntoIterator<Item = S>,
    ) -> &mut Self {
        self.record.peer_addresses = Some(addresses.into_iter().map(|e| e.into()).collect());
        self
    }

    /// Builds a [MagnetRecord] from the builder's configuration.
    /// The builder is reset to its initial state.
    pub fn build(&mut self) -> MagnetRecord {
        mem::take(&mut self.record)
    }
}
