//! Compression of sorted file index lists into `so` ranges ([BEP-53]).
//!
//! A range list is a sequence of tokens where each token is either a single
//! index (`6`) or an inclusive span of indexes (`6-8`).
//!
//! [BEP-53]: http://www.bittorrent.org/beps/bep_0053.html

use log::{debug, trace};
use thiserror::Error;

/// The separator between the start and end of an index span.
const RANGE_SEPARATOR: char = '-';

/// The maximum number of indexes a range list can describe.
pub const MAX_INDEXES: usize = 1 << 20;

/// The range package specific results.
pub type Result<T> = std::result::Result<T, RangeError>;

/// The errors which can occur while parsing a range list.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RangeError {
    /// The range token is not an index or index span.
    #[error("range value \"{0}\" is invalid")]
    InvalidValue(String),
    /// The range list describes more than [MAX_INDEXES] indexes.
    #[error("range value \"{0}\" exceeds the maximum of {max} indexes", max = MAX_INDEXES)]
    TooManyIndexes(String),
}

/// Compose the given ascending indexes into range tokens.
///
/// Every run of consecutive indexes is collapsed into a `{first}-{last}` token,
/// a run of a single index is written as the index itself.
/// The indexes are not sorted nor de-duplicated, repeated values start a new run.
///
/// # Arguments
///
/// * `values` - The ascending indexes to compose.
///
/// # Returns
///
/// It returns the range tokens in the order of the runs.
pub fn compose_range(values: &[u64]) -> Vec<String> {
    let mut runs: Vec<(u64, u64)> = Vec::new();

    for &value in values {
        match runs.last_mut() {
            Some((_, last)) if last.checked_add(1) == Some(value) => *last = value,
            _ => runs.push((value, value)),
        }
    }

    runs.into_iter()
        .map(|(first, last)| {
            if first == last {
                first.to_string()
            } else {
                format!("{}{}{}", first, RANGE_SEPARATOR, last)
            }
        })
        .collect()
}

/// Parse the given range tokens into the indexes they describe.
///
/// Tokens are expanded in the given order and concatenated, overlapping tokens
/// will result in duplicate indexes.
/// A span of which the end is smaller than the start doesn't describe any index.
///
/// # Arguments
///
/// * `tokens` - The range tokens to parse.
///
/// # Returns
///
/// It returns the indexes of all tokens, or a [RangeError] when a token is invalid
/// or the tokens describe more than [MAX_INDEXES] indexes.
pub fn parse_range<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<u64>> {
    let mut indexes = Vec::new();

    for token in tokens {
        let token = token.as_ref();
        expand(&mut indexes, parse_span(token)?, token)?;
    }

    Ok(indexes)
}

/// Parse the given range tokens into the indexes they describe, skipping the invalid tokens.
/// It only fails when the valid tokens describe more than [MAX_INDEXES] indexes.
pub fn parse_range_lenient<S: AsRef<str>>(tokens: &[S]) -> Result<Vec<u64>> {
    let mut indexes = Vec::new();

    for token in tokens {
        let token = token.as_ref();
        match parse_span(token) {
            Ok(span) => expand(&mut indexes, span, token)?,
            Err(e) => debug!("Ignoring range token, {}", e),
        }
    }

    Ok(indexes)
}

fn parse_span(token: &str) -> Result<(u64, u64)> {
    match token.split_once(RANGE_SEPARATOR) {
        Some((start, end)) => Ok((parse_index(start, token)?, parse_index(end, token)?)),
        None => parse_index(token, token).map(|e| (e, e)),
    }
}

fn parse_index(value: &str, token: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| RangeError::InvalidValue(token.to_string()))
}

fn expand(indexes: &mut Vec<u64>, (start, end): (u64, u64), token: &str) -> Result<()> {
    if end < start {
        trace!("Range {} doesn't contain any index", token);
        return Ok(());
    }

    // the span holds `end - start + 1` indexes, which may not exceed the remaining capacity
    let remaining = (MAX_INDEXES - indexes.len()) as u64;
    if end - start >= remaining {
        return Err(RangeError::TooManyIndexes(token.to_string()));
    }

    indexes.extend(start..=end);
    Ok(())
}
