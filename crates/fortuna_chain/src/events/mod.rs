//! # Fulfillment Events
//!
//! The coordinator announces randomness with
//!
//! ```text
//! event RandomWordsFulfilled(uint256 indexed requestId, uint256[] randomWords)
//!
//! topics[0] = keccak256(signature)
//! topics[1] = requestId
//! data      = offset(32) | length(32) | word_0(32) | word_1(32) | ...
//! ```
//!
//! Parsing reads straight from the log bytes; the only allocation is the
//! word vector.

use std::sync::OnceLock;

use alloy_primitives::{keccak256, Address, U256};

use crate::error::{ChainError, ChainResult};

/// Solidity signature of the fulfillment event.
pub const FULFILLMENT_SIGNATURE: &str = "RandomWordsFulfilled(uint256,uint256[])";

/// ABI word size.
const WORD: usize = 32;

/// `topics[0]` of every fulfillment log.
#[must_use]
pub fn fulfillment_topic() -> [u8; 32] {
    static TOPIC: OnceLock<[u8; 32]> = OnceLock::new();
    *TOPIC.get_or_init(|| keccak256(FULFILLMENT_SIGNATURE.as_bytes()).0)
}

/// A log as delivered by the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<[u8; 32]>,
    /// Non-indexed data.
    pub data: Vec<u8>,
    /// Block number where this occurred.
    pub block_number: u64,
    /// Log index within block.
    pub log_index: u32,
}

/// Randomness delivered for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FulfillmentEvent {
    /// Request the words answer.
    pub request_id: U256,
    /// Words as delivered. The engine checks the count.
    pub random_words: Vec<U256>,
    /// Block number where this occurred.
    pub block_number: u64,
    /// Log index within block.
    pub log_index: u32,
}

/// Event parser for raw log data.
pub struct EventParser;

impl EventParser {
    /// Returns true if the topics carry the fulfillment signature.
    #[inline]
    #[must_use]
    pub fn is_fulfillment(topics: &[[u8; 32]]) -> bool {
        topics.first() == Some(&fulfillment_topic())
    }

    /// Parses a `RandomWordsFulfilled` log.
    ///
    /// # Errors
    ///
    /// Returns `MalformedLog` if the signature, topic count or data layout
    /// is wrong.
    pub fn parse_fulfillment(
        topics: &[[u8; 32]],
        data: &[u8],
        block_number: u64,
        log_index: u32,
    ) -> ChainResult<FulfillmentEvent> {
        if !Self::is_fulfillment(topics) {
            return Err(malformed("not a RandomWordsFulfilled log"));
        }
        if topics.len() != 2 {
            return Err(ChainError::MalformedLog(format!(
                "expected 2 topics, got {}",
                topics.len()
            )));
        }

        Ok(FulfillmentEvent {
            request_id: U256::from_be_slice(&topics[1]),
            random_words: decode_words(data)?,
            block_number,
            log_index,
        })
    }

    /// Parses a [`RawLog`].
    ///
    /// # Errors
    ///
    /// As for [`EventParser::parse_fulfillment`].
    pub fn parse_log(log: &RawLog) -> ChainResult<FulfillmentEvent> {
        Self::parse_fulfillment(&log.topics, &log.data, log.block_number, log.log_index)
    }
}

/// ABI-encodes a `uint256[]` as the only non-indexed parameter.
#[must_use]
pub fn encode_words(words: &[U256]) -> Vec<u8> {
    let mut data = Vec::with_capacity(WORD * (2 + words.len()));
    data.extend_from_slice(&U256::from(WORD).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(words.len()).to_be_bytes::<32>());
    for word in words {
        data.extend_from_slice(&word.to_be_bytes::<32>());
    }
    data
}

fn decode_words(data: &[u8]) -> ChainResult<Vec<U256>> {
    let offset = read_len(data, 0)?;
    let count = read_len(data, offset)?;

    let start = offset + WORD;
    let end = count
        .checked_mul(WORD)
        .and_then(|n| start.checked_add(n))
        .filter(|&end| end <= data.len())
        .ok_or_else(|| malformed("word array runs past end of data"))?;

    Ok(data[start..end]
        .chunks_exact(WORD)
        .map(U256::from_be_slice)
        .collect())
}

/// Reads an ABI word used as an offset or length.
fn read_len(data: &[u8], at: usize) -> ChainResult<usize> {
    let bytes = at
        .checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| malformed("data too short"))?;
    let word = U256::from_be_slice(bytes);

    let limbs = word.as_limbs();
    if limbs[1..].iter().any(|&limb| limb != 0) {
        return Err(malformed("offset or length out of range"));
    }
    usize::try_from(limbs[0]).map_err(|_| malformed("offset or length out of range"))
}

fn malformed(reason: &str) -> ChainError {
    ChainError::MalformedLog(reason.to_string())
}
