//! Reversible link tokens for item selections
//!
//! A token names either one storage-channel item or an inclusive range of
//! them. The raw payload is `get-<scaled>` or `get-<scaled>-<scaled>`,
//! where each id is multiplied by the absolute storage channel id, then
//! encoded as URL-safe base64 with the `=` padding stripped.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::transport::{ChatId, ItemId};

/// Payload kind for item selections
const KIND_GET: &str = "get";

/// Start parameter prefix used by verification callbacks
pub const VERIFY_PREFIX: &str = "verify_";

/// Errors from [`LinkCodec::decode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not valid URL-safe base64
    Encoding,
    /// Decoded bytes are not UTF-8
    NotText,
    /// Wrong number of `-` separated parts
    Shape(usize),
    /// Unknown payload kind
    Kind(String),
    /// A part is not an integer
    Number(String),
    /// A scaled value does not map back to a positive item id
    OutOfRange(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Encoding => write!(f, "not url-safe base64"),
            DecodeError::NotText => write!(f, "payload is not utf-8"),
            DecodeError::Shape(n) => write!(f, "expected 2 or 3 parts, got {}", n),
            DecodeError::Kind(k) => write!(f, "unknown payload kind: {}", k),
            DecodeError::Number(s) => write!(f, "not an integer: {}", s),
            DecodeError::OutOfRange(s) => write!(f, "value out of range: {}", s),
        }
    }
}

impl std::error::Error for DecodeError {}

/// A decoded selection of storage-channel items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Single(ItemId),
    /// Inclusive range; descending when `first > last`
    Range { first: ItemId, last: ItemId },
}

impl Selection {
    /// Number of items selected
    pub fn len(&self) -> u64 {
        match *self {
            Selection::Single(_) => 1,
            Selection::Range { first, last } => first.abs_diff(last) + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Item ids in delivery order
    pub fn ids(&self) -> Vec<ItemId> {
        match *self {
            Selection::Single(id) => vec![id],
            Selection::Range { first, last } if first <= last => (first..=last).collect(),
            Selection::Range { first, last } => (last..=first).rev().collect(),
        }
    }
}

/// Encoder/decoder bound to one storage channel
#[derive(Debug, Clone, Copy)]
pub struct LinkCodec {
    divisor: i128,
}

impl LinkCodec {
    /// Create a codec for `channel_id`. Returns `None` for channel 0.
    pub fn new(channel_id: ChatId) -> Option<Self> {
        if channel_id == 0 {
            return None;
        }
        Some(Self {
            divisor: i128::from(channel_id).abs(),
        })
    }

    /// Encode a selection into an opaque token
    pub fn encode(&self, selection: Selection) -> String {
        let payload = match selection {
            Selection::Single(id) => format!("{}-{}", KIND_GET, self.scale(id)),
            Selection::Range { first, last } => {
                format!("{}-{}-{}", KIND_GET, self.scale(first), self.scale(last))
            }
        };
        URL_SAFE_NO_PAD.encode(payload.as_bytes())
    }

    /// Decode an opaque token. Never panics, whatever the input.
    pub fn decode(&self, token: &str) -> Result<Selection, DecodeError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('='))
            .map_err(|_| DecodeError::Encoding)?;
        let payload = String::from_utf8(bytes).map_err(|_| DecodeError::NotText)?;

        let parts: Vec<&str> = payload.split('-').collect();
        if parts[0] != KIND_GET {
            return Err(DecodeError::Kind(parts[0].to_string()));
        }

        match parts.len() {
            2 => Ok(Selection::Single(self.unscale(parts[1])?)),
            3 => Ok(Selection::Range {
                first: self.unscale(parts[1])?,
                last: self.unscale(parts[2])?,
            }),
            n => Err(DecodeError::Shape(n)),
        }
    }

    fn scale(&self, id: ItemId) -> i128 {
        i128::from(id) * self.divisor
    }

    fn unscale(&self, part: &str) -> Result<ItemId, DecodeError> {
        let scaled: i128 = part
            .parse()
            .map_err(|_| DecodeError::Number(part.to_string()))?;
        let id = ItemId::try_from(scaled / self.divisor)
            .map_err(|_| DecodeError::OutOfRange(part.to_string()))?;
        if id <= 0 {
            return Err(DecodeError::OutOfRange(part.to_string()));
        }
        Ok(id)
    }
}

/// Builds the public URLs handed to recipients
#[derive(Debug, Clone)]
pub struct ShareLinks {
    bot_username: String,
}

impl ShareLinks {
    pub fn new(bot_username: impl Into<String>) -> Self {
        Self {
            bot_username: bot_username.into(),
        }
    }

    /// Retrieval link for a share code or link token
    pub fn share_url(&self, param: &str) -> String {
        format!("https://t.me/{}?start={}", self.bot_username, param)
    }

    /// Callback link confirming a verification challenge
    pub fn verify_url(&self, token: &str) -> String {
        format!("https://t.me/{}?start={}{}", self.bot_username, VERIFY_PREFIX, token)
    }

    /// "Share this link" URL wrapping a retrieval link
    pub fn forward_url(&self, link: &str) -> String {
        format!("https://telegram.me/share/url?url={}", link)
    }
}
