//! Random share codes and challenge tokens

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Default share code length
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Shortest accepted share code
pub const MIN_CODE_LENGTH: usize = 6;

/// Longest accepted share code
pub const MAX_CODE_LENGTH: usize = 12;

/// Random alphanumeric string (`[A-Za-z0-9]`) of `len` characters
pub fn random_alphanumeric(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// True if `s` has the shape of a share code
///
/// Anything that is not a share code may still be a link token.
pub fn is_share_code(s: &str) -> bool {
    (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&s.len())
        && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Produces candidate share codes
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    length: usize,
    #[cfg(test)]
    fixed: Option<String>,
}

impl CodeGenerator {
    /// Create a generator; `length` is clamped into the accepted code range
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(MIN_CODE_LENGTH, MAX_CODE_LENGTH),
            #[cfg(test)]
            fixed: None,
        }
    }

    /// Generator that always yields `code`, for collision tests
    #[cfg(test)]
    pub(crate) fn fixed(code: &str) -> Self {
        Self {
            length: code.len(),
            fixed: Some(code.to_string()),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// A fresh candidate. Uniqueness is the registry's job.
    pub fn generate(&self) -> String {
        #[cfg(test)]
        if let Some(code) = &self.fixed {
            return code.clone();
        }
        random_alphanumeric(self.length)
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}
