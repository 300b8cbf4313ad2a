//! Logical blocks.

use ftcount_qec::{Code, same_code};
use std::fmt;
use std::sync::Arc;

/// A named logical register encoded in a code.
///
/// Two blocks are equal when their codes have the same check structure;
/// the name is a label only.
#[derive(Clone)]
pub struct Block {
    name: String,
    code: Arc<dyn Code>,
}

impl Block {
    /// Create a block.
    pub fn new(name: impl Into<String>, code: Arc<dyn Code>) -> Self {
        Self {
            name: name.into(),
            code,
        }
    }

    /// Block name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The code the block is encoded in.
    pub fn code(&self) -> &Arc<dyn Code> {
        &self.code
    }

    /// Number of physical qubits.
    pub fn len(&self) -> usize {
        self.code.block_length()
    }

    /// Whether the block has no qubits.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of key bits for this block.
    pub fn key_bits(&self) -> usize {
        self.code.parity_checks().len()
    }

    /// The same block re-labelled.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self::new(name, Arc::clone(&self.code))
    }

    /// The block encoded in the code underlying a logical state, or itself.
    #[must_use]
    pub fn underlying(&self) -> Self {
        match self.code.underlying() {
            Some(code) => Self::new(self.name.clone(), code),
            None => self.clone(),
        }
    }

    /// Canonical description used in content addresses.
    pub fn descriptor(&self) -> String {
        format!("{}:{}", self.name, self.code.fingerprint())
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.code, &other.code) || same_code(self.code.as_ref(), other.code.as_ref())
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("name", &self.name)
            .field("code", &self.code.name())
            .finish()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.code.name())
    }
}

/// Render a block list for error messages.
pub(crate) fn describe(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether `blocks` starts with blocks equal to `prefix`.
pub(crate) fn starts_with(blocks: &[Block], prefix: &[Block]) -> bool {
    blocks.len() >= prefix.len() && blocks.iter().zip(prefix).all(|(a, b)| a == b)
}
