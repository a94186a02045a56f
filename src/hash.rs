//! Content-addressed script identities.
//!
//! A script's identity is the SHA-1 digest of its exact body bytes, rendered
//! as 40 lowercase hexadecimal characters. The identity doubles as the cache
//! key inside a session and as the externally visible handle clients use to
//! re-run a script they registered earlier.

use sha1::{Digest, Sha1};
use std::fmt;

/// Length of a rendered script identity in characters.
pub const SCRIPT_ID_LEN: usize = 40;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// The content-derived identity of a script body.
///
/// Two byte-identical bodies always produce the same identity; computing it
/// is pure and independent of any interpreter state. Stored pre-rendered as
/// lowercase hex so it can be handed out and used as a map key without
/// further conversion.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptId([u8; SCRIPT_ID_LEN]);

impl ScriptId {
    /// Computes the identity of a script body.
    ///
    /// # Example
    ///
    /// ```
    /// use scriptbox::ScriptId;
    ///
    /// let id = ScriptId::of(b"return 1+1");
    /// assert_eq!(id, ScriptId::of(b"return 1+1"));
    /// assert_eq!(id.as_str().len(), 40);
    /// ```
    pub fn of(body: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(body);
        let digest = hasher.finalize();

        let mut hex = [0u8; SCRIPT_ID_LEN];
        for (i, byte) in digest.iter().enumerate() {
            hex[2 * i] = HEX[(byte >> 4) as usize];
            hex[2 * i + 1] = HEX[(byte & 0x0f) as usize];
        }
        ScriptId(hex)
    }

    /// Parses an externally supplied handle.
    ///
    /// Accepts exactly [`SCRIPT_ID_LEN`] lowercase hex characters; anything
    /// else is an [`InvalidArgument`](crate::Error::InvalidArgument) error.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != SCRIPT_ID_LEN {
            return Err(crate::Error::invalid_argument(format!(
                "script id must be {} hex characters, got length {}",
                SCRIPT_ID_LEN,
                bytes.len()
            )));
        }
        for &b in bytes {
            if !matches!(b, b'0'..=b'9' | b'a'..=b'f') {
                return Err(crate::Error::invalid_argument(format!(
                    "invalid script id character `{}`",
                    b as char
                )));
            }
        }
        let mut id = [0u8; SCRIPT_ID_LEN];
        id.copy_from_slice(bytes);
        Ok(ScriptId(id))
    }

    /// Returns the identity as a lowercase hex string slice.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("hex encoding is valid UTF-8")
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptId({})", self.as_str())
    }
}
