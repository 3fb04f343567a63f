//! Classification of duplex closures observed after the last upload ack.
//!
//! Some servers hang up instead of sending the final envelope once every
//! block has been acknowledged. Whether a given closure counts as a
//! finished upload is policy, not protocol: the abrupt-closure signatures
//! are matched against transport error text, which varies between
//! transport libraries, so they live in an overridable [`ClosurePolicy`].

use crate::transport::DuplexClose;

/// Close code for a normal closure.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close code sent by an endpoint that is going away.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Decides which closures after the final block ack mean "completed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosurePolicy {
    /// Accept a close handshake (or a plain end of stream) as completion.
    pub accept_clean_close: bool,
    /// Close codes accepted when `accept_clean_close` is set. A close
    /// frame without a code is always accepted.
    pub accepted_close_codes: Vec<u16>,
    /// Case-insensitive substrings identifying an abrupt closure that still
    /// counts as completion.
    pub abrupt_signatures: Vec<String>,
}

impl Default for ClosurePolicy {
    fn default() -> Self {
        Self {
            accept_clean_close: true,
            accepted_close_codes: vec![CLOSE_NORMAL, CLOSE_GOING_AWAY],
            abrupt_signatures: [
                "abnormal closure",
                "reset without closing handshake",
                "unexpected eof",
                "unexpected end of file",
                "use of closed network connection",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ClosurePolicy {
    /// A policy that only accepts an explicit success envelope.
    pub fn strict() -> Self {
        Self {
            accept_clean_close: false,
            accepted_close_codes: Vec::new(),
            abrupt_signatures: Vec::new(),
        }
    }

    /// Adds an abrupt-closure signature.
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.abrupt_signatures.push(signature.into());
        self
    }

    /// Returns `true` if `close` should be treated as a completed upload.
    pub fn accepts(&self, close: &DuplexClose) -> bool {
        match close {
            DuplexClose::Clean { code, .. } => {
                self.accept_clean_close
                    && code.is_none_or(|c| self.accepted_close_codes.contains(&c))
            }
            DuplexClose::Abrupt(detail) => {
                let detail = detail.to_ascii_lowercase();
                self.abrupt_signatures
                    .iter()
                    .any(|sig| !sig.is_empty() && detail.contains(&sig.to_ascii_lowercase()))
            }
        }
    }
}
