use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical loopback literal every loopback form is folded into.
pub const LOOPBACK: &str = "127.0.0.1";

const IPV4_MAPPED_PREFIX: &str = "::ffff:";

/// Normalized key identifying a client for visit accounting.
///
/// Equality is exact string match. The empty key stands for "unknown client"
/// and is counted like any other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Normalize a raw address into a client key.
    ///
    /// Strips an IPv4-in-IPv6 prefix and folds IPv6 loopback forms into
    /// [`LOOPBACK`]. Anything else is kept verbatim (after trimming), so
    /// malformed addresses still act as stable opaque keys.
    pub fn from_address(raw: &str) -> Self {
        let trimmed = raw.trim();
        let stripped = match trimmed.get(..IPV4_MAPPED_PREFIX.len()) {
            Some(prefix) if prefix.eq_ignore_ascii_case(IPV4_MAPPED_PREFIX) => {
                &trimmed[IPV4_MAPPED_PREFIX.len()..]
            }
            _ => trimmed,
        };
        if is_ipv6_loopback(stripped) {
            return Self(LOOPBACK.to_string());
        }
        Self(stripped.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(raw: &str) -> Self {
        Self::from_address(raw)
    }
}

fn is_ipv6_loopback(addr: &str) -> bool {
    let unbracketed = addr.trim_start_matches('[').trim_end_matches(']');
    matches!(unbracketed, "::1" | "0:0:0:0:0:0:0:1")
}

/// Resolve the client key for a request.
///
/// `forwarded` is the raw `X-Forwarded-For` value and is honored only when
/// `trust_proxy` is set; its first comma-separated entry is the client.
/// Otherwise the transport peer address is used. With neither available the
/// result is the empty "unknown client" key.
pub fn resolve_client_id(forwarded: Option<&str>, peer: Option<&str>, trust_proxy: bool) -> ClientId {
    let declared = if trust_proxy {
        forwarded
            .and_then(|value| value.split(',').next())
            .map(str::trim)
    } else {
        None
    };

    match declared.or(peer) {
        Some(raw) => ClientId::from_address(raw),
        None => ClientId::default(),
    }
}
