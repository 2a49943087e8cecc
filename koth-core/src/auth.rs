//! Request authorization
//!
//! Two independent checks gate every endpoint: a shared-secret token and the
//! caller's address against an allow-list of CIDR ranges. The token is
//! checked first, so a caller failing both is told it is unauthorized rather
//! than forbidden.

use crate::{config_error, AgentResult};
use ipnet::IpNet;
use std::net::IpAddr;

/// Scheme accepted in front of the secret in the `Authorization` header
pub const TOKEN_SCHEME: &str = "Token";

/// Why a request was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Missing or wrong token (401)
    Unauthorized,
    /// Caller address outside the allow-list (403)
    Forbidden,
}

/// Token and allow-list, fixed at startup
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    token: String,
    allowed_origins: Vec<IpNet>,
}

impl AuthConfig {
    /// An empty token disables token authentication.
    pub fn new(token: impl Into<String>, allowed_origins: Vec<IpNet>) -> Self {
        Self {
            token: token.into(),
            allowed_origins,
        }
    }

    /// Build from a comma-separated list of CIDR ranges
    pub fn from_origin_list(token: impl Into<String>, origins: &str) -> AgentResult<Self> {
        Ok(Self::new(token, parse_origins(origins)?))
    }

    pub fn token_required(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn allowed_origins(&self) -> &[IpNet] {
        &self.allowed_origins
    }

    /// Check the raw `Authorization` header value.
    ///
    /// Accepts `Token <secret>` or the bare secret. The header is compared
    /// byte for byte, so secrets outside visible ASCII work as sent.
    pub fn authorize_token(&self, header: Option<&[u8]>) -> bool {
        if self.token.is_empty() {
            return true;
        }

        let Some(header) = header else {
            return false;
        };
        let token = self.token.as_bytes();

        match header.iter().position(|&b| b == b' ') {
            Some(space) => {
                &header[..space] == TOKEN_SCHEME.as_bytes() && &header[space + 1..] == token
            }
            None => header == token,
        }
    }

    /// Check the caller's address against the allow-list.
    ///
    /// IPv4-mapped IPv6 addresses, as seen on dual-stack listeners, are
    /// compared as plain IPv4.
    pub fn authorize_ip(&self, peer: Option<IpAddr>) -> bool {
        let Some(peer) = peer else {
            return false;
        };
        let peer = peer.to_canonical();

        self.allowed_origins.iter().any(|range| range.contains(&peer))
    }

    /// Run both checks in order
    pub fn authorize(
        &self,
        header: Option<&[u8]>,
        peer: Option<IpAddr>,
    ) -> Result<(), AuthRejection> {
        if !self.authorize_token(header) {
            return Err(AuthRejection::Unauthorized);
        }
        if !self.authorize_ip(peer) {
            return Err(AuthRejection::Forbidden);
        }
        Ok(())
    }
}

/// Parse a comma-separated list of CIDR ranges.
///
/// IPv4 and IPv6 ranges must be listed separately. Blank entries are
/// skipped; anything else that does not parse is a configuration error.
pub fn parse_origins(origins: &str) -> AgentResult<Vec<IpNet>> {
    origins
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpNet>()
                .map(|net| net.trunc())
                .map_err(|e| config_error!(format!("invalid CIDR range '{}'", entry), "auth", e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> Option<IpAddr> {
        Some(s.parse().unwrap())
    }

    fn header(value: &[u8]) -> Option<&[u8]> {
        Some(value)
    }

    #[test]
    fn test_empty_token_disables_check() {
        let auth = AuthConfig::from_origin_list("", "0.0.0.0/0").unwrap();
        assert!(!auth.token_required());
        assert!(auth.authorize_token(None));
        assert!(auth.authorize_token(header(b"anything")));
        assert!(auth.authorize_token(header(b"Token wrong")));
    }

    #[test]
    fn test_token_forms() {
        let auth = AuthConfig::new("secret", Vec::new());
        assert!(auth.authorize_token(header(b"secret")));
        assert!(auth.authorize_token(header(b"Token secret")));

        assert!(!auth.authorize_token(None));
        assert!(!auth.authorize_token(header(b"")));
        assert!(!auth.authorize_token(header(b"Bearer secret")));
        assert!(!auth.authorize_token(header(b"token secret")));
        assert!(!auth.authorize_token(header(b"Token  secret")));
        assert!(!auth.authorize_token(header(b"Token secret ")));
        assert!(!auth.authorize_token(header(b"Token ")));
        assert!(!auth.authorize_token(header(b"secre")));
    }

    #[test]
    fn test_non_ascii_secret() {
        let auth = AuthConfig::new("pässwort", Vec::new());
        assert!(auth.authorize_token(header("pässwort".as_bytes())));
        assert!(auth.authorize_token(header("Token pässwort".as_bytes())));
        assert!(!auth.authorize_token(header(b"passwort")));
        // Not valid UTF-8 at all.
        assert!(!auth.authorize_token(header(b"Token p\xe4sswort")));
    }

    #[test]
    fn test_secret_containing_space() {
        let auth = AuthConfig::new("two words", Vec::new());
        assert!(auth.authorize_token(header(b"Token two words")));
        // The bare form splits on the first space, so it can never match.
        assert!(!auth.authorize_token(header(b"two words")));
    }

    #[test]
    fn test_ip_containment() {
        let auth = AuthConfig::from_origin_list("", "10.0.0.0/8,2001:db8::/32").unwrap();
        assert!(auth.authorize_ip(ip("10.1.2.3")));
        assert!(auth.authorize_ip(ip("2001:db8::1")));
        assert!(!auth.authorize_ip(ip("192.168.1.1")));
        assert!(!auth.authorize_ip(ip("2001:db9::1")));
        assert!(!auth.authorize_ip(None));
    }

    #[test]
    fn test_families_are_separate() {
        let auth = AuthConfig::from_origin_list("", "::/0").unwrap();
        assert!(auth.authorize_ip(ip("::1")));
        assert!(!auth.authorize_ip(ip("127.0.0.1")));

        let auth = AuthConfig::from_origin_list("", "0.0.0.0/0").unwrap();
        assert!(auth.authorize_ip(ip("127.0.0.1")));
        assert!(!auth.authorize_ip(ip("::1")));
    }

    #[test]
    fn test_mapped_ipv4_is_canonicalized() {
        let auth = AuthConfig::from_origin_list("", "127.0.0.0/8").unwrap();
        assert!(auth.authorize_ip(ip("::ffff:127.0.0.1")));
    }

    #[test]
    fn test_empty_allow_list_rejects_everyone() {
        let auth = AuthConfig::from_origin_list("", " , ").unwrap();
        assert!(auth.allowed_origins().is_empty());
        assert!(!auth.authorize_ip(ip("127.0.0.1")));
    }

    #[test]
    fn test_check_order() {
        let auth = AuthConfig::from_origin_list("secret", "10.0.0.0/8").unwrap();
        assert_eq!(
            auth.authorize(None, ip("192.168.1.1")),
            Err(AuthRejection::Unauthorized)
        );
        assert_eq!(
            auth.authorize(header(b"Token secret"), ip("192.168.1.1")),
            Err(AuthRejection::Forbidden)
        );
        assert_eq!(auth.authorize(header(b"secret"), ip("10.9.9.9")), Ok(()));
    }

    #[test]
    fn test_parse_origins() {
        let nets = parse_origins("0.0.0.0/0, ::/0").unwrap();
        assert_eq!(nets.len(), 2);

        // Host bits are dropped, containment is unaffected.
        let nets = parse_origins("10.1.2.3/8").unwrap();
        assert_eq!(nets[0].to_string(), "10.0.0.0/8");

        let err = parse_origins("10.0.0.0/8,not-a-cidr").unwrap_err();
        assert!(err.is_startup_fatal());
        assert!(err.to_string().contains("not-a-cidr"));

        assert!(parse_origins("10.0.0.1").is_err());
        assert!(parse_origins("10.0.0.0/33").is_err());
    }
}
