//! Upstream endpoint addressing.
//!
//! # Responsibilities
//! - Describe an upstream endpoint by kind and kind-specific fields
//! - Produce the single canonical address string the gateway expects
//! - Parse a canonical string back into its fields (used by tooling and tests)
//!
//! # Design Decisions
//! - Pure functions only: no DNS lookups, no filesystem checks
//! - Missing fields fail closed with the name of the field
//! - IPv6 hosts are bracketed exactly once

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix the gateway uses for UNIX sockets with prefix routing.
pub const UNIX_PREFIX: &str = "unix@";

/// Prefix the gateway uses for abstract-namespace sockets.
pub const ABSTRACT_PREFIX: &str = "abns@";

/// Errors produced while formatting or parsing an endpoint address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// A required field is absent or blank.
    #[error("{kind} endpoint is missing its {field}")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    /// Port zero is never routable.
    #[error("{kind} endpoint has invalid port 0")]
    InvalidPort { kind: &'static str },

    /// The canonical string does not match any known endpoint shape.
    #[error("unrecognized endpoint address '{0}'")]
    Unrecognized(String),
}

impl AddressError {
    /// Name of the offending field, used as the tail of a finding path.
    pub fn field(&self) -> &'static str {
        match self {
            AddressError::MissingField { field, .. } => field,
            AddressError::InvalidPort { .. } => "port",
            AddressError::Unrecognized(_) => "address",
        }
    }
}

/// Typed description of an upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    Ipv4 {
        #[serde(default)]
        host: String,
        #[serde(default)]
        port: Option<u16>,
    },
    Ipv6 {
        #[serde(default)]
        host: String,
        #[serde(default)]
        port: Option<u16>,
    },
    /// Plain UNIX-domain socket path.
    Unix {
        #[serde(default)]
        socket: String,
    },
    /// UNIX-domain socket with prefix routing (`unix@path`).
    UnixPrefixed {
        #[serde(default)]
        socket: String,
    },
    /// Abstract-namespace socket (`abns@name`).
    Abstract {
        #[serde(default)]
        socket: String,
    },
}

impl Endpoint {
    pub fn ipv4(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Ipv4 {
            host: host.into(),
            port: Some(port),
        }
    }

    pub fn ipv6(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Ipv6 {
            host: host.into(),
            port: Some(port),
        }
    }

    pub fn unix(socket: impl Into<String>) -> Self {
        Endpoint::Unix {
            socket: socket.into(),
        }
    }

    /// Short tag used in messages and finding paths.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Endpoint::Ipv4 { .. } => "ipv4",
            Endpoint::Ipv6 { .. } => "ipv6",
            Endpoint::Unix { .. } => "unix",
            Endpoint::UnixPrefixed { .. } => "unix_prefixed",
            Endpoint::Abstract { .. } => "abstract",
        }
    }

    /// Format the endpoint into the gateway's canonical address string.
    pub fn canonical(&self) -> Result<String, AddressError> {
        let kind = self.kind_name();
        match self {
            Endpoint::Ipv4 { host, port } => {
                let host = required(kind, "host", host)?;
                let port = required_port(kind, *port)?;
                Ok(format!("{}:{}", host, port))
            }
            Endpoint::Ipv6 { host, port } => {
                let host = required(kind, "host", host)?;
                let port = required_port(kind, *port)?;
                if host.starts_with('[') && host.ends_with(']') {
                    Ok(format!("{}:{}", host, port))
                } else {
                    Ok(format!("[{}]:{}", host, port))
                }
            }
            Endpoint::Unix { socket } => Ok(required(kind, "socket", socket)?.to_string()),
            Endpoint::UnixPrefixed { socket } => {
                Ok(format!("{}{}", UNIX_PREFIX, required(kind, "socket", socket)?))
            }
            Endpoint::Abstract { socket } => {
                Ok(format!("{}{}", ABSTRACT_PREFIX, required(kind, "socket", socket)?))
            }
        }
    }

    /// Recover endpoint fields from a canonical address string.
    ///
    /// The kind is inferred from the shape: `unix@` and `abns@` prefixes,
    /// socket paths, bracketed IPv6 hosts, then `host:port`. A path is either
    /// absolute or holds a `/` and no `:`; a bare file name must be written
    /// `./app.sock`.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        if let Some(socket) = address.strip_prefix(UNIX_PREFIX) {
            return non_empty_socket(socket).map(|socket| Endpoint::UnixPrefixed { socket });
        }
        if let Some(socket) = address.strip_prefix(ABSTRACT_PREFIX) {
            return non_empty_socket(socket).map(|socket| Endpoint::Abstract { socket });
        }
        // Relative socket paths: a slash and no port separator.
        if address.starts_with('/') || (address.contains('/') && !address.contains(':')) {
            return Ok(Endpoint::unix(address));
        }
        if let Some(rest) = address.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| AddressError::Unrecognized(address.to_string()))?;
            let port = tail
                .strip_prefix(':')
                .and_then(|p| p.parse::<u16>().ok())
                .ok_or_else(|| AddressError::Unrecognized(address.to_string()))?;
            if host.is_empty() {
                return Err(AddressError::Unrecognized(address.to_string()));
            }
            return Ok(Endpoint::ipv6(host, port));
        }

        match address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && !host.contains(':') => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| AddressError::Unrecognized(address.to_string()))?;
                Ok(Endpoint::ipv4(host, port))
            }
            _ => Err(AddressError::Unrecognized(address.to_string())),
        }
    }
}

fn required<'a>(
    kind: &'static str,
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, AddressError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AddressError::MissingField { kind, field });
    }
    Ok(value)
}

fn required_port(kind: &'static str, port: Option<u16>) -> Result<u16, AddressError> {
    match port {
        None => Err(AddressError::MissingField { kind, field: "port" }),
        Some(0) => Err(AddressError::InvalidPort { kind }),
        Some(p) => Ok(p),
    }
}

fn non_empty_socket(socket: &str) -> Result<String, AddressError> {
    if socket.is_empty() {
        return Err(AddressError::Unrecognized(socket.to_string()));
    }
    Ok(socket.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ipv4_format() {
        let ep = Endpoint::ipv4("127.0.0.1", 3000);
        assert_eq!(ep.canonical().unwrap(), "127.0.0.1:3000");
    }

    #[test]
    fn test_ipv6_brackets_once() {
        assert_eq!(Endpoint::ipv6("::1", 8080).canonical().unwrap(), "[::1]:8080");
        assert_eq!(Endpoint::ipv6("[::1]", 8080).canonical().unwrap(), "[::1]:8080");
    }

    #[test]
    fn test_socket_kinds() {
        assert_eq!(
            Endpoint::unix("/run/app.sock").canonical().unwrap(),
            "/run/app.sock"
        );
        let prefixed = Endpoint::UnixPrefixed {
            socket: "/run/app.sock".into(),
        };
        assert_eq!(prefixed.canonical().unwrap(), "unix@/run/app.sock");
        let abns = Endpoint::Abstract {
            socket: "app".into(),
        };
        assert_eq!(abns.canonical().unwrap(), "abns@app");
    }

    #[test]
    fn test_missing_fields_fail_closed() {
        let no_host = Endpoint::Ipv4 {
            host: "  ".into(),
            port: Some(80),
        };
        assert_eq!(
            no_host.canonical(),
            Err(AddressError::MissingField {
                kind: "ipv4",
                field: "host"
            })
        );

        let no_port = Endpoint::Ipv6 {
            host: "::1".into(),
            port: None,
        };
        assert_eq!(no_port.canonical().unwrap_err().field(), "port");

        let zero = Endpoint::ipv4("10.0.0.1", 0);
        assert_eq!(zero.canonical(), Err(AddressError::InvalidPort { kind: "ipv4" }));

        let no_socket = Endpoint::Abstract { socket: "".into() };
        assert_eq!(no_socket.canonical().unwrap_err().field(), "socket");
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(
            Endpoint::parse("unix@/run/a.sock").unwrap(),
            Endpoint::UnixPrefixed {
                socket: "/run/a.sock".into()
            }
        );
        assert_eq!(
            Endpoint::parse("abns@haproxy").unwrap(),
            Endpoint::Abstract {
                socket: "haproxy".into()
            }
        );
        assert_eq!(Endpoint::parse("/run/a.sock").unwrap(), Endpoint::unix("/run/a.sock"));
        assert_eq!(Endpoint::parse("[fe80::1]:443").unwrap(), Endpoint::ipv6("fe80::1", 443));
        assert!(Endpoint::parse("::1:80").is_err());
        assert!(Endpoint::parse("localhost").is_err());
    }

    #[test]
    fn test_parse_relative_socket_paths() {
        for path in ["run/app.sock", "./app.sock", "../sockets/app.sock"] {
            let ep = Endpoint::parse(path).unwrap();
            assert_eq!(ep, Endpoint::unix(path));
            assert_eq!(ep.canonical().unwrap(), path);
        }
        // A bare name is a host missing its port, not a socket.
        assert!(Endpoint::parse("app.sock").is_err());
        assert_eq!(
            Endpoint::parse("unix@run/app.sock").unwrap(),
            Endpoint::UnixPrefixed {
                socket: "run/app.sock".into()
            }
        );
    }

    #[test]
    fn test_deserialize_tagged() {
        let ep: Endpoint =
            serde_json::from_str(r#"{"kind":"ipv4","host":"10.0.0.2","port":8080}"#).unwrap();
        assert_eq!(ep, Endpoint::ipv4("10.0.0.2", 8080));
    }

    proptest! {
        #[test]
        fn ipv4_round_trips(a in 0u8..=255, b in 0u8..=255, c in 0u8..=255, d in 0u8..=255, port in 1u16..=65535) {
            let host = format!("{}.{}.{}.{}", a, b, c, d);
            let ep = Endpoint::ipv4(host, port);
            let parsed = Endpoint::parse(&ep.canonical().unwrap()).unwrap();
            prop_assert_eq!(parsed, ep);
        }

        #[test]
        fn ipv6_round_trips(segments in proptest::collection::vec(0u16..=0xffff, 8), port in 1u16..=65535) {
            let host = segments.iter().map(|s| format!("{:x}", s)).collect::<Vec<_>>().join(":");
            let ep = Endpoint::ipv6(host, port);
            let parsed = Endpoint::parse(&ep.canonical().unwrap()).unwrap();
            prop_assert_eq!(parsed, ep);
        }

        #[test]
        fn socket_round_trips(name in "[a-z][a-z0-9_]{0,15}") {
            let path = format!("/run/{}.sock", name);
            for ep in [
                Endpoint::unix(path.clone()),
                Endpoint::UnixPrefixed { socket: path.clone() },
                Endpoint::Abstract { socket: name.clone() },
            ] {
                let parsed = Endpoint::parse(&ep.canonical().unwrap()).unwrap();
                prop_assert_eq!(parsed, ep);
            }
        }
    }
}
