//! Broker endpoint resolution.
//!
//! Turns a comma-separated host list plus a port into an ordered set of
//! candidate endpoints. Order is caller-specified failover priority: no
//! deduplication, no DNS lookups, no reordering.

use std::fmt;

/// Default AMQP port, used when the configured port is unset (zero).
pub const DEFAULT_PORT: u16 = 5672;

/// A single broker endpoint candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Hostname or IP address, as configured.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Resolve a comma-separated host list into ordered endpoint candidates.
///
/// A `port` of zero falls back to [`DEFAULT_PORT`]. Blank segments are
/// skipped, so an empty host string yields no candidates; rejecting that
/// is the caller's responsibility.
#[must_use]
pub fn resolve(hosts: &str, port: u16) -> Vec<Endpoint> {
    let port = if port == 0 { DEFAULT_PORT } else { port };
    hosts
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(|host| Endpoint { host: host.to_string(), port })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_one_candidate_per_host_in_order() {
        let endpoints = resolve("alpha,beta,gamma", 5671);
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0], Endpoint { host: "alpha".into(), port: 5671 });
        assert_eq!(endpoints[1], Endpoint { host: "beta".into(), port: 5671 });
        assert_eq!(endpoints[2], Endpoint { host: "gamma".into(), port: 5671 });
    }

    #[test]
    fn zero_port_falls_back_to_default() {
        let endpoints = resolve("a,b", 0);
        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.iter().all(|e| e.port == DEFAULT_PORT));
    }

    #[test]
    fn empty_host_string_yields_no_candidates() {
        assert!(resolve("", 5672).is_empty());
        assert!(resolve("  ", 5672).is_empty());
    }

    #[test]
    fn trims_whitespace_and_skips_blank_segments() {
        let endpoints = resolve(" a , , b ", 1234);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].host, "a");
        assert_eq!(endpoints[1].host, "b");
    }

    #[test]
    fn duplicates_are_preserved() {
        let endpoints = resolve("a,a", 0);
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0], endpoints[1]);
    }

    #[test]
    fn display_is_host_colon_port() {
        let endpoint = Endpoint { host: "broker".into(), port: 5672 };
        assert_eq!(endpoint.to_string(), "broker:5672");
    }
}
