//! Input validation for routing entries, performed before any argument
//! reaches the external tool.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid domain")]
    InvalidDomain,
    #[error("invalid ip address")]
    InvalidIp,
    #[error("invalid port")]
    InvalidPort,
}

const MAX_DOMAIN_LENGTH: usize = 253;

/// RFC 1035-shaped domain: dot-separated labels of at most 63 characters,
/// ending in an alphabetic TLD of at least two characters.
#[must_use]
pub fn is_valid_domain(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LENGTH {
        return false;
    }
    Regex::new(r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$")
        .is_ok_and(|re| re.is_match(domain))
}

/// Dotted-quad IPv4 address with each octet in 0..=255.
#[must_use]
pub fn is_valid_ipv4(ip: &str) -> bool {
    Regex::new(
        r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$",
    )
    .is_ok_and(|re| re.is_match(ip))
}

#[must_use]
pub const fn is_valid_port(port: u32) -> bool {
    port >= 1 && port <= 65535
}

/// Validate the fields of a proxy entry (domain only).
///
/// # Errors
/// Returns the first failing field.
pub fn validate_proxy_entry(domain: &str) -> Result<(), ValidationError> {
    if !is_valid_domain(domain) {
        return Err(ValidationError::InvalidDomain);
    }
    Ok(())
}

/// Validate the fields of a service entry (domain, mandatory port,
/// optional backend IP).
///
/// # Errors
/// Returns the first failing field.
pub fn validate_service_entry(
    domain: &str,
    port: u32,
    ip: Option<&str>,
) -> Result<(), ValidationError> {
    if !is_valid_domain(domain) {
        return Err(ValidationError::InvalidDomain);
    }
    if !is_valid_port(port) {
        return Err(ValidationError::InvalidPort);
    }
    if let Some(ip) = ip.filter(|ip| !ip.is_empty()) {
        if !is_valid_ipv4(ip) {
            return Err(ValidationError::InvalidIp);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_domains() {
        for domain in ["example.com", "a.b.example.co.uk", "xn--nxasmq6b.example.org"] {
            assert!(is_valid_domain(domain), "{domain}");
        }
    }

    #[test]
    fn rejects_malformed_domains() {
        let too_long = format!("{}.com", "a".repeat(260));
        for domain in [
            "",
            "nodots",
            "-leading.example.com",
            "trailing-.example.com",
            "example.c",
            "exa mple.com",
            "example.com/../etc",
            too_long.as_str(),
        ] {
            assert!(!is_valid_domain(domain), "{domain}");
        }
    }

    #[test]
    fn ipv4_octets_are_bounded() {
        assert!(is_valid_ipv4("10.0.0.1"));
        assert!(is_valid_ipv4("255.255.255.255"));
        assert!(!is_valid_ipv4("256.0.0.1"));
        assert!(!is_valid_ipv4("10.0.0"));
        assert!(!is_valid_ipv4("10.0.0.1.2"));
        assert!(!is_valid_ipv4(""));
        assert!(!is_valid_ipv4("::1"));
    }

    #[test]
    fn port_range_is_one_to_65535() {
        assert!(!is_valid_port(0));
        assert!(is_valid_port(1));
        assert!(is_valid_port(8080));
        assert!(is_valid_port(65535));
        assert!(!is_valid_port(65536));
    }

    #[test]
    fn service_entry_validates_each_field() {
        assert!(validate_service_entry("example.com", 8080, Some("10.0.0.1")).is_ok());
        assert!(validate_service_entry("example.com", 8080, None).is_ok());
        // Empty IP behaves like an omitted one.
        assert!(validate_service_entry("example.com", 8080, Some("")).is_ok());
        assert_eq!(
            validate_service_entry("bad domain", 8080, None),
            Err(ValidationError::InvalidDomain)
        );
        assert_eq!(
            validate_service_entry("example.com", 0, None),
            Err(ValidationError::InvalidPort)
        );
        assert_eq!(
            validate_service_entry("example.com", 8080, Some("999.1.1.1")),
            Err(ValidationError::InvalidIp)
        );
    }
}
