//! Conditional HTTP service rules.
//!
//! # Responsibilities
//! - Find the rule guarding the request path
//! - Check the request against the rule's criteria
//!
//! # Design Decisions
//! - The request path is lower-cased before lookup, like the other path
//!   stages; the stored `url-path` is compared as written and the first
//!   matching rule wins
//! - Each rule type inspects only its own part of the request
//! - Empty criteria never match

use std::net::{IpAddr, SocketAddr};

use crate::config::schema::{ConditionalHttpService, RuleType};
use crate::security::validator::{RequestView, Verdict};

/// Verdict of the first rule targeting the request path, or `None` when no
/// rule applies.
pub fn evaluate(rules: &[ConditionalHttpService], request: &RequestView<'_>) -> Option<Verdict> {
    let path = request.path.to_lowercase();
    let rule = rules.iter().find(|r| r.url_path == path)?;

    let served = match rule.rule_type {
        RuleType::Header => header_matches(rule, request),
        RuleType::IpAddress => {
            let ip = remote_ip(request.remote_addr);
            criteria(rule).any(|c| c == ip)
        }
        RuleType::QueryString => criteria(rule).any(|c| request.query.contains(c)),
    };

    if served {
        Some(Verdict::ALLOW)
    } else {
        tracing::debug!(
            path = %request.path,
            rule_type = ?rule.rule_type,
            "Conditional service criteria not met"
        );
        Some(Verdict::deny(rule.denial_status()))
    }
}

fn criteria(rule: &ConditionalHttpService) -> impl Iterator<Item = &str> {
    rule.criteria.iter().map(String::as_str).filter(|c| !c.is_empty())
}

/// Header values are compared as raw bytes; they need not be valid UTF-8.
fn header_matches(rule: &ConditionalHttpService, request: &RequestView<'_>) -> bool {
    request
        .headers
        .values()
        .any(|value| criteria(rule).any(|c| contains_bytes(value.as_bytes(), c.as_bytes())))
}

fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// Host portion of a peer address, without IPv6 brackets.
pub fn remote_ip(remote_addr: &str) -> String {
    if let Ok(addr) = remote_addr.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }
    if let Ok(ip) = remote_addr.parse::<IpAddr>() {
        return ip.to_string();
    }
    if let Some(rest) = remote_addr.strip_prefix('[') {
        return rest.split(']').next().unwrap_or_default().to_string();
    }
    remote_addr.split(':').next().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    fn rule(rule_type: RuleType, criteria: &[&str], status: i64) -> ConditionalHttpService {
        ConditionalHttpService {
            rule_type,
            url_path: "/robots.txt".into(),
            criteria: criteria.iter().map(|c| c.to_string()).collect(),
            http_status_code: status,
        }
    }

    fn view<'a>(path: &'a str, query: &'a str, remote: &'a str, headers: &'a HeaderMap) -> RequestView<'a> {
        RequestView {
            method: "GET",
            host: "example.com",
            path,
            query,
            remote_addr: remote,
            headers,
        }
    }

    #[test]
    fn test_header_rule() {
        let rules = vec![rule(RuleType::Header, &["bingbot"], 404)];
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("Mozilla/5.0 (compatible; bingbot/2.0)"));
        let req = view("/robots.txt", "", "10.0.0.1:5000", &headers);
        assert_eq!(evaluate(&rules, &req), Some(Verdict::ALLOW));

        let empty = HeaderMap::new();
        let req = view("/robots.txt", "", "10.0.0.1:5000", &empty);
        assert_eq!(evaluate(&rules, &req), Some(Verdict::deny(404)));
    }

    #[test]
    fn test_header_rule_ignores_ip_and_query() {
        let rules = vec![rule(RuleType::Header, &["10.0.0.1", "token"], 403)];
        let headers = HeaderMap::new();
        let req = view("/robots.txt", "token=1", "10.0.0.1:5000", &headers);
        assert_eq!(evaluate(&rules, &req), Some(Verdict::deny(403)));
    }

    #[test]
    fn test_ip_rule() {
        let rules = vec![rule(RuleType::IpAddress, &["::1", "192.168.0.7"], 0)];
        let headers = HeaderMap::new();
        assert_eq!(
            evaluate(&rules, &view("/robots.txt", "", "[::1]:4431", &headers)),
            Some(Verdict::ALLOW)
        );
        assert_eq!(
            evaluate(&rules, &view("/robots.txt", "", "192.168.0.7:80", &headers)),
            Some(Verdict::ALLOW)
        );
        assert_eq!(
            evaluate(&rules, &view("/robots.txt", "", "192.168.0.8:80", &headers)),
            Some(Verdict::deny(404))
        );
    }

    #[test]
    fn test_query_rule_and_path_miss() {
        let rules = vec![rule(RuleType::QueryString, &["key=abc"], 401)];
        let headers = HeaderMap::new();
        assert_eq!(
            evaluate(&rules, &view("/robots.txt", "a=1&key=abc", "1.2.3.4:1", &headers)),
            Some(Verdict::ALLOW)
        );
        assert_eq!(
            evaluate(&rules, &view("/robots.txt", "a=1", "1.2.3.4:1", &headers)),
            Some(Verdict::deny(401))
        );
        assert_eq!(evaluate(&rules, &view("/other", "", "1.2.3.4:1", &headers)), None);
    }

    #[test]
    fn test_path_case_does_not_bypass_rule() {
        let rules = vec![rule(RuleType::Header, &["bingbot"], 404)];
        let headers = HeaderMap::new();
        assert_eq!(
            evaluate(&rules, &view("/ROBOTS.TXT", "", "1.2.3.4:1", &headers)),
            Some(Verdict::deny(404))
        );
        assert_eq!(
            evaluate(&rules, &view("/Robots.txt", "", "1.2.3.4:1", &headers)),
            Some(Verdict::deny(404))
        );
    }

    #[test]
    fn test_header_rule_matches_non_utf8_value() {
        let rules = vec![rule(RuleType::Header, &["bingbot"], 404)];
        let mut headers = HeaderMap::new();
        headers.insert(
            "user-agent",
            HeaderValue::from_bytes(b"bingbot/2.0 (caf\xc3\xa9)").unwrap(),
        );
        assert!(headers["user-agent"].to_str().is_err());
        let req = view("/robots.txt", "", "10.0.0.1:5000", &headers);
        assert_eq!(evaluate(&rules, &req), Some(Verdict::ALLOW));
    }

    #[test]
    fn test_remote_ip() {
        assert_eq!(remote_ip("10.0.0.1:8080"), "10.0.0.1");
        assert_eq!(remote_ip("[fe80::1]:8080"), "fe80::1");
        assert_eq!(remote_ip("10.0.0.1"), "10.0.0.1");
        assert_eq!(remote_ip("::1"), "::1");
    }
}
