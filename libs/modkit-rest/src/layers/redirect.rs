//! Redirect policy for the default transport.
//!
//! Wraps [`RedirectConfig`] as a `tower-http` [`Policy`]: hops are counted,
//! HTTPS to HTTP downgrades and (by default) cross-origin hops stop the chain,
//! and credential headers never follow a request to another origin.

use crate::config::RedirectConfig;
use http::{Request, Uri, header};
use std::sync::Arc;
use tower_http::follow_redirect::policy::{Action, Attempt, Policy};

/// Removed from every request after the chain has left the original origin
const SENSITIVE_HEADERS: [header::HeaderName; 3] = [
    header::AUTHORIZATION,
    header::COOKIE,
    header::PROXY_AUTHORIZATION,
];

/// Scheme, host and effective port of a URI.
///
/// A missing scheme is read as `https` so comparisons never assume plain HTTP.
#[derive(Debug, PartialEq, Eq)]
struct Origin<'a> {
    scheme: &'a str,
    host: &'a str,
    port: u16,
}

impl<'a> Origin<'a> {
    fn of(uri: &'a Uri) -> Self {
        let scheme = uri.scheme_str().unwrap_or("https");
        let port = uri.port_u16().unwrap_or(match scheme {
            "http" => 80,
            "https" => 443,
            _ => 0,
        });
        Self {
            scheme,
            host: uri.host().unwrap_or_default(),
            port,
        }
    }

    fn is_downgrade_to(&self, target: &Origin<'_>) -> bool {
        self.scheme == "https" && target.scheme == "http"
    }
}

/// `tower-http` redirect policy driven by [`RedirectConfig`].
///
/// `FollowRedirect` clones the policy for every request, so the hop counter
/// and the cross-origin flag are per call.
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    config: Arc<RedirectConfig>,
    hops: usize,
    left_origin: bool,
}

impl RedirectPolicy {
    #[must_use]
    pub fn new(config: RedirectConfig) -> Self {
        Self {
            config: Arc::new(config),
            hops: 0,
            left_origin: false,
        }
    }

    /// Decide whether the hop from `previous` to `location` is followed
    fn decide(&mut self, previous: &Uri, location: &Uri) -> Action {
        self.hops += 1;
        if self.hops > self.config.max_redirects {
            tracing::debug!(
                hops = self.hops,
                max = self.config.max_redirects,
                "redirect limit reached"
            );
            return Action::Stop;
        }

        let from = Origin::of(previous);
        let to = Origin::of(location);

        if from.is_downgrade_to(&to) && !self.config.allow_https_downgrade {
            tracing::warn!(from = %previous, to = %location, "refusing https to http redirect");
            return Action::Stop;
        }

        if from != to {
            let allowed = self.config.allowed_redirect_hosts.contains(to.host);
            if self.config.same_origin_only && !allowed {
                tracing::warn!(from = %previous, to = %location, "refusing cross-origin redirect");
                return Action::Stop;
            }
            self.left_origin = true;
        }

        Action::Follow
    }

    fn strip_credentials(&self, headers: &mut http::HeaderMap) {
        if !(self.left_origin && self.config.strip_sensitive_headers) {
            return;
        }
        for name in &SENSITIVE_HEADERS {
            if headers.remove(name).is_some() {
                tracing::debug!(header = %name, "dropped credential header on cross-origin redirect");
            }
        }
    }
}

impl<B: Clone, E> Policy<B, E> for RedirectPolicy {
    fn redirect(&mut self, attempt: &Attempt<'_>) -> Result<Action, E> {
        Ok(self.decide(attempt.previous(), attempt.location()))
    }

    fn on_request(&mut self, request: &mut Request<B>) {
        self.strip_credentials(request.headers_mut());
    }

    fn clone_body(&self, body: &B) -> Option<B> {
        // 307/308 replay the original body
        Some(body.clone())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    fn follows(action: &Action) -> bool {
        matches!(action, Action::Follow)
    }

    fn credentials() -> http::HeaderMap {
        let mut headers = http::HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        headers.insert(header::COOKIE, "session=1".parse().unwrap());
        headers.insert(header::ACCEPT, "application/json".parse().unwrap());
        headers
    }

    #[test]
    fn test_origin_uses_default_ports() {
        assert_eq!(
            Origin::of(&uri("https://api.example.com/a")),
            Origin::of(&uri("https://api.example.com:443/b"))
        );
        assert_ne!(
            Origin::of(&uri("https://api.example.com/a")),
            Origin::of(&uri("https://api.example.com:8443/a"))
        );
        assert_ne!(
            Origin::of(&uri("http://api.example.com/a")),
            Origin::of(&uri("https://api.example.com/a"))
        );
    }

    #[test]
    fn test_same_origin_followed_with_credentials() {
        let mut policy = RedirectPolicy::new(RedirectConfig::default());
        let action = policy.decide(
            &uri("https://api.example.com/old"),
            &uri("https://api.example.com/new"),
        );
        assert!(follows(&action));

        let mut headers = credentials();
        policy.strip_credentials(&mut headers);
        assert!(headers.contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn test_cross_origin_stopped_by_default() {
        let mut policy = RedirectPolicy::new(RedirectConfig::default());
        let action = policy.decide(
            &uri("https://api.example.com/old"),
            &uri("https://evil.example.net/steal"),
        );
        assert!(!follows(&action));
    }

    #[test]
    fn test_allow_listed_host_followed_without_credentials() {
        let mut policy = RedirectPolicy::new(RedirectConfig {
            allowed_redirect_hosts: HashSet::from(["cdn.example.com".to_owned()]),
            ..RedirectConfig::default()
        });
        let action = policy.decide(
            &uri("https://api.example.com/file"),
            &uri("https://cdn.example.com/file"),
        );
        assert!(follows(&action));

        let mut headers = credentials();
        policy.strip_credentials(&mut headers);
        assert!(!headers.contains_key(header::AUTHORIZATION));
        assert!(!headers.contains_key(header::COOKIE));
        assert!(headers.contains_key(header::ACCEPT));
    }

    #[test]
    fn test_stripping_can_be_disabled() {
        let mut policy = RedirectPolicy::new(RedirectConfig {
            strip_sensitive_headers: false,
            ..RedirectConfig::permissive()
        });
        let action = policy.decide(
            &uri("https://api.example.com/a"),
            &uri("https://other.example.com/b"),
        );
        assert!(follows(&action));

        let mut headers = credentials();
        policy.strip_credentials(&mut headers);
        assert!(headers.contains_key(header::AUTHORIZATION));
    }

    #[test]
    fn test_downgrade_stopped_unless_allowed() {
        let mut strict = RedirectPolicy::new(RedirectConfig::permissive());
        let action = strict.decide(
            &uri("https://api.example.com/a"),
            &uri("http://api.example.com/a"),
        );
        assert!(!follows(&action));

        let mut testing = RedirectPolicy::new(RedirectConfig::for_testing());
        let action = testing.decide(
            &uri("https://api.example.com/a"),
            &uri("http://api.example.com/a"),
        );
        assert!(follows(&action));
    }

    #[test]
    fn test_hop_limit() {
        let mut policy = RedirectPolicy::new(RedirectConfig {
            max_redirects: 2,
            ..RedirectConfig::default()
        });
        let from = uri("https://api.example.com/a");
        let to = uri("https://api.example.com/b");
        assert!(follows(&policy.decide(&from, &to)));
        assert!(follows(&policy.decide(&to, &from)));
        assert!(!follows(&policy.decide(&from, &to)));

        let mut disabled = RedirectPolicy::new(RedirectConfig::disabled());
        assert!(!follows(&disabled.decide(&from, &to)));
    }
}
