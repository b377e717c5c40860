//! DNS resolution with static fallback addresses for the API host.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::{debug, warn};

/// Resolves through system DNS. For the API host, falls back to a fixed set
/// of addresses when the system lookup fails or returns nothing.
#[derive(Debug, Clone)]
pub struct FallbackResolver {
    host: String,
    fallback: Arc<[IpAddr]>,
}

impl FallbackResolver {
    /// A resolver that uses `fallback` for `host` only.
    #[must_use]
    pub fn new(host: impl Into<String>, fallback: Vec<IpAddr>) -> Self {
        Self {
            host: host.into(),
            fallback: fallback.into(),
        }
    }

    /// Resolve `host`, returning addresses with port 0.
    ///
    /// # Errors
    ///
    /// Returns the system lookup error when no fallback applies.
    pub async fn lookup(&self, host: &str) -> io::Result<Vec<SocketAddr>> {
        let fallback = host
            .eq_ignore_ascii_case(&self.host)
            .then(|| Arc::clone(&self.fallback));
        lookup_with_fallback(host, fallback).await
    }
}

async fn lookup_with_fallback(
    host: &str,
    fallback: Option<Arc<[IpAddr]>>,
) -> io::Result<Vec<SocketAddr>> {
    let system = tokio::net::lookup_host((host, 0))
        .await
        .map(Iterator::collect::<Vec<_>>);

    match system {
        Ok(addrs) if !addrs.is_empty() => {
            debug!(host, count = addrs.len(), "Resolved via system DNS");
            Ok(addrs)
        }
        other => {
            let Some(ips) = fallback.filter(|ips| !ips.is_empty()) else {
                return other.and_then(|_| {
                    Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("no addresses found for {host}"),
                    ))
                });
            };
            match &other {
                Err(e) => warn!(host, error = %e, "System DNS failed, using fallback addresses"),
                Ok(_) => warn!(host, "System DNS returned no addresses, using fallback addresses"),
            }
            Ok(ips.iter().map(|ip| SocketAddr::new(*ip, 0)).collect())
        }
    }
}

impl Resolve for FallbackResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move {
            match resolver.lookup(name.as_str()).await {
                Ok(addrs) => Ok(Box::new(addrs.into_iter()) as Addrs),
                Err(e) => Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback_ip() -> IpAddr {
        "35.167.208.187".parse().unwrap()
    }

    #[tokio::test]
    async fn test_fallback_used_for_api_host() {
        let resolver = FallbackResolver::new("flightq.invalid", vec![fallback_ip()]);
        let addrs = resolver.lookup("flightq.invalid").await.unwrap();
        assert_eq!(addrs, vec![SocketAddr::new(fallback_ip(), 0)]);
    }

    #[tokio::test]
    async fn test_host_match_ignores_case() {
        let resolver = FallbackResolver::new("flightq.invalid", vec![fallback_ip()]);
        assert!(resolver.lookup("FLIGHTQ.invalid").await.is_ok());
    }

    #[tokio::test]
    async fn test_other_hosts_get_no_fallback() {
        let resolver = FallbackResolver::new("flightq.invalid", vec![fallback_ip()]);
        assert!(resolver.lookup("elsewhere.invalid").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_fallback_reports_error() {
        let resolver = FallbackResolver::new("flightq.invalid", Vec::new());
        assert!(resolver.lookup("flightq.invalid").await.is_err());
    }

    #[tokio::test]
    async fn test_ip_literal_resolves_without_fallback() {
        let resolver = FallbackResolver::new("flightq.invalid", Vec::new());
        let addrs = resolver.lookup("127.0.0.1").await.unwrap();
        assert_eq!(addrs[0].ip(), "127.0.0.1".parse::<IpAddr>().unwrap());
    }
}
