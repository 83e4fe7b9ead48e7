//! DNS resolver construction and mail-exchanger lookup.

use crate::core::config::Config;
use crate::core::error::{AppError, Result};

use std::net::{IpAddr, SocketAddr};
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

/// The preferred mail exchanger for a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailServer {
    pub exchange: String,
    pub preference: u16,
}

/// Builds a Tokio DNS resolver from the configured servers and timeout.
/// Falls back to the system defaults when no servers are configured or
/// none of them parse as IP addresses.
pub async fn create_resolver(config: &Config) -> Result<TokioAsyncResolver> {
    let mut opts = ResolverOpts::default();
    opts.timeout = config.dns_timeout;
    opts.attempts = 2;

    let mut resolver_config = ResolverConfig::new();
    let mut added = 0usize;
    for server in &config.dns_servers {
        match server.parse::<IpAddr>() {
            Ok(ip) => {
                resolver_config.add_name_server(NameServerConfig::new(
                    SocketAddr::new(ip, 53),
                    Protocol::Udp,
                ));
                added += 1;
            }
            Err(_) => {
                tracing::warn!("Ignoring unparseable DNS server address: {}", server);
            }
        }
    }

    let resolver = if added == 0 {
        tracing::debug!("No usable DNS servers configured; using system defaults.");
        TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
    } else {
        TokioAsyncResolver::tokio(resolver_config, opts)
    };

    Ok(resolver)
}

/// Resolves the lowest-preference MX record for `domain`.
///
/// Error mapping matters to the caller's policy decisions:
/// * `NxDomain` / `NoDnsRecords` — the domain definitively cannot receive
///   mail; callers reject.
/// * `Dns` — timeout or resolver trouble; callers may assume validity.
pub async fn resolve_mail_server(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<MailServer> {
    tracing::debug!(target: "dns_task", "Resolving MX records for {}", domain);

    let lookup = match resolver.mx_lookup(domain).await {
        Ok(lookup) => lookup,
        Err(e) => {
            return Err(match e.kind() {
                ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                    if *response_code == ResponseCode::NXDomain {
                        AppError::NxDomain(domain.to_string())
                    } else {
                        AppError::NoDnsRecords(domain.to_string())
                    }
                }
                ResolveErrorKind::Timeout => {
                    AppError::Dns(format!("MX lookup timed out for {}", domain))
                }
                _ => AppError::Dns(format!("MX lookup failed for {}: {}", domain, e)),
            });
        }
    };

    let best = lookup
        .iter()
        .min_by_key(|mx| mx.preference())
        .ok_or_else(|| AppError::NoDnsRecords(domain.to_string()))?;

    let exchange = best.exchange().to_utf8();
    let exchange = exchange.trim_end_matches('.').to_string();
    if exchange.is_empty() {
        return Err(AppError::NoDnsRecords(domain.to_string()));
    }

    tracing::debug!(target: "dns_task",
        "Preferred MX for {}: {} (pref {})", domain, exchange, best.preference());

    Ok(MailServer {
        exchange,
        preference: best.preference(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ConfigBuilder;

    #[tokio::test]
    async fn resolver_builds_from_defaults() {
        let config = ConfigBuilder::new().build().unwrap();
        assert!(create_resolver(&config).await.is_ok());
    }

    #[tokio::test]
    async fn resolver_tolerates_bad_server_entries() {
        let config = ConfigBuilder::new()
            .dns_servers(vec!["not-an-ip".into()])
            .build()
            .unwrap();
        // Unparseable entries are skipped and the system default is used.
        assert!(create_resolver(&config).await.is_ok());
    }
}
