//! Version resolution.
//!
//! Every server publishes the resource version its manifest and assets are
//! stored under. It is resolved fresh on every run; the cached value from the
//! previous run is only reported for comparison.

use crate::error::{ErrorKind, Result};
use crate::{Endpoints, HttpClient, Remote};
use sanity_cache::{Fingerprints, VersionInfo};
use sanity_config::Server;
use serde_json::Value;

/// Resolve the current version of `server` and record it in the version cache.
#[tracing::instrument(skip_all, fields(server = %server))]
pub async fn resolve<C: HttpClient>(
    remote: &Remote<C>,
    server: Server,
    endpoints: &Endpoints,
    fingerprints: &Fingerprints,
) -> Result<VersionInfo> {
    let document: Value = remote.get_json(&endpoints.version_url).await?;
    let version = parse(&document)?;
    match fingerprints.version(server) {
        Some(previous) if previous == version => {
            tracing::info!(resource = %version.resource, "Version unchanged since last run");
        },
        Some(previous) => {
            tracing::info!(resource = %version.resource, previous = %previous.resource, "Version changed");
        },
        None => tracing::info!(resource = %version.resource, client = %version.client, "Version resolved"),
    }
    fingerprints.set_version(server, version.clone());
    Ok(version)
}

/// Read the version fields out of a version document.
pub fn parse(document: &Value) -> Result<VersionInfo> {
    let field = |name: &str| -> Result<String> {
        match document.get(name).and_then(Value::as_str) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => exn::bail!(ErrorKind::Protocol(format!("version document has no `{name}`"))),
        }
    };
    Ok(VersionInfo {
        resource: field("resVersion")?,
        client: field("clientVersion")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockClient, RetryPolicy};
    use sanity_cache::{AssetCache, VersionCache};
    use serde_json::json;

    fn fingerprints() -> Fingerprints {
        Fingerprints::new("/unused", AssetCache::default(), VersionCache::default())
    }

    #[test]
    fn test_parse() {
        let version = parse(&json!({"resVersion": "24-01-01-abc", "clientVersion": "2.1.41", "extra": 1})).unwrap();
        assert_eq!(version.resource, "24-01-01-abc");
        assert_eq!(version.client, "2.1.41");
    }

    #[test]
    fn test_parse_missing_field() {
        let err = parse(&json!({"resVersion": "24-01-01-abc"})).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Protocol(_)));
        assert!(parse(&json!(["not", "an", "object"])).is_err());
    }

    #[tokio::test]
    async fn test_resolve_records_version() {
        let endpoints = Endpoints::official(Server::En);
        let client = MockClient::new().with_json(
            endpoints.version_url.clone(),
            &json!({"resVersion": "r1", "clientVersion": "c1"}),
        );
        let remote = Remote::new(client, RetryPolicy::immediate(1));
        let fingerprints = fingerprints();
        let version = resolve(&remote, Server::En, &endpoints, &fingerprints).await.unwrap();
        assert_eq!(fingerprints.version(Server::En), Some(version));
        assert_eq!(fingerprints.version(Server::Cn), None);
    }

    #[tokio::test]
    async fn test_resolve_network_failure() {
        let endpoints = Endpoints::official(Server::Cn);
        let remote = Remote::new(MockClient::new().with_unreachable(endpoints.version_url.clone()), RetryPolicy::immediate(2));
        let fingerprints = fingerprints();
        let err = resolve(&remote, Server::Cn, &endpoints, &fingerprints).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Network(_)));
        assert_eq!(fingerprints.version(Server::Cn), None);
    }
}
