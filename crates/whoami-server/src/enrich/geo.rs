use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

/// Upper bound on a single location lookup.
pub const GEO_LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Approximate location of a client. Every field is optional; private and
/// loopback addresses resolve to all-`None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoLocation {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Resolves an IP string to an approximate location.
pub trait GeoResolver: Send + Sync + 'static {
    fn lookup(&self, ip: &str) -> GeoLocation;
}

/// Resolver used when no GeoIP database is available.
pub struct NoGeo;

impl GeoResolver for NoGeo {
    fn lookup(&self, _ip: &str) -> GeoLocation {
        GeoLocation::default()
    }
}

/// MaxMind city database loaded into memory once at startup.
pub struct MaxMindGeo {
    reader: maxminddb::Reader<Vec<u8>>,
}

impl MaxMindGeo {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let reader = maxminddb::Reader::open_readfile(path.as_ref())?;
        Ok(Self { reader })
    }
}

impl GeoResolver for MaxMindGeo {
    fn lookup(&self, ip: &str) -> GeoLocation {
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return GeoLocation::default();
        };

        let record: maxminddb::geoip2::City = match self.reader.lookup(addr) {
            Ok(Some(record)) => record,
            Ok(None) => return GeoLocation::default(),
            Err(e) => {
                warn!(ip, error = %e, "GeoIP lookup failed");
                return GeoLocation::default();
            }
        };

        GeoLocation {
            city: record
                .city
                .as_ref()
                .and_then(|c| english(c.names.as_ref())),
            region: record
                .subdivisions
                .as_ref()
                .and_then(|subs| subs.first())
                .and_then(|sub| english(sub.names.as_ref())),
            country: record
                .country
                .as_ref()
                .and_then(|c| c.iso_code)
                .map(|s| s.to_string()),
            latitude: record.location.as_ref().and_then(|l| l.latitude),
            longitude: record.location.as_ref().and_then(|l| l.longitude),
        }
    }
}

fn english(names: Option<&BTreeMap<&str, &str>>) -> Option<String> {
    names.and_then(|names| names.get("en")).map(|s| s.to_string())
}

/// Open the GeoIP database at `path`, or fall back to [`NoGeo`] when it is
/// missing or unreadable. Never fatal.
pub fn open_resolver(path: &str) -> Arc<dyn GeoResolver> {
    if !Path::new(path).exists() {
        warn!(
            geoip_path = %path,
            "GeoIP database not found. Locations will be empty. \
             Set WHOAMI_GEOIP_PATH to a GeoLite2/DB-IP City .mmdb file."
        );
        return Arc::new(NoGeo);
    }

    match MaxMindGeo::open(path) {
        Ok(geo) => {
            info!(geoip_path = %path, "GeoIP database loaded");
            Arc::new(geo)
        }
        Err(e) => {
            warn!(geoip_path = %path, error = %e, "GeoIP database unreadable, locations disabled");
            Arc::new(NoGeo)
        }
    }
}

/// Look up `ip` on a blocking thread, giving up after
/// [`GEO_LOOKUP_TIMEOUT`].
pub async fn lookup_bounded(resolver: Arc<dyn GeoResolver>, ip: String) -> GeoLocation {
    let lookup = tokio::task::spawn_blocking(move || resolver.lookup(&ip));
    match tokio::time::timeout(GEO_LOOKUP_TIMEOUT, lookup).await {
        Ok(Ok(location)) => location,
        Ok(Err(e)) => {
            warn!(error = %e, "GeoIP lookup task failed");
            GeoLocation::default()
        }
        Err(_) => {
            warn!(
                timeout_ms = GEO_LOOKUP_TIMEOUT.as_millis() as u64,
                "GeoIP lookup timed out"
            );
            GeoLocation::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowGeo;

    impl GeoResolver for SlowGeo {
        fn lookup(&self, _ip: &str) -> GeoLocation {
            std::thread::sleep(Duration::from_secs(3));
            GeoLocation {
                country: Some("XX".to_string()),
                ..GeoLocation::default()
            }
        }
    }

    #[test]
    fn missing_database_falls_back_to_empty_locations() {
        let resolver = open_resolver("/nonexistent/GeoLite2-City.mmdb");
        assert_eq!(resolver.lookup("8.8.8.8"), GeoLocation::default());
    }

    #[test]
    fn location_serializes_missing_fields_as_null() {
        let json = serde_json::to_value(GeoLocation::default()).expect("serialize");
        for field in ["city", "region", "country", "latitude", "longitude"] {
            assert!(json[field].is_null(), "{field} should be null");
        }
    }

    #[tokio::test]
    async fn slow_lookup_is_abandoned() {
        let started = std::time::Instant::now();
        let location = lookup_bounded(Arc::new(SlowGeo), "1.2.3.4".to_string()).await;
        assert_eq!(location, GeoLocation::default());
        assert!(started.elapsed() < Duration::from_millis(2_900));
    }
}
