//! Remote artifact URIs.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Scheme of the distributed filesystem.
pub const DFS_SCHEME: &str = "dfs";

/// Location of a remote artifact:
/// `scheme://host[:port]/absolute/path[#fragment]`.
///
/// A missing scheme or host defers to the default filesystem configured on
/// the worker. The fragment names the symlink created in a task's working
/// directory; it is never part of the artifact's cache identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheUri {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    fragment: Option<String>,
}

impl CacheUri {
    /// Parses a URI string.
    ///
    /// Accepts both fully qualified forms (`dfs://host:8020/a/b#link`) and
    /// bare absolute paths (`/a/b#link`), which refer to the default
    /// filesystem.
    pub fn parse(s: &str) -> Result<Self> {
        if s.contains("://") {
            let url = Url::parse(s)
                .map_err(|e| Error::configuration(format!("malformed URI {s}: {e}")))?;
            Ok(Self {
                scheme: Some(url.scheme().to_string()),
                host: url.host_str().map(str::to_string),
                port: url.port(),
                path: url.path().to_string(),
                fragment: url
                    .fragment()
                    .filter(|f| !f.is_empty())
                    .map(str::to_string),
            })
        } else {
            let (path, fragment) = match s.split_once('#') {
                Some((p, f)) => (p, Some(f).filter(|f| !f.is_empty())),
                None => (s, None),
            };
            if path.is_empty() {
                return Err(Error::configuration(format!("URI {s} has no path")));
            }
            Ok(Self {
                scheme: None,
                host: None,
                port: None,
                path: path.to_string(),
                fragment: fragment.map(str::to_string),
            })
        }
    }

    /// Builds a fully qualified URI for `path` on the filesystem named
    /// `fs_name` (`host[:port]`).
    pub fn qualified(fs_name: &str, path: impl Into<String>) -> Result<Self> {
        let (host, port) = match fs_name.split_once(':') {
            Some((h, p)) => {
                let port = p.parse::<u16>().map_err(|_| {
                    Error::configuration(format!("malformed filesystem name {fs_name}"))
                })?;
                (h, Some(port))
            }
            None => (fs_name, None),
        };
        if host.is_empty() {
            return Err(Error::configuration(format!(
                "filesystem name {fs_name} has no host"
            )));
        }
        Ok(Self {
            scheme: Some(DFS_SCHEME.to_string()),
            host: Some(host.to_string()),
            port,
            path: path.into(),
            fragment: None,
        })
    }

    /// URI scheme, if present.
    #[must_use]
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// Host component, if present.
    #[must_use]
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Port, if present.
    #[must_use]
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Absolute path of the artifact on its filesystem.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fragment naming the work-dir symlink, if present.
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }
}

impl fmt::Display for CacheUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{scheme}://")?;
            if let Some(host) = &self.host {
                write!(f, "{host}")?;
            }
            if let Some(port) = self.port {
                write!(f, ":{port}")?;
            }
        }
        write!(f, "{}", self.path)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for CacheUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fully_qualified() {
        let uri = CacheUri::parse("dfs://nn1:8020/data/lookup.dat#lookup").unwrap();
        assert_eq!(uri.scheme(), Some("dfs"));
        assert_eq!(uri.host(), Some("nn1"));
        assert_eq!(uri.port(), Some(8020));
        assert_eq!(uri.path(), "/data/lookup.dat");
        assert_eq!(uri.fragment(), Some("lookup"));
    }

    #[test]
    fn test_parse_without_port_or_fragment() {
        let uri = CacheUri::parse("dfs://nn1/data/lookup.dat").unwrap();
        assert_eq!(uri.host(), Some("nn1"));
        assert_eq!(uri.port(), None);
        assert_eq!(uri.fragment(), None);
    }

    #[test]
    fn test_parse_bare_path() {
        let uri = CacheUri::parse("/data/map.zip#map").unwrap();
        assert_eq!(uri.scheme(), None);
        assert_eq!(uri.host(), None);
        assert_eq!(uri.path(), "/data/map.zip");
        assert_eq!(uri.fragment(), Some("map"));
    }

    #[test]
    fn test_parse_empty_fragment_is_none() {
        let uri = CacheUri::parse("/data/map.zip#").unwrap();
        assert_eq!(uri.fragment(), None);
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(CacheUri::parse("").is_err());
        assert!(CacheUri::parse("#frag").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for s in [
            "dfs://nn1:8020/data/lookup.dat#lookup",
            "dfs://nn1/data/lookup.dat",
            "/data/map.zip#map",
            "/data/map.zip",
        ] {
            let uri = CacheUri::parse(s).unwrap();
            assert_eq!(uri.to_string(), s);
            assert_eq!(CacheUri::parse(&uri.to_string()).unwrap(), uri);
        }
    }

    #[test]
    fn test_qualified() {
        let uri = CacheUri::qualified("nn1:8020", "/lib/app.jar").unwrap();
        assert_eq!(uri.to_string(), "dfs://nn1:8020/lib/app.jar");

        let uri = CacheUri::qualified("nn1", "/lib/app.jar").unwrap();
        assert_eq!(uri.to_string(), "dfs://nn1/lib/app.jar");

        assert!(CacheUri::qualified("", "/lib/app.jar").is_err());
        assert!(CacheUri::qualified("nn1:notaport", "/lib/app.jar").is_err());
    }
}
