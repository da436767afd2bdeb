use std::collections::BTreeSet;

use url::{Host, Url};

use crate::error::ConstructionError;

/// The single origin a pool talks to.
///
/// URLs are normalised down to `(host, port)`; paths and queries differ per
/// task but every task must share this binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostBinding {
    pub host: String,
    pub port: u16,
}

impl HostBinding {
    /// Default port for the TLS transport.
    pub const HTTPS_PORT: u16 = 443;

    /// `host:port` form for socket connects. IPv6 literals are bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Value for the `Host` request header: the port is omitted when it is the
    /// scheme default.
    pub fn host_header(&self) -> String {
        if self.port == Self::HTTPS_PORT || self.port == 80 {
            if self.host.contains(':') {
                format!("[{}]", self.host)
            } else {
                self.host.clone()
            }
        } else {
            self.authority()
        }
    }

    /// Derive the binding shared by every locator.
    ///
    /// Fails when a locator is not an `http`/`https` URL with a host, when
    /// the list is empty, or when more than one distinct `host:port` appears.
    /// IPv6 hosts are stored without brackets.
    pub fn from_urls(urls: &[Url]) -> Result<Self, ConstructionError> {
        let mut seen: BTreeSet<(String, u16)> = BTreeSet::new();
        for url in urls {
            let invalid = || ConstructionError::InvalidLocator {
                locator: url.to_string(),
            };
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid());
            }
            let host = match url.host() {
                Some(Host::Domain(name)) if !name.is_empty() => name.to_ascii_lowercase(),
                Some(Host::Ipv4(addr)) => addr.to_string(),
                Some(Host::Ipv6(addr)) => addr.to_string(),
                _ => return Err(invalid()),
            };
            let port = url.port_or_known_default().unwrap_or(Self::HTTPS_PORT);
            seen.insert((host, port));
        }

        let mut iter = seen.into_iter();
        match (iter.next(), iter.next()) {
            (None, _) => Err(ConstructionError::NoHost),
            (Some((host, port)), None) => Ok(Self { host, port }),
            (Some(first), Some(second)) => {
                let hosts = [first, second]
                    .into_iter()
                    .chain(iter)
                    .map(|(host, port)| Self { host, port }.authority())
                    .collect();
                Err(ConstructionError::MultipleHosts { hosts })
            }
        }
    }
}

/// Parse raw locator strings, reporting the first one that is not a URL.
pub fn parse_locators<S: AsRef<str>>(locators: &[S]) -> Result<Vec<Url>, ConstructionError> {
    locators
        .iter()
        .map(|s| {
            Url::parse(s.as_ref()).map_err(|_| ConstructionError::InvalidLocator {
                locator: s.as_ref().to_string(),
            })
        })
        .collect()
}
