//! Certificate lookup collaborator.
//!
//! The engine never issues or renews certificates; it only asks whether one
//! is obtainable for a domain before accepting SSL termination.

use std::collections::HashSet;
use std::path::PathBuf;

/// Answers "can the gateway present a certificate for this domain?".
///
/// Lookups may block on the filesystem; async callers run anything that
/// consults the store on the blocking pool.
pub trait CertificateStore: Send + Sync {
    fn has_certificate(&self, domain: &str) -> bool;
}

/// Looks for `<dir>/<domain>.pem`, the bundle layout the gateway loads.
#[derive(Debug, Clone)]
pub struct DirCertificateStore {
    dir: PathBuf,
}

impl DirCertificateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CertificateStore for DirCertificateStore {
    fn has_certificate(&self, domain: &str) -> bool {
        let path = self.dir.join(format!("{}.pem", domain));
        let found = path.is_file();
        tracing::debug!(domain = %domain, path = ?path, found, "Certificate lookup");
        found
    }
}

/// Fixed set of domains with certificates.
#[derive(Debug, Clone, Default)]
pub struct StaticCertificates {
    domains: HashSet<String>,
}

impl StaticCertificates {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }

    /// No certificates at all.
    pub fn none() -> Self {
        Self::default()
    }
}

impl CertificateStore for StaticCertificates {
    fn has_certificate(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }
}
