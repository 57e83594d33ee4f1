//! RDAP server mappings.
//!
//! This module maps TLDs to the RDAP servers that answer for them directly
//! and builds request URLs for direct servers, the generic registry
//! bootstrap service and the IANA TLD endpoint.

use crate::types::ScanConfig;
use crate::utils::normalize_tld;
use std::collections::HashMap;

/// Generic bootstrap service that answers for (or redirects to) any TLD.
pub const GENERIC_REGISTRY_URL: &str = "https://rdap.org/domain/{domain}";

/// IANA RDAP endpoint used for the TLD support check.
pub const IANA_RDAP_URL: &str = "https://rdap.iana.org/domain/{domain}";

/// Placeholder substituted with the domain in URL templates.
const DOMAIN_PLACEHOLDER: &str = "{domain}";

/// Get the built-in direct RDAP server mappings.
///
/// Keys are TLD specs (with leading dot), values are URL templates.
pub fn get_direct_server_map() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        // SWITCH runs both the Swiss and the Liechtenstein registry
        (".ch", "https://rdap.nic.ch/domain/{domain}"),
        (".li", "https://rdap.nic.ch/domain/{domain}"),
        (".de", "https://rdap.denic.de/domain/{domain}"),
    ])
}

/// Build a request URL from a template.
///
/// Templates either contain `{domain}` or are base URLs the domain is
/// appended to (e.g. "https://rdap.verisign.com/com/v1/domain/").
pub fn render_url(template: &str, domain: &str) -> String {
    if template.contains(DOMAIN_PLACEHOLDER) {
        template.replace(DOMAIN_PLACEHOLDER, domain)
    } else if template.ends_with('/') {
        format!("{}{}", template, domain)
    } else {
        format!("{}/{}", template, domain)
    }
}

/// Resolved server table for one resolver instance.
#[derive(Debug, Clone)]
pub struct ServerRegistry {
    direct: HashMap<String, String>,
    generic: String,
    iana: String,
}

impl ServerRegistry {
    /// Built-in direct servers plus the ones configured in `config`.
    pub fn from_config(config: &ScanConfig) -> Self {
        let mut direct: HashMap<String, String> = get_direct_server_map()
            .into_iter()
            .map(|(tld, url)| (tld.to_string(), url.to_string()))
            .collect();

        for (tld, url) in &config.direct_servers {
            direct.insert(normalize_tld(tld), url.clone());
        }

        Self {
            direct,
            generic: config.generic_registry_url.clone(),
            iana: config.iana_url.clone(),
        }
    }

    /// Direct server URL for `domain`, if its TLD has one.
    pub fn direct_url(&self, tld: &str, domain: &str) -> Option<String> {
        self.direct
            .get(tld)
            .map(|template| render_url(template, domain))
    }

    pub fn has_direct(&self, tld: &str) -> bool {
        self.direct.contains_key(tld)
    }

    pub fn generic_url(&self, domain: &str) -> String {
        render_url(&self.generic, domain)
    }

    /// IANA URL for a TLD (queried by label, without the dot).
    pub fn iana_url(&self, tld: &str) -> String {
        render_url(&self.iana, tld.trim_start_matches('.'))
    }

    /// TLDs with a direct server, sorted.
    pub fn direct_tlds(&self) -> Vec<String> {
        let mut tlds: Vec<String> = self.direct.keys().cloned().collect();
        tlds.sort();
        tlds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_direct_servers() {
        let map = get_direct_server_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(".ch"), map.get(".li"));
        assert!(map[".de"].contains("denic"));
    }

    #[test]
    fn test_render_url() {
        assert_eq!(
            render_url(GENERIC_REGISTRY_URL, "example.io"),
            "https://rdap.org/domain/example.io"
        );
        assert_eq!(
            render_url("https://rdap.verisign.com/com/v1/domain/", "example.com"),
            "https://rdap.verisign.com/com/v1/domain/example.com"
        );
        assert_eq!(
            render_url("https://rdap.example/domain", "x.test"),
            "https://rdap.example/domain/x.test"
        );
    }

    #[test]
    fn test_registry_merges_config_servers() {
        let config = ScanConfig::default()
            .with_direct_server("com", "https://rdap.verisign.com/com/v1/domain/");
        let registry = ServerRegistry::from_config(&config);

        assert_eq!(
            registry.direct_url(".com", "google.com"),
            Some("https://rdap.verisign.com/com/v1/domain/google.com".to_string())
        );
        assert_eq!(
            registry.direct_url(".ch", "test.ch"),
            Some("https://rdap.nic.ch/domain/test.ch".to_string())
        );
        assert!(registry.direct_url(".io", "test.io").is_none());
        assert_eq!(registry.direct_tlds(), vec![".ch", ".com", ".de", ".li"]);
    }

    #[test]
    fn test_iana_url_strips_dot() {
        let registry = ServerRegistry::from_config(&ScanConfig::default());
        assert_eq!(registry.iana_url(".dev"), "https://rdap.iana.org/domain/dev");
    }
}
