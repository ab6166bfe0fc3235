//! Tenant route helpers.

/// Tenant slug from a path such as `/portal/acme/settings`, given the portal
/// prefix `/portal`. Query strings and fragments are ignored.
pub fn extract_tenant_slug<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let prefix = prefix.trim_end_matches('/');
    let rest = path.strip_prefix(prefix)?;
    let rest = rest.strip_prefix('/')?;
    rest.split('/').next().filter(|s| !s.is_empty())
}

pub fn canonical_tenant_route(prefix: &str, slug: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), slug)
}

/// Whether `path` is one of the tenant-agnostic entry routes.
pub fn is_entry_route(path: &str, entry_routes: &[String]) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let normalized = match path.trim_end_matches('/') {
        "" => "/",
        p => p,
    };
    entry_routes.iter().any(|r| {
        let r = match r.trim_end_matches('/') {
            "" => "/",
            r => r,
        };
        r == normalized
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_slug() {
        assert_eq!(extract_tenant_slug("/portal/acme", "/portal"), Some("acme"));
        assert_eq!(
            extract_tenant_slug("/portal/acme/settings?tab=1", "/portal/"),
            Some("acme")
        );
        assert_eq!(extract_tenant_slug("/portal", "/portal"), None);
        assert_eq!(extract_tenant_slug("/portal/", "/portal"), None);
        assert_eq!(extract_tenant_slug("/portals/acme", "/portal"), None);
        assert_eq!(extract_tenant_slug("/admin/acme", "/portal"), None);
    }

    #[test]
    fn canonical_route() {
        assert_eq!(canonical_tenant_route("/portal/", "acme"), "/portal/acme");
    }

    #[test]
    fn entry_routes_match_with_trailing_slash() {
        let entries = vec!["/".to_string(), "/portal".to_string()];
        assert!(is_entry_route("/", &entries));
        assert!(is_entry_route("/portal/", &entries));
        assert!(is_entry_route("/portal?x=1", &entries));
        assert!(!is_entry_route("/portal/acme", &entries));
    }
}
