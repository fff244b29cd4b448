//! Detection of a Windows domain environment.

use tracing::debug;

const WORKGROUP: &str = "WORKGROUP";

/// Decides from environment variables whether the host is domain-joined.
///
/// - `USERDOMAIN` set, different from `COMPUTERNAME` and not `WORKGROUP`
/// - or `USERDNSDOMAIN` set and non-blank
pub fn detect_domain_environment<F>(env: F) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| env(name).map(|v| v.trim().to_uppercase()).unwrap_or_default();

    let user_domain = get("USERDOMAIN");
    let computer_name = get("COMPUTERNAME");
    if !user_domain.is_empty()
        && !computer_name.is_empty()
        && user_domain != computer_name
        && user_domain != WORKGROUP
    {
        debug!(domain = %user_domain, "domain detected via USERDOMAIN");
        return true;
    }

    let dns_domain = get("USERDNSDOMAIN");
    if !dns_domain.is_empty() {
        debug!(domain = %dns_domain, "domain detected via USERDNSDOMAIN");
        return true;
    }

    debug!("no domain environment detected");
    false
}

/// [`detect_domain_environment`] against the process environment.
pub fn detect_domain_from_env() -> bool {
    detect_domain_environment(|name| std::env::var(name).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_user_domain_differs_from_computer() {
        assert!(detect_domain_environment(env(&[
            ("USERDOMAIN", "CORP"),
            ("COMPUTERNAME", "WS-01"),
        ])));
    }

    #[test]
    fn test_local_account_is_not_domain() {
        assert!(!detect_domain_environment(env(&[
            ("USERDOMAIN", "ws-01"),
            ("COMPUTERNAME", "WS-01"),
        ])));
    }

    #[test]
    fn test_workgroup_is_not_domain() {
        assert!(!detect_domain_environment(env(&[
            ("USERDOMAIN", "WORKGROUP"),
            ("COMPUTERNAME", "WS-01"),
        ])));
    }

    #[test]
    fn test_dns_domain() {
        assert!(detect_domain_environment(env(&[("USERDNSDOMAIN", "corp.example.com")])));
        assert!(!detect_domain_environment(env(&[("USERDNSDOMAIN", "   ")])));
    }

    #[test]
    fn test_empty_environment() {
        assert!(!detect_domain_environment(env(&[])));
    }
}
