//! # Shorthand URL Resolver
//!
//! Rewrites the platform's `adhar://<category>/<component>[/<subpath>]` URL scheme
//! against configured base URLs.
//!
//! Resolution is total over syntactically valid shorthands and idempotent on
//! already-resolved URLs: a string without the `adhar://` prefix passes through
//! unchanged, and a shorthand is never rewritten twice.

use std::sync::LazyLock;

use regex::Regex;

use crate::constants::SHORTHAND_SCHEME;

/// Base URLs a shorthand is resolved against.
#[derive(Debug, Clone)]
pub struct ResolverBases {
    /// Base URL for platform/application package categories.
    pub packages_base_url: String,
    /// Base URL for the `environments` category.
    pub environments_base_url: String,
}

/// A shorthand reference failed validation.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid adhar:// shorthand `{0}`: path is empty or contains disallowed characters")]
pub struct InvalidShorthand(pub String);

static SHORTHAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"adhar://[A-Za-z0-9_\-/]+").expect("shorthand pattern is a valid regex literal")
});

const ENVIRONMENTS_CATEGORY: &str = "environments/";
const PACKAGES_CATEGORY: &str = "packages/";

/// Categories that map straight onto the packages base URL without an extra
/// `packages/` prefix, because they already live under it.
const PACKAGES_PASSTHROUGH_CATEGORIES: &[&str] = &["packages/"];

/// Validate that `shorthand` (without the scheme) is a syntactically well-formed
/// shorthand path: non-empty and restricted to `[A-Za-z0-9_-/]`.
fn validate_path(path: &str) -> Result<(), InvalidShorthand> {
    if path.is_empty() || !path.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '/')) {
        return Err(InvalidShorthand(format!("{SHORTHAND_SCHEME}{path}")));
    }
    Ok(())
}

/// Explicitly validate a single shorthand URL (not resolve it).
///
/// # Errors
///
/// Returns [`InvalidShorthand`] if `shorthand` does not start with the platform
/// scheme, or its path is empty or uses characters outside `[A-Za-z0-9_-/]`.
pub fn validate(shorthand: &str) -> Result<(), InvalidShorthand> {
    let path = shorthand
        .strip_prefix(SHORTHAND_SCHEME)
        .ok_or_else(|| InvalidShorthand(shorthand.to_string()))?;
    validate_path(path)
}

/// Resolve a single already-stripped shorthand path (everything after `adhar://`)
/// into an absolute URL, per the category table in the module documentation.
fn resolve_path(path: &str, bases: &ResolverBases) -> String {
    if let Some(rest) = path.strip_prefix(ENVIRONMENTS_CATEGORY) {
        return format!(
            "{}/{}",
            bases.environments_base_url.trim_end_matches('/'),
            rest
        );
    }

    let passthrough = PACKAGES_PASSTHROUGH_CATEGORIES
        .iter()
        .any(|category| path.starts_with(category));

    let packages_base = bases.packages_base_url.trim_end_matches('/');
    if passthrough {
        format!("{packages_base}/{path}")
    } else {
        format!("{packages_base}/{PACKAGES_CATEGORY}{path}")
    }
}

/// Rewrite every syntactically well-formed `adhar://` occurrence in `input` into an
/// absolute URL, leaving everything else byte-for-byte unchanged.
///
/// Occurrences whose path is empty (a bare `adhar://`) are left as-is: resolution
/// never removes or truncates unresolved-but-malformed shorthand, it simply skips it.
#[must_use]
pub fn resolve(input: &str, bases: &ResolverBases) -> String {
    SHORTHAND_PATTERN
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let whole = &caps[0];
            let path = whole
                .strip_prefix(SHORTHAND_SCHEME)
                .unwrap_or_default();
            if path.is_empty() {
                whole.to_string()
            } else {
                resolve_path(path, bases)
            }
        })
        .into_owned()
}

/// True iff `value` contains at least one `adhar://` occurrence.
#[must_use]
pub fn contains_shorthand(value: &str) -> bool {
    value.contains(SHORTHAND_SCHEME)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bases() -> ResolverBases {
        ResolverBases {
            packages_base_url: "http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin"
                .to_string(),
            environments_base_url: "http://gitea-http.gitea.svc.cluster.local:3000/environments"
                .to_string(),
        }
    }

    #[test]
    fn resolves_packages_category_without_double_prefix() {
        let resolved = resolve("adhar://packages/core/sample", &bases());
        assert_eq!(
            resolved,
            "http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin/packages/core/sample"
        );
    }

    #[test]
    fn resolves_named_category_under_packages_prefix() {
        let resolved = resolve("adhar://application/demo", &bases());
        assert_eq!(
            resolved,
            "http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin/packages/application/demo"
        );
    }

    #[test]
    fn resolves_environments_category_against_its_own_base() {
        let resolved = resolve("adhar://environments/dev/cluster-config", &bases());
        assert_eq!(
            resolved,
            "http://gitea-http.gitea.svc.cluster.local:3000/environments/dev/cluster-config"
        );
    }

    #[test]
    fn leaves_non_shorthand_urls_untouched() {
        let resolved = resolve("https://github.com/org/repo.git", &bases());
        assert_eq!(resolved, "https://github.com/org/repo.git");
    }

    #[test]
    fn is_idempotent_on_an_already_resolved_url() {
        let once = resolve("adhar://packages/core/sample", &bases());
        let twice = resolve(&once, &bases());
        assert_eq!(once, twice);
    }

    #[test]
    fn rewrites_only_the_shorthand_inside_a_larger_string() {
        let resolved = resolve(
            "prefix adhar://packages/core/sample suffix",
            &bases(),
        );
        assert_eq!(
            resolved,
            "prefix http://gitea-http.gitea.svc.cluster.local:3000/gitea_admin/packages/core/sample suffix"
        );
    }

    #[test]
    fn malformed_shorthand_with_empty_path_is_a_no_op() {
        let resolved = resolve("adhar://", &bases());
        assert_eq!(resolved, "adhar://");
    }

    #[test]
    fn validate_rejects_missing_scheme() {
        assert!(validate("packages/core/sample").is_err());
    }

    #[test]
    fn validate_rejects_disallowed_characters() {
        assert!(validate("adhar://packages/core/../etc").is_err());
    }

    #[test]
    fn validate_accepts_well_formed_shorthand() {
        assert!(validate("adhar://security/vault/unseal-keys").is_ok());
    }
}
