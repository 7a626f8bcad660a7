//! Request-to-policy-resource extraction.
//!
//! Maps `(method, path, query, subject)` to an [`Action`] and a
//! [`PolicyResource`]. The mapping is pure: the same request and subject
//! always produce the same result.
//!
//! Resource families are dispatched through an ordered table of path
//! prefixes (relative to the API prefix). Matching is segment-aware, so the
//! prefixes must stay mutually exclusive: no prefix may match another's
//! path. `family_prefixes_do_not_overlap` guards this.

use std::collections::BTreeMap;

use axum::http::Method;
use gateway_security::constants::SELF_IDENTITY;
use gateway_security::{Action, PolicyResource, Subject, canonical_segment, path_escape};

/// Errors raised when a request cannot be mapped to a policy resource.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("unrecognized resource path: {0}")]
    InvalidPath(String),

    #[error("method {0} is not valid for this resource")]
    InvalidMethod(Method),

    #[error("method {0} is not supported on context resources")]
    UnsupportedMethod(Method),

    #[error("context deletion requires a property segment")]
    MissingProperty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    /// `/context/{identityType}/{identityId}[/{property}]`
    Context,
    /// `/values/{key...}` with query parameters as contexts
    Values,
    /// `/keys/{key...}`
    Keys,
    /// Fixed `repo/policies`
    Policies,
    /// Fixed `repo`
    Repo,
    /// `repo` for reads, `repo/{family}` for writes
    RepoScoped(&'static str),
}

/// Item naming the repository as a whole.
const REPO_ITEM: &str = "repo";

/// Ordered family table; the first matching prefix wins.
const FAMILIES: &[(&str, Family)] = &[
    ("/context", Family::Context),
    ("/values", Family::Values),
    ("/keys", Family::Keys),
    ("/policies", Family::Policies),
    ("/manifests", Family::Repo),
    ("/suggestions", Family::Repo),
    ("/dependents", Family::Repo),
    ("/search", Family::Repo),
    ("/search-index", Family::Repo),
    ("/revision-history", Family::Repo),
    ("/tags", Family::RepoScoped("tags")),
    ("/schemas", Family::RepoScoped("schemas")),
];

/// Families readable with `GET`.
const READ_PREFIXES: &[&str] = &[
    "/values",
    "/keys",
    "/manifests",
    "/search-index",
    "/search",
    "/suggestions",
    "/dependents",
    "/schemas",
    "/tags",
    "/revision-history",
    "/policies",
    "/context",
];

/// Whether any segment of `path` decodes to `.` or `..`.
///
/// Upstreams may collapse such segments after authorization, so the resource
/// the policy saw would not be the one served.
fn has_dot_segment(path: &str) -> bool {
    path.split('/')
        .any(|segment| matches!(canonical_segment(segment).as_str(), "." | ".."))
}

/// Segment-aware prefix match: `/p` matches `/p` and `/p/...`, never `/pq`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Derives `(Action, PolicyResource)` for requests under one API prefix.
#[derive(Debug, Clone)]
pub struct ResourceExtractor {
    api_prefix: String,
}

impl ResourceExtractor {
    #[must_use]
    pub fn new(api_prefix: impl Into<String>) -> Self {
        let api_prefix = api_prefix.into();
        let api_prefix = api_prefix.trim_end_matches('/').to_owned();
        Self { api_prefix }
    }

    #[must_use]
    pub fn api_prefix(&self) -> &str {
        &self.api_prefix
    }

    /// Action for `method` on `path`.
    ///
    /// Mutating methods are always `write`; `GET` is `read` only on the read
    /// whitelist; everything else is `invalid`.
    #[must_use]
    pub fn action(&self, method: &Method, path: &str) -> Action {
        match *method {
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE => Action::Write,
            Method::GET => {
                let readable = self.relative(path).is_some_and(|rel| {
                    READ_PREFIXES
                        .iter()
                        .any(|prefix| matches_prefix(rel, prefix))
                });
                if readable { Action::Read } else { Action::Invalid }
            }
            _ => Action::Invalid,
        }
    }

    /// Map a request to the action it performs and the resource it touches.
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if the path is outside the API prefix, matches no family,
    ///   or has a `.` / `..` segment (plain or percent-encoded)
    /// - `InvalidMethod` if the method is not valid for the family
    /// - `UnsupportedMethod` / `MissingProperty` for malformed context requests
    pub fn extract(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        subject: &Subject,
    ) -> Result<(Action, PolicyResource), ExtractError> {
        let invalid_path = || ExtractError::InvalidPath(path.to_owned());

        if has_dot_segment(path) {
            return Err(invalid_path());
        }
        let rel = self.relative(path).ok_or_else(invalid_path)?;
        let (prefix, family) = FAMILIES
            .iter()
            .find(|(prefix, _)| matches_prefix(rel, prefix))
            .copied()
            .ok_or_else(invalid_path)?;

        // Context requests report unknown methods as unsupported instead.
        let action = self.action(method, path);
        if action == Action::Invalid && family != Family::Context {
            return Err(ExtractError::InvalidMethod(method.clone()));
        }

        let segments: Vec<String> = rel[prefix.len()..]
            .split('/')
            .filter(|s| !s.is_empty())
            .map(canonical_segment)
            .collect();
        let normalizer = IdentityNormalizer::new(subject);

        let resource = match family {
            Family::Context => context_resource(method, &segments, &normalizer, path)?,
            Family::Values => {
                let mut resource = PolicyResource::new(format!("values/{}", segments.join("/")));
                for (key, value) in query_contexts(query) {
                    let value = normalizer.normalize(&path_escape(&value));
                    resource = resource.with_context(path_escape(&key), value);
                }
                resource
            }
            Family::Policies => PolicyResource::new(format!("{REPO_ITEM}/policies")),
            Family::Repo => PolicyResource::new(REPO_ITEM),
            Family::Keys | Family::RepoScoped(_) if action == Action::Read => {
                PolicyResource::new(REPO_ITEM)
            }
            Family::Keys => PolicyResource::new(format!("{REPO_ITEM}/keys/{}", segments.join("/"))),
            Family::RepoScoped(name) => PolicyResource::new(format!("{REPO_ITEM}/{name}")),
        };

        Ok((action, resource))
    }

    /// Path relative to the API prefix, or `None` if the path is outside it.
    fn relative<'a>(&self, path: &'a str) -> Option<&'a str> {
        if matches_prefix(path, &self.api_prefix) {
            Some(&path[self.api_prefix.len()..])
        } else {
            None
        }
    }
}

fn context_resource(
    method: &Method,
    segments: &[String],
    normalizer: &IdentityNormalizer,
    path: &str,
) -> Result<PolicyResource, ExtractError> {
    let [identity_type, identity_id, property @ ..] = segments else {
        return Err(ExtractError::InvalidPath(path.to_owned()));
    };
    let identity = normalizer.normalize(identity_id);

    let item = match *method {
        Method::DELETE => {
            let Some(property) = property.first() else {
                return Err(ExtractError::MissingProperty);
            };
            format!("context/{identity_type}/{property}")
        }
        Method::GET | Method::POST => format!("context/{identity_type}/*"),
        _ => return Err(ExtractError::UnsupportedMethod(method.clone())),
    };

    Ok(PolicyResource::new(item).with_context(identity_type.as_str(), identity))
}

/// First value of every query parameter whose key contains neither `$` nor `.`.
fn query_contexts(query: Option<&str>) -> BTreeMap<String, String> {
    let mut contexts = BTreeMap::new();
    let Some(query) = query else {
        return contexts;
    };
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key.contains('$') || key.contains('.') {
            continue;
        }
        contexts
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    contexts
}

/// Rewrites identities equal to the caller's own to [`SELF_IDENTITY`].
///
/// Both sides are compared in their path-escaped form.
struct IdentityNormalizer {
    own: String,
}

impl IdentityNormalizer {
    fn new(subject: &Subject) -> Self {
        Self {
            own: path_escape(subject.id()),
        }
    }

    fn normalize(&self, escaped: &str) -> String {
        if escaped == self.own {
            SELF_IDENTITY.to_owned()
        } else {
            escaped.to_owned()
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn subject(id: &str) -> Subject {
        Subject::builder().id(id).issuer("https://idp.test").build()
    }

    fn extract(
        method: &Method,
        path: &str,
        query: Option<&str>,
        id: &str,
    ) -> Result<(Action, PolicyResource), ExtractError> {
        ResourceExtractor::new("/api/v2").extract(method, path, query, &subject(id))
    }

    fn contexts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn family_prefixes_do_not_overlap() {
        for (i, (a, _)) in FAMILIES.iter().enumerate() {
            for (j, (b, _)) in FAMILIES.iter().enumerate() {
                if i == j {
                    continue;
                }
                assert!(!matches_prefix(b, a), "{a} captures {b}");
                assert!(!matches_prefix(&format!("{b}/x"), a), "{a} captures {b}/x");
            }
        }
    }

    #[test]
    fn every_family_is_readable() {
        for (prefix, _) in FAMILIES {
            assert!(READ_PREFIXES.contains(prefix), "{prefix} is not readable");
        }
    }

    #[test]
    fn values_get_with_own_identity_becomes_self() {
        let (action, resource) =
            extract(&Method::GET, "/api/v2/values/key1", Some("user=alice"), "alice").unwrap();
        assert_eq!(action, Action::Read);
        assert_eq!(resource.item(), "values/key1");
        assert_eq!(resource.contexts(), &contexts(&[("user", "self")]));
    }

    #[test]
    fn values_keeps_nested_key_path() {
        let (action, resource) =
            extract(&Method::PUT, "/api/v2/values/a/b/c", None, "alice").unwrap();
        assert_eq!(action, Action::Write);
        assert_eq!(resource.item(), "values/a/b/c");
        assert!(resource.contexts().is_empty());
    }

    #[test]
    fn values_without_key() {
        let (_, resource) = extract(&Method::GET, "/api/v2/values", None, "alice").unwrap();
        assert_eq!(resource.item(), "values/");
    }

    #[test]
    fn values_query_skips_dollar_and_dotted_keys() {
        let (_, resource) = extract(
            &Method::GET,
            "/api/v2/values/k",
            Some("user=bob&$include=x&user.name=y&device=d1&user=ignored"),
            "alice",
        )
        .unwrap();
        assert_eq!(resource.contexts(), &contexts(&[("device", "d1"), ("user", "bob")]));
    }

    #[test]
    fn values_query_identity_comparison_uses_escaped_form() {
        let (_, resource) = extract(
            &Method::GET,
            "/api/v2/values/k",
            Some("user=alice%40example.com&device=a%20b"),
            "alice@example.com",
        )
        .unwrap();
        assert_eq!(
            resource.contexts(),
            &contexts(&[("device", "a%20b"), ("user", "self")])
        );
    }

    #[test]
    fn context_post_for_other_identity() {
        let (action, resource) =
            extract(&Method::POST, "/api/v2/context/user/bob", None, "alice").unwrap();
        assert_eq!(action, Action::Write);
        assert_eq!(resource.item(), "context/user/*");
        assert_eq!(resource.contexts(), &contexts(&[("user", "bob")]));
    }

    #[test]
    fn context_get_for_own_identity() {
        let (action, resource) =
            extract(&Method::GET, "/api/v2/context/user/alice", None, "alice").unwrap();
        assert_eq!(action, Action::Read);
        assert_eq!(resource.item(), "context/user/*");
        assert_eq!(resource.contexts(), &contexts(&[("user", "self")]));
    }

    #[test]
    fn context_path_identity_is_decoded_before_comparison() {
        let (_, resource) = extract(
            &Method::GET,
            "/api/v2/context/user/alice%40example.com",
            None,
            "alice@example.com",
        )
        .unwrap();
        assert_eq!(resource.context("user"), Some("self"));
    }

    #[test]
    fn context_delete_with_property() {
        let (action, resource) = extract(
            &Method::DELETE,
            "/api/v2/context/device/d-1/country",
            None,
            "alice",
        )
        .unwrap();
        assert_eq!(action, Action::Write);
        assert_eq!(resource.item(), "context/device/country");
        assert_eq!(resource.contexts(), &contexts(&[("device", "d-1")]));
    }

    #[test]
    fn context_delete_uses_only_the_first_property_segment() {
        let (_, resource) = extract(
            &Method::DELETE,
            "/api/v2/context/device/d-1/country/extra",
            None,
            "alice",
        )
        .unwrap();
        assert_eq!(resource.item(), "context/device/country");
        assert_eq!(resource.contexts(), &contexts(&[("device", "d-1")]));
    }

    #[test]
    fn context_head_and_options_are_unsupported() {
        for method in [Method::HEAD, Method::OPTIONS] {
            let err = extract(&method, "/api/v2/context/user/bob", None, "alice").unwrap_err();
            assert_eq!(err, ExtractError::UnsupportedMethod(method));
        }
    }

    #[test]
    fn dot_segments_are_invalid_paths() {
        for path in [
            "/api/v2/values/../keys/secret",
            "/api/v2/values/%2e%2e/keys/secret",
            "/api/v2/values/%2E%2e/keys/secret",
            "/api/v2/values/./k",
            "/api/v2/values/%2e/k",
            "/api/v2/context/user/bob/..",
            "/api/v2/../v2/policies",
        ] {
            for method in [Method::GET, Method::PUT, Method::DELETE] {
                let err = extract(&method, path, None, "alice").unwrap_err();
                assert_eq!(err, ExtractError::InvalidPath(path.to_owned()), "{method} {path}");
            }
        }
    }

    #[test]
    fn dots_inside_segments_are_allowed() {
        let (_, resource) =
            extract(&Method::PUT, "/api/v2/values/flag..v2/.hidden", None, "alice").unwrap();
        assert_eq!(resource.item(), "values/flag..v2/.hidden");
    }

    #[test]
    fn context_delete_without_property_is_missing_property() {
        let err = extract(&Method::DELETE, "/api/v2/context/user/bob", None, "alice").unwrap_err();
        assert_eq!(err, ExtractError::MissingProperty);
    }

    #[test]
    fn context_put_is_unsupported() {
        let err = extract(&Method::PUT, "/api/v2/context/user/bob", None, "alice").unwrap_err();
        assert_eq!(err, ExtractError::UnsupportedMethod(Method::PUT));
    }

    #[test]
    fn context_without_identity_is_invalid_path() {
        let err = extract(&Method::GET, "/api/v2/context/user", None, "alice").unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPath(_)));
    }

    #[test]
    fn keys_read_is_collection_level() {
        let (action, resource) = extract(&Method::GET, "/api/v2/keys/a/b", None, "alice").unwrap();
        assert_eq!(action, Action::Read);
        assert_eq!(resource.item(), "repo");
    }

    #[test]
    fn keys_write_targets_key_path() {
        let (action, resource) =
            extract(&Method::DELETE, "/api/v2/keys/a/b", None, "alice").unwrap();
        assert_eq!(action, Action::Write);
        assert_eq!(resource.item(), "repo/keys/a/b");
    }

    #[test]
    fn policies_are_fixed() {
        let (_, resource) = extract(&Method::PUT, "/api/v2/policies", None, "alice").unwrap();
        assert_eq!(resource.item(), "repo/policies");
        assert!(resource.contexts().is_empty());
    }

    #[test]
    fn repo_families() {
        for path in [
            "/api/v2/manifests/a",
            "/api/v2/suggestions",
            "/api/v2/dependents/a/b",
            "/api/v2/search",
            "/api/v2/search-index",
            "/api/v2/revision-history/a",
        ] {
            let (action, resource) = extract(&Method::GET, path, None, "alice").unwrap();
            assert_eq!(action, Action::Read, "{path}");
            assert_eq!(resource.item(), "repo", "{path}");
        }
    }

    #[test]
    fn tags_and_schemas() {
        let (action, resource) = extract(&Method::GET, "/api/v2/tags", None, "alice").unwrap();
        assert_eq!((action, resource.item()), (Action::Read, "repo"));

        let (action, resource) = extract(&Method::PUT, "/api/v2/tags", None, "alice").unwrap();
        assert_eq!((action, resource.item()), (Action::Write, "repo/tags"));

        let (action, resource) =
            extract(&Method::PATCH, "/api/v2/schemas/user", None, "alice").unwrap();
        assert_eq!((action, resource.item()), (Action::Write, "repo/schemas"));
    }

    #[test]
    fn head_and_options_are_invalid_methods() {
        let err = extract(&Method::HEAD, "/api/v2/tags", None, "alice").unwrap_err();
        assert_eq!(err, ExtractError::InvalidMethod(Method::HEAD));

        let err = extract(&Method::OPTIONS, "/api/v2/values/k", None, "alice").unwrap_err();
        assert_eq!(err, ExtractError::InvalidMethod(Method::OPTIONS));
    }

    #[test]
    fn unknown_family_is_invalid_path() {
        for path in ["/api/v2/unknown", "/api/v2", "/api/v2/", "/other/values", "/api/v2values"] {
            let err = extract(&Method::GET, path, None, "alice").unwrap_err();
            assert!(matches!(err, ExtractError::InvalidPath(_)), "{path}: {err:?}");
        }
    }

    #[test]
    fn prefix_match_is_segment_aware() {
        let extractor = ResourceExtractor::new("/api/v2");
        assert_eq!(extractor.action(&Method::GET, "/api/v2/searchx"), Action::Invalid);
        assert_eq!(extractor.action(&Method::GET, "/api/v2/search-index"), Action::Read);
        assert!(matches!(
            extract(&Method::GET, "/api/v2/valuesx/k", None, "alice"),
            Err(ExtractError::InvalidPath(_))
        ));
    }

    #[test]
    fn extraction_is_deterministic() {
        let run = || {
            extract(
                &Method::GET,
                "/api/v2/values/k",
                Some("user=alice&device=d&zone=eu"),
                "alice",
            )
            .unwrap()
        };
        let (_, first) = run();
        let (_, second) = run();
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn trailing_slash_on_api_prefix_is_ignored() {
        let extractor = ResourceExtractor::new("/api/v2/");
        let (_, resource) = extractor
            .extract(&Method::GET, "/api/v2/policies", None, &subject("alice"))
            .unwrap();
        assert_eq!(resource.item(), "repo/policies");
    }
}
