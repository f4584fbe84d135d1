//! Route uri helpers.
//!
//! A route uri is a slash-separated path without a leading slash, optionally
//! followed by `?query`: `pages/detail/detail?id=3`. Relative targets are
//! resolved against the *directory* of the current top page.

use std::collections::BTreeMap;

use crate::errors::PathError;

/// Split a uri into its path and optional query string.
pub fn split_uri(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    }
}

/// Path portion of a uri.
pub fn front_uri(uri: &str) -> &str {
    split_uri(uri).0
}

/// Parse `a=1&b=two` into an ordered map. Keys without `=` map to `""`.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_owned(), v.to_owned()),
            None => (pair.to_owned(), String::new()),
        })
        .collect()
}

/// Resolve `target` against the uri of the page currently on top.
///
/// - a leading `/` means app-absolute: the slash is dropped, nothing else changes
/// - otherwise the target is joined to the directory of `base_uri`, with `.`
///   and `..` collapsed
pub fn resolve_relative(base_uri: &str, target: &str) -> Result<String, PathError> {
    if target.is_empty() {
        return Err(PathError::Empty);
    }
    if let Some(absolute) = target.strip_prefix('/') {
        return Ok(absolute.to_owned());
    }

    let (target_path, query) = split_uri(target);
    let base_path = front_uri(base_uri);
    let mut segments: Vec<&str> = base_path.split('/').filter(|s| !s.is_empty()).collect();
    // The last segment of the base is the page itself, not a directory.
    let _ = segments.pop();

    for segment in target_path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::EscapesRoot(target.to_owned()));
                }
            }
            other => segments.push(other),
        }
    }

    let mut resolved = segments.join("/");
    if let Some(query) = query {
        resolved.push('?');
        resolved.push_str(query);
    }
    Ok(resolved)
}

/// Turn a developer-supplied resource path into an absolute on-disk path.
///
/// Remote urls and paths already under `app_path` pass through untouched;
/// `/x` is relative to the app root; anything else is relative to the current
/// page's directory.
pub fn resolve_asset_path(app_path: &str, front: &str, path: &str) -> Result<String, PathError> {
    let is_remote = ["http://", "https://", "data:"]
        .iter()
        .any(|scheme| path.starts_with(scheme));
    if is_remote || (!app_path.is_empty() && path.starts_with(app_path)) {
        return Ok(path.to_owned());
    }
    let root = app_path.trim_end_matches('/');
    let relative = resolve_relative(front, path)?;
    Ok(format!("{root}/{relative}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn split_with_and_without_query() {
        assert_eq!(split_uri("pages/a?x=1"), ("pages/a", Some("x=1")));
        assert_eq!(split_uri("pages/a"), ("pages/a", None));
    }

    #[test]
    fn absolute_target_drops_leading_slash() {
        assert_eq!(resolve_relative("pages/a/a", "/pages/b/b").unwrap(), "pages/b/b");
    }

    #[test]
    fn sibling_target() {
        assert_eq!(resolve_relative("pages/index", "detail").unwrap(), "pages/detail");
    }

    #[test]
    fn parent_segments_collapse() {
        assert_eq!(
            resolve_relative("pages/a/a?q=1", "../b/b?id=2").unwrap(),
            "pages/b/b?id=2"
        );
        assert_eq!(resolve_relative("pages/a/a", "./c").unwrap(), "pages/a/c");
    }

    #[test]
    fn escaping_root_fails() {
        assert_matches!(
            resolve_relative("pages/a", "../../x"),
            Err(PathError::EscapesRoot(_))
        );
    }

    #[test]
    fn empty_target_fails() {
        assert_matches!(resolve_relative("pages/a", ""), Err(PathError::Empty));
    }

    #[test]
    fn query_parsing() {
        let q = parse_query("id=3&flag&name=x");
        assert_eq!(q.get("id").map(String::as_str), Some("3"));
        assert_eq!(q.get("flag").map(String::as_str), Some(""));
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn asset_paths() {
        let app = "/data/app";
        assert_eq!(
            resolve_asset_path(app, "pages/a/a", "img/logo.png").unwrap(),
            "/data/app/pages/a/img/logo.png"
        );
        assert_eq!(
            resolve_asset_path(app, "pages/a/a", "/img/logo.png").unwrap(),
            "/data/app/img/logo.png"
        );
        assert_eq!(
            resolve_asset_path(app, "pages/a/a", "https://cdn/x.png").unwrap(),
            "https://cdn/x.png"
        );
        assert_eq!(
            resolve_asset_path(app, "pages/a/a", "/data/app/x.png").unwrap(),
            "/data/app/x.png"
        );
    }

    mod props {
        use crate::path::resolve_relative;
        use proptest::prelude::*;

        fn segment() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9_]{0,7}"
        }

        proptest! {
            #[test]
            fn absolute_targets_pass_through(segs in prop::collection::vec(segment(), 1..5)) {
                let target = format!("/{}", segs.join("/"));
                let resolved = resolve_relative("pages/a/a", &target).unwrap();
                prop_assert_eq!(resolved, segs.join("/"));
            }

            #[test]
            fn plain_relative_targets_stay_under_base_dir(
                base in prop::collection::vec(segment(), 1..5),
                target in prop::collection::vec(segment(), 1..4),
            ) {
                let base_uri = base.join("/");
                let resolved = resolve_relative(&base_uri, &target.join("/")).unwrap();
                let dir = base[..base.len() - 1].join("/");
                prop_assert!(resolved.starts_with(&dir));
                prop_assert!(resolved.ends_with(&target.join("/")));
            }
        }
    }
}
