//! View-as visibility checks.

use deptauthz_auth::RequestContext;

/// View-as modes that expose unpublished content.
pub const RESTRICTED_VIEW_AS: [&str; 2] = ["private", "draft"];

/// `true` iff the request's `view_as` value equals one of `allowed` exactly.
/// An absent value never matches.
pub fn check_view_as_permissions<S: AsRef<str>>(request: &RequestContext, allowed: &[S]) -> bool {
    match request.view_as() {
        Some(view_as) => allowed.iter().any(|a| a.as_ref() == view_as),
        None => false,
    }
}
