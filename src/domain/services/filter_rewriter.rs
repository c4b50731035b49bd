//! Filter Rewriter
//!
//! Sudo rule lookups ask for `sudoUser=<name>` on group objects. The
//! upstream directory models that relation through group membership, so
//! those assertions are turned into `member=cn=<name>,<users base DN>`.
//!
//! This is a textual rewrite: anything outside a matched assertion is
//! passed through byte for byte, whatever its syntax.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const GROUP_CLASS_MARKER: &str = "objectClass=group";
const SUDO_USER_MARKER: &str = "sudoUser=";

// ASCII word characters plus `.`, `-`, `%` and `#`.
static SUDO_USER_ASSERTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"sudoUser=([0-9A-Za-z_.%#-]+)").expect("sudoUser pattern is valid")
});

/// Rewrite `sudoUser=` assertions of a group search into `member=` ones.
///
/// Only active when the filter mentions both `objectClass=group` and
/// `sudoUser=`; otherwise the filter is returned unchanged.
pub fn rewrite_filter(filter: &str, users_dn: &str) -> String {
    if !filter.contains(GROUP_CLASS_MARKER) || !filter.contains(SUDO_USER_MARKER) {
        return filter.to_string();
    }

    SUDO_USER_ASSERTION
        .replace_all(filter, |caps: &Captures<'_>| {
            format!("member=cn={},{}", &caps[1], users_dn)
        })
        .into_owned()
}
