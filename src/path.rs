//! Logical path handling.
//!
//! Logical paths are plain strings separated by `/`. They are matched
//! case-insensitively but stored with whatever case the backing store uses.
//! Everything in here is a pure string operation; nothing touches storage.

use std::{
    borrow::Cow,
    cmp::Ordering,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// A logical path starting with this character is only visible to bindings
/// whose mount point it names explicitly. Transparent bindings ignore it.
pub const MOUNT_SCOPED_MARKER: char = '@';

static SEPARATOR_RUN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[/\\]+"#)
	.unwrap()
});

fn is_normal(path: &str) -> bool {
    !path.contains('\\') && !path.contains("//")
	&& path.split('/').all(|x| x != "." && x != "..")
}

/// Canonicalizes a logical path.
///
/// Backslashes become `/`, runs of separators collapse into one, `.`
/// components disappear and `..` components eat the component before them.
/// A `..` with nothing before it is dropped, so a path can never climb above
/// its root. A leading `/` and a trailing `/` are preserved. The empty path
/// means "root" and normalizes to itself.
///
/// If the path is already canonical, no copying takes place.
///
/// ```
/// # use layered_vfs::normalize;
/// assert_eq!(normalize("Songs\\Foo/./../Bar//baz.sm"), "Songs/Bar/baz.sm");
/// assert_eq!(normalize(&normalize("a/../../b/")), "b/");
/// ```
pub fn normalize(path: &str) -> Cow<'_, str> {
    if is_normal(path) {
	return Cow::Borrowed(path)
    }
    let fixed = SEPARATOR_RUN_PATTERN.replace_all(path, "/");
    let absolute = fixed.starts_with('/');
    let directory = fixed.ends_with('/')
	|| matches!(fixed.rsplit('/').next(), Some(".") | Some(".."));
    let mut components: Vec<&str> = Vec::new();
    for component in fixed.split('/') {
	match component {
	    "" | "." => (),
	    ".." => { components.pop(); },
	    x => components.push(x),
	}
    }
    let mut ret = String::with_capacity(fixed.len());
    if absolute { ret.push('/') }
    ret.push_str(&components.join("/"));
    if directory && !components.is_empty() { ret.push('/') }
    Cow::Owned(ret)
}

/// Iterates over the non-empty components of a normalized path.
pub(crate) fn components(path: &str) -> impl DoubleEndedIterator<Item=&str> {
    path.split('/').filter(|x| !x.is_empty())
}

/// Splits a listing request into its directory (with trailing `/`, or empty)
/// and the mask that follows it.
pub(crate) fn split_mask(path: &str) -> (&str, &str) {
    match path.rfind('/') {
	Some(i) => (&path[..=i], &path[i+1..]),
	None => ("", path),
    }
}

/// Returns the directory containing `path`, with no trailing `/`.
pub(crate) fn parent(path: &str) -> &str {
    let path = path.trim_end_matches('/');
    match path.rfind('/') {
	Some(i) => &path[..i],
	None => "",
    }
}

/// Case-insensitive prefix strip. Returns the remainder of `path` after
/// `prefix`, if `path` starts with `prefix` ignoring case.
pub(crate) fn strip_prefix_ci<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let mut rest = path.char_indices();
    for p in prefix.chars() {
	match rest.next() {
	    Some((_, c)) if c.to_lowercase().eq(p.to_lowercase()) => (),
	    _ => return None,
	}
    }
    match rest.next() {
	Some((i, _)) => Some(&path[i..]),
	None => Some(""),
    }
}

pub(crate) fn cmp_ci(a: &str, b: &str) -> Ordering {
    a.chars().flat_map(char::to_lowercase)
	.cmp(b.chars().flat_map(char::to_lowercase))
}

pub(crate) fn eq_ci(a: &str, b: &str) -> bool {
    cmp_ci(a, b) == Ordering::Equal
}

/// Lookup key for a name or path in the case-insensitive caches.
///
/// Folds one `char` at a time, the same way `cmp_ci` compares, so that
/// context-sensitive lowercasing (final sigma) can't make them disagree.
pub(crate) fn fold(path: &str) -> String {
    path.trim_end_matches('/').chars().flat_map(char::to_lowercase).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    #[test] fn normalize_good() {
	const PAIRS_TO_CHECK: &[(&str, &str)] = &[
	    ("", ""),
	    ("/", "/"),
	    ("foo/./bar", "foo/bar"),
	    ("foo/../bar", "bar"),
	    ("/foo/./bar", "/foo/bar"),
	    ("/foo/../bar", "/bar"),
	    ("foo/../../bar", "bar"),
	    ("/../etc", "/etc"),
	    ("Songs\\Pack\\song.sm", "Songs/Pack/song.sm"),
	    ("Themes//default///Graphics", "Themes/default/Graphics"),
	    ("Themes/default/", "Themes/default/"),
	    ("Themes/default/.", "Themes/default/"),
	    ("Themes/default/Graphics/..", "Themes/default/"),
	    ("a/..", ""),
	    ("@mem/cache.bin", "@mem/cache.bin"),
	];
	for (big, small) in PAIRS_TO_CHECK.iter() {
	    assert_eq!(normalize(big), *small, "normalizing {:?}", big);
	}
    }
    #[test] fn idempotent() {
	const PATHS: &[&str] = &[
	    "", "/", ".", "..", "./", "../..", "a\\b\\..\\c", "//x//y//",
	    "/a/b/../../..", "Songs/*", "x/./y/./", "@mem/../@mem/a",
	];
	for path in PATHS.iter() {
	    let once = normalize(path).into_owned();
	    let twice = normalize(&once).into_owned();
	    assert_eq!(once, twice, "normalizing {:?} twice", path);
	}
    }
    #[test] fn copies_vs_keeps() {
	const PATHS_TO_CHECK: &[(&str, bool)] = &[
	    ("/asdf", true),
	    ("Songs/Pack/", true),
	    ("/asdf/../foxes", false),
	    ("back\\slash", false),
	    ("double//slash", false),
	];
	for (src, kept) in PATHS_TO_CHECK.iter() {
	    let borrowed = matches!(normalize(src), Cow::Borrowed(_));
	    assert_eq!(borrowed, *kept, "{:?}", src);
	}
    }
    #[test] fn prefixes() {
	assert_eq!(strip_prefix_ci("Themes/Default/x.png", "themes/default/"),
		   Some("x.png"));
	assert_eq!(strip_prefix_ci("themes/default/", "Themes/Default/"),
		   Some(""));
	assert_eq!(strip_prefix_ci("Themes/def", "Themes/default/"), None);
	assert_eq!(strip_prefix_ci("Songs/x", "Themes/"), None);
	assert_eq!(strip_prefix_ci("anything", ""), Some("anything"));
    }
    #[test] fn pieces() {
	assert_eq!(split_mask("Songs/*.sm"), ("Songs/", "*.sm"));
	assert_eq!(split_mask("*"), ("", "*"));
	assert_eq!(split_mask("Songs/"), ("Songs/", ""));
	assert_eq!(parent("a/b/c"), "a/b");
	assert_eq!(parent("a/b/"), "a");
	assert_eq!(parent("a"), "");
	assert_eq!(components("/a//b/").collect::<Vec<_>>(), &["a", "b"]);
	assert!(eq_ci("Song.SM", "song.sm"));
	assert_eq!(cmp_ci("apple", "Banana"), Ordering::Less);
    }
    #[test] fn folding_agrees_with_comparison() {
	const SAME_NAMES: &[(&str, &str)] = &[
	    ("ΟΔΟΣ", "οδοσ"),
	    ("ΟΔΟΣ/", "οδοσ"),
	    ("Songs/ΣΟΦΙΑΣ.sm", "songs/σοφιασ.SM"),
	];
	for (a, b) in SAME_NAMES.iter() {
	    assert!(eq_ci(a.trim_end_matches('/'), b), "{:?} vs {:?}", a, b);
	    assert_eq!(fold(a), fold(b), "{:?} vs {:?}", a, b);
	}
    }
}
