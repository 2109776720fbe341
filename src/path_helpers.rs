use std::path::{Component, Path};

/// Render a relative path with forward slashes, the form git pathspecs and
/// config files use. `.` components are dropped.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::CurDir => None,
            other => Some(other.as_os_str().to_string_lossy()),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `path` relative to `base` with forward slashes, or `None` when `path` is
/// not inside `base`.
pub fn relative_to(path: &Path, base: &Path) -> Option<String> {
    path.strip_prefix(base).ok().map(to_slash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn to_slash_drops_dots_and_trailing_separators() {
        assert_eq!(to_slash(Path::new("packages/core/")), "packages/core");
        assert_eq!(to_slash(Path::new("./packages/./core")), "packages/core");
        assert_eq!(to_slash(Path::new("../shared")), "../shared");
        assert_eq!(to_slash(Path::new("")), "");
    }

    #[test]
    fn relative_to_requires_containment() {
        let base = PathBuf::from("/repo");
        assert_eq!(
            relative_to(Path::new("/repo/packages/core"), &base),
            Some("packages/core".into())
        );
        assert_eq!(relative_to(Path::new("/repo"), &base), Some(String::new()));
        assert_eq!(relative_to(Path::new("/elsewhere"), &base), None);
    }
}
