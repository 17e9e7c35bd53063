//! Source path aliasing
//!
//! Long absolute source paths are shortened for display by replacing a known
//! root with a placeholder tag. Roots are tried in a fixed order and the first
//! one found in the path wins:
//!
//! 1. the working directory captured at detection time, as `<PWD>`
//! 2. the standard library source root, as `<LIBDIR>`
//! 3. the package root, as `<PKG:name>` for `<root>/packages/<name>/...` paths,
//!    otherwise `<PKGDIR>`

use crate::config::Config;
use regex::Regex;
use std::borrow::Cow;
use std::path::Path;

pub const WORKING_DIR_TAG: &str = "<PWD>";
pub const LIBRARY_DIR_TAG: &str = "<LIBDIR>";
pub const PACKAGE_DIR_TAG: &str = "<PKGDIR>";

#[derive(Debug, Clone, Default)]
pub struct PathAliases {
    working_dir: Option<String>,
    library_dir: Option<String>,
    package_dir: Option<String>,
    package_pattern: Option<Regex>,
}

impl PathAliases {
    /// No roots: every path is returned unchanged
    pub fn none() -> Self {
        Self::default()
    }

    /// Capture the current working directory plus the configured roots
    pub fn detect(config: &Config) -> Self {
        let working_dir = std::env::current_dir().ok();
        Self::none()
            .with_working_dir(working_dir.as_deref())
            .with_library_dir(config.library_dir.as_deref())
            .with_package_dir(config.package_dir.as_deref())
    }

    pub fn with_working_dir(mut self, dir: Option<&Path>) -> Self {
        self.working_dir = dir.and_then(root_string);
        self
    }

    pub fn with_library_dir(mut self, dir: Option<&Path>) -> Self {
        self.library_dir = dir.and_then(root_string);
        self
    }

    pub fn with_package_dir(mut self, dir: Option<&Path>) -> Self {
        self.package_dir = dir.and_then(root_string);
        self.package_pattern = self.package_dir.as_deref().and_then(|root| {
            let separator = regex::escape(std::path::MAIN_SEPARATOR_STR);
            Regex::new(&format!(
                "{root}{sep}packages{sep}(?P<name>[^{sep}]+){sep}",
                root = regex::escape(root),
                sep = separator,
            ))
            .ok()
        });
        self
    }

    pub fn working_dir(&self) -> Option<&str> {
        self.working_dir.as_deref()
    }

    /// Shorten `path` with the first matching root
    pub fn alias<'p>(&self, path: &'p str) -> Cow<'p, str> {
        if let Some(root) = self.working_dir.as_deref().filter(|r| path.contains(r)) {
            return Cow::Owned(path.replacen(root, WORKING_DIR_TAG, 1));
        }

        if let Some(root) = self.library_dir.as_deref().filter(|r| path.contains(r)) {
            return Cow::Owned(path.replacen(root, LIBRARY_DIR_TAG, 1));
        }

        if let Some(root) = self.package_dir.as_deref().filter(|r| path.contains(r)) {
            if let Some(name) = self.package_name(path) {
                let packaged = format!(
                    "{root}{sep}packages{sep}{name}",
                    sep = std::path::MAIN_SEPARATOR
                );
                return Cow::Owned(path.replacen(&packaged, &format!("<PKG:{}>", name), 1));
            }
            return Cow::Owned(path.replacen(root, PACKAGE_DIR_TAG, 1));
        }

        Cow::Borrowed(path)
    }

    /// Name of the package a source file belongs to, if it lives under the
    /// package root
    pub fn package_name(&self, path: &str) -> Option<String> {
        let pattern = self.package_pattern.as_ref()?;
        pattern
            .captures(path)
            .and_then(|caps| caps.name("name"))
            .map(|m| m.as_str().to_string())
    }
}

fn root_string(dir: &Path) -> Option<String> {
    let root = dir.to_str()?.trim_end_matches(std::path::MAIN_SEPARATOR);
    if root.is_empty() {
        None
    } else {
        Some(root.to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn aliases() -> PathAliases {
        PathAliases::none()
            .with_working_dir(Some(Path::new("/work/app")))
            .with_library_dir(Some(Path::new("/usr/lib/rust/library")))
            .with_package_dir(Some(Path::new("/home/dev/.pkgs")))
    }

    #[test]
    fn test_working_dir_alias() {
        assert_eq!(aliases().alias("/work/app/src/main.rs"), "<PWD>/src/main.rs");
    }

    #[test]
    fn test_library_dir_alias() {
        assert_eq!(
            aliases().alias("/usr/lib/rust/library/alloc/src/vec.rs"),
            "<LIBDIR>/alloc/src/vec.rs"
        );
    }

    #[test]
    fn test_package_alias_with_name() {
        assert_eq!(
            aliases().alias("/home/dev/.pkgs/packages/yajl-1.1.0/lib/yajl.rs"),
            "<PKG:yajl-1.1.0>/lib/yajl.rs"
        );
        assert_eq!(aliases().alias("/home/dev/.pkgs/cache/x.rs"), "<PKGDIR>/cache/x.rs");
    }

    #[test]
    fn test_unmatched_path_unchanged() {
        let aliases = aliases();
        let aliased = aliases.alias("/elsewhere/x.rs");
        assert!(matches!(aliased, Cow::Borrowed(_)));
        assert_eq!(aliased, "/elsewhere/x.rs");
    }

    #[test]
    fn test_working_dir_wins_over_other_roots() {
        // The library root sits inside the working directory, so both match
        let aliases = PathAliases::none()
            .with_working_dir(Some(Path::new("/work")))
            .with_library_dir(Some(Path::new("/work/toolchain/library")))
            .with_package_dir(Some(Path::new("/work/toolchain")));

        assert_eq!(
            aliases.alias("/work/toolchain/library/core/src/lib.rs"),
            "<PWD>/toolchain/library/core/src/lib.rs"
        );
    }

    #[test]
    fn test_library_wins_over_package_root() {
        let aliases = PathAliases::none()
            .with_library_dir(Some(Path::new("/opt/rust/library")))
            .with_package_dir(Some(Path::new("/opt/rust")));

        assert_eq!(
            aliases.alias("/opt/rust/library/std/src/io.rs"),
            "<LIBDIR>/std/src/io.rs"
        );
    }

    #[test]
    fn test_package_name() {
        let aliases = aliases();
        assert_eq!(
            aliases.package_name("/home/dev/.pkgs/packages/serde-1.0.0/src/de.rs"),
            Some("serde-1.0.0".to_string())
        );
        assert_eq!(aliases.package_name("/work/app/src/main.rs"), None);
        assert_eq!(PathAliases::none().package_name("/home/dev/.pkgs/packages/a/b.rs"), None);
    }

    #[test]
    fn test_trailing_separator_trimmed() {
        let aliases = PathAliases::none().with_working_dir(Some(Path::new("/work/app/")));
        assert_eq!(aliases.working_dir(), Some("/work/app"));
        assert_eq!(aliases.alias("/work/app/a.rs"), "<PWD>/a.rs");
    }
}
