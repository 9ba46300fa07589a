//! Build information served by the index endpoint.

use serde::Serialize;

/// Version and build metadata for the running binary.
///
/// Commit and build time are stamped at compile time via `RELAY_COMMIT`
/// and `RELAY_BUILD_TIME`; "unset" when built without them.
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    /// Project name.
    pub project: &'static str,
    /// Semantic version of the current build.
    pub release: &'static str,
    /// Commit hash the binary was built from.
    pub commit: &'static str,
    /// When the binary was built.
    pub build_time: &'static str,
}

impl BuildInfo {
    /// Build info for the current binary.
    #[must_use]
    pub fn current() -> Self {
        Self {
            project: "relay",
            release: env!("CARGO_PKG_VERSION"),
            commit: option_env!("RELAY_COMMIT").unwrap_or("unset"),
            build_time: option_env!("RELAY_BUILD_TIME").unwrap_or("unset"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_info_has_release() {
        let info = BuildInfo::current();
        assert_eq!(info.project, "relay");
        assert!(!info.release.is_empty());
    }
}
