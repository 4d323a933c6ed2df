use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};

/// Sentinel defconfig name for builds that stage a per-project .config
/// instead of pointing the build at the project defconfig directly.
pub const GKI_DEFCONFIG: &str = "gki_defconfig";

/// Directories probed for a project defconfig, in search order.
pub const DEFCONFIG_DIRS: [&str; 2] = ["arch/arm/configs", "arch/arm64/configs"];

static CFI_CLANG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^CONFIG_CFI_CLANG\s*=\s*(.+)$").expect("invalid CONFIG_CFI_CLANG regex")
});
static BUILD_CONFIG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^CONFIG_BUILD_CONFIG_FILE\s*=\s*(.+)$")
        .expect("invalid CONFIG_BUILD_CONFIG_FILE regex")
});
static EXT_MODULES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^CONFIG_EXT_MODULES\s*=\s*(.+)$").expect("invalid CONFIG_EXT_MODULES regex")
});

/// What a project defconfig contributes to the generated build config.
#[derive(Debug, Clone, Default)]
pub struct DefconfigDirectives {
    /// True when the defconfig carries no CONFIG_CFI_CLANG line at all.
    /// Selects the staged per-project .config flow under [`GKI_DEFCONFIG`].
    pub special: bool,
    pub build_config: String,
    pub ext_modules: String,
}

/// Locate `name` under the architecture config directories; first hit wins.
pub fn locate(kernel_root: &Path, name: &str) -> Result<(PathBuf, &'static str)> {
    for dir in DEFCONFIG_DIRS {
        let candidate = kernel_root.join(dir).join(name);
        if candidate.exists() {
            debug!(path = %candidate.display(), "resolved project defconfig");
            return Ok((candidate, dir));
        }
    }
    Err(Error::msg(format!(
        "cannot find project defconfig file under {}",
        kernel_root.display()
    )))
}

fn quoted_value(re: &Regex, line: &str) -> Option<String> {
    re.captures(line).map(|c| c[1].trim_matches('"').to_string())
}

/// Run the directive extraction rules over one defconfig. Values match at
/// line start only; surrounding quotes are stripped; the last match wins.
pub fn scan(path: &Path) -> Result<DefconfigDirectives> {
    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read {}: {e}", path.display())))?;

    let mut out = DefconfigDirectives {
        special: true,
        ..Default::default()
    };
    for line in data.lines() {
        if CFI_CLANG_RE.is_match(line) {
            out.special = false;
        }
        if let Some(v) = quoted_value(&BUILD_CONFIG_RE, line) {
            out.build_config = v;
        }
        if let Some(v) = quoted_value(&EXT_MODULES_RE, line) {
            out.ext_modules = v;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scan_str(content: &str) -> DefconfigDirectives {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("project_defconfig");
        fs::write(&path, content).expect("write defconfig");
        scan(&path).expect("scan defconfig")
    }

    #[test]
    fn cfi_line_disables_special_mode() {
        let got = scan_str("CONFIG_FOO=y\nCONFIG_CFI_CLANG=y\nCONFIG_BAR=y\n");
        assert!(!got.special);
    }

    #[test]
    fn missing_cfi_line_selects_special_mode() {
        let got = scan_str("CONFIG_FOO=y\nCONFIG_BAR=y\n");
        assert!(got.special);
    }

    #[test]
    fn indented_cfi_line_does_not_count() {
        // Rules anchor at the line start.
        let got = scan_str("  CONFIG_CFI_CLANG=y\n");
        assert!(got.special);
    }

    #[test]
    fn build_config_value_is_unquoted_and_last_wins() {
        let got = scan_str(
            "CONFIG_BUILD_CONFIG_FILE=\"build.config.old\"\nCONFIG_BUILD_CONFIG_FILE=\"build.config.foo\"\n",
        );
        assert_eq!(got.build_config, "build.config.foo");
    }

    #[test]
    fn ext_modules_value_is_unquoted() {
        let got = scan_str("CONFIG_EXT_MODULES=\"vendor/a vendor/b\"\n");
        assert_eq!(got.ext_modules, "vendor/a vendor/b");
    }

    #[test]
    fn locate_prefers_arm_over_arm64() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path();
        for dir in DEFCONFIG_DIRS {
            fs::create_dir_all(root.join(dir)).expect("mkdir configs");
            fs::write(root.join(dir).join("foo_defconfig"), "CONFIG_FOO=y\n")
                .expect("write defconfig");
        }

        let (path, dir) = locate(root, "foo_defconfig").expect("locate");
        assert_eq!(dir, "arch/arm/configs");
        assert!(path.ends_with("arch/arm/configs/foo_defconfig"));
    }

    #[test]
    fn locate_reports_the_searched_root() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let err = locate(tmp.path(), "foo_defconfig").unwrap_err().to_string();
        assert!(
            err.contains("cannot find project defconfig file under"),
            "unexpected err: {err}"
        );
    }
}
