use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::{debug, info};

use crate::buildconfig::{self, BaseConfig};
use crate::defconfig::{self, DefconfigDirectives, GKI_DEFCONFIG};
use crate::error::{Error, Result};
use crate::util::{ensure_dir, write_lines};

/// Base build config forced when the project builds plain GKI.
const GKI_BASE_BUILD_CONFIG: &str = "build.config.mtk.aarch64";
/// Generic ARM64 build config copied (filtered) next to the primary artifact.
const GENERIC_BUILD_CONFIG: &str = "build.config.gki.aarch64";
/// Optional out-of-tree module list under the kernel root.
const EXT_MODULES_LIST: &str = "kernel/configs/ext_modules.list";
const DEFCONFIG_SUFFIX: &str = "_defconfig";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    User,
    Eng,
    Userdebug,
}

impl BuildMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::User => "user",
            BuildMode::Eng => "eng",
            BuildMode::Userdebug => "userdebug",
        }
    }

    /// Mode-specific config fragment appended to DEFCONFIG; empty for `user`.
    fn config_fragment(self) -> String {
        match self {
            BuildMode::User => String::new(),
            BuildMode::Eng | BuildMode::Userdebug => format!("{}.config", self.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    pub project: String,
    pub kernel_defconfig: String,
    pub kernel_defconfig_overlays: String,
    /// Accepted for interface stability; not consumed yet.
    pub kernel_build_config_overlays: String,
    pub build_mode: BuildMode,
    /// Accepted for interface stability; not consumed yet.
    pub abi_mode: String,
    pub out_file: PathBuf,
}

/// Generate the project build config and the filtered generic config under
/// `out_file`'s directory. Returns the two written paths.
pub fn generate(kernel_root: &Path, params: &GenerateParams) -> Result<(PathBuf, PathBuf)> {
    let out_dir = params.out_file.parent().unwrap_or(Path::new(""));
    if !out_dir.as_os_str().is_empty() {
        ensure_dir(out_dir)?;
    }

    let mut mode_config = params.build_mode.config_fragment();

    let (project, defconfig_name) = if params.kernel_defconfig.is_empty() {
        (
            params.project.clone(),
            format!("{}{}", params.project, DEFCONFIG_SUFFIX),
        )
    } else {
        (
            project_from_defconfig(&params.kernel_defconfig)?,
            params.kernel_defconfig.clone(),
        )
    };

    let (defconfig_path, defconfig_dir) = defconfig::locate(kernel_root, &defconfig_name)?;

    let directives = if defconfig_name == GKI_DEFCONFIG {
        // GKI builds ignore whatever the defconfig declares and never take
        // a build-mode suffix.
        mode_config.clear();
        DefconfigDirectives {
            build_config: GKI_BASE_BUILD_CONFIG.to_string(),
            ..Default::default()
        }
    } else {
        defconfig::scan(&defconfig_path)?
    };

    let base_path = kernel_root.join(&directives.build_config);
    if !base_path.is_file() {
        return Err(Error::msg(format!(
            "cannot get build.config under {}. Please check whether {} defined CONFIG_BUILD_CONFIG_FILE.",
            kernel_root.display(),
            defconfig_path.display()
        )));
    }
    let BaseConfig {
        mut lines,
        kernel_dir,
    } = buildconfig::transform_base(&base_path)?;
    debug!(path = %base_path.display(), "transformed base build config");

    push_common_directives(&mut lines, params.build_mode);
    push_defconfig_directives(
        &mut lines,
        params,
        &directives,
        &kernel_dir,
        DefconfigSite {
            name: &defconfig_name,
            dir: defconfig_dir,
            project: &project,
            mode_config: &mode_config,
        },
    );
    lines.push(ext_modules_directive(kernel_root, &directives.ext_modules)?);
    lines.push("DIST_CMDS='cp -p ${OUT_DIR}/.config ${DIST_DIR}'".to_string());

    let primary = PathBuf::from(format!("{}.mtk", params.out_file.display()));
    write_lines(&primary, &lines)?;
    info!(path = %primary.display(), "wrote generated build config");

    let generic = write_generic_config(kernel_root, out_dir)?;
    Ok((primary, generic))
}

/// Where the resolved defconfig sits and what surrounds it in DEFCONFIG.
struct DefconfigSite<'a> {
    name: &'a str,
    dir: &'a str,
    project: &'a str,
    mode_config: &'a str,
}

fn project_from_defconfig(name: &str) -> Result<String> {
    name.strip_suffix(DEFCONFIG_SUFFIX)
        .filter(|p| !p.is_empty())
        .map(|p| p.trim().to_string())
        .ok_or_else(|| {
            Error::msg(format!(
                "kernel defconfig '{name}' does not end in {DEFCONFIG_SUFFIX}"
            ))
        })
}

fn push_common_directives(lines: &mut Vec<String>, mode: BuildMode) {
    lines.push(
        "PATH=${ROOT_DIR}/../prebuilts/perl/linux-x86/bin:${ROOT_DIR}/build/build-tools/path/linux-x86:/usr/bin:/bin"
            .to_string(),
    );
    lines.push("MAKE_GOALS=\"all\"".to_string());
    if mode != BuildMode::User {
        lines.push("TRIM_NONLISTED_KMI=".to_string());
        lines.push("KMI_SYMBOL_LIST_STRICT_MODE=".to_string());
    }
    lines.push("MODULES_ORDER=".to_string());
    lines.push("KMI_ENFORCED=1".to_string());
    lines.push("if [ \"x${DO_ABI_MONITOR}\" == \"x1\" ]; then".to_string());
    lines.push("  KMI_SYMBOL_LIST_MODULE_GROUPING=0".to_string());
    lines.push("  KMI_SYMBOL_LIST_ADD_ONLY=1".to_string());
    lines.push(
        "  ADDITIONAL_KMI_SYMBOL_LISTS=\"${ADDITIONAL_KMI_SYMBOL_LISTS} android/abi_gki_aarch64\""
            .to_string(),
    );
    lines.push("fi".to_string());
    lines.push("unset BUILD_NUMBER".to_string());
}

fn push_defconfig_directives(
    lines: &mut Vec<String>,
    params: &GenerateParams,
    directives: &DefconfigDirectives,
    kernel_dir: &str,
    site: DefconfigSite<'_>,
) {
    if directives.special {
        // The build stages a copy of the defconfig into the output tree and
        // configures from there, addressed relative to the kernel checkout.
        lines.push(format!(
            "REL_KERNEL_PATH=`./${{KERNEL_DIR}}/scripts/get_rel_path.sh ${{ROOT_DIR}} {kernel_dir}`"
        ));
        let staged = format!(
            "{} ../../../${{REL_KERNEL_PATH}}/${{OUT_DIR}}/{}.config {} {}",
            GKI_DEFCONFIG, site.project, params.kernel_defconfig_overlays, site.mode_config
        );
        lines.push(format!("DEFCONFIG=\"{}\"", staged.trim()));
        lines.push(format!(
            "PRE_DEFCONFIG_CMDS=\"cp -p ${{KERNEL_DIR}}/{}/{} ${{OUT_DIR}}/{}.config\"",
            site.dir, site.name, site.project
        ));
    } else {
        let value = format!(
            "{} {} {}",
            site.name, params.kernel_defconfig_overlays, site.mode_config
        );
        lines.push(format!("DEFCONFIG=\"{}\"", value.trim()));
    }
}

fn ext_modules_directive(kernel_root: &Path, from_defconfig: &str) -> Result<String> {
    let list_path = kernel_root.join(EXT_MODULES_LIST);
    let mut listed = String::new();
    if list_path.is_file() {
        let data = fs::read_to_string(&list_path)
            .map_err(|e| Error::msg(format!("failed to read {}: {e}", list_path.display())))?;
        for line in data.lines() {
            listed = format!("{} {}", listed, line.trim());
        }
    }
    Ok(format!(
        "EXT_MODULES=\"{} {}\"",
        listed.trim(),
        from_defconfig.trim()
    ))
}

fn write_generic_config(kernel_root: &Path, out_dir: &Path) -> Result<PathBuf> {
    let src = kernel_root.join(GENERIC_BUILD_CONFIG);
    let mut lines = buildconfig::filter_generic(&src)?;
    lines.push("unset BUILD_CONFIG".to_string());

    let dst = out_dir.join(GENERIC_BUILD_CONFIG);
    write_lines(&dst, &lines)?;
    info!(path = %dst.display(), "wrote generic build config");
    Ok(dst)
}
