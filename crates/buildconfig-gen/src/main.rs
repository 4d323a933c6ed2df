use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use buildconfig_gen::generator::{self, BuildMode, GenerateParams};
use buildconfig_gen::{Error, Result};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Generate a kernel build configuration from a project defconfig"
)]
struct Args {
    /// Project name
    #[arg(long, short = 'p', default_value = "")]
    project: String,
    /// Kernel project defconfig file
    #[arg(long, default_value = "")]
    kernel_defconfig: String,
    /// Kernel project overlay defconfig files
    #[arg(long, default_value = "")]
    kernel_defconfig_overlays: String,
    /// Kernel build config overlays
    #[arg(long, default_value = "")]
    kernel_build_config_overlays: String,
    /// Build mode
    #[arg(long, short = 'm', value_enum, default_value = "user")]
    build_mode: BuildMode,
    /// ABI mode
    #[arg(long, default_value = "")]
    abi_mode: String,
    /// Generated build configuration file
    #[arg(long, short = 'o', default_value = "")]
    out_file: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    if (args.project.is_empty() && args.kernel_defconfig.is_empty()) || args.out_file.is_empty() {
        let _ = Args::command().print_help();
        eprintln!("\nmust set --out-file, and --project or --kernel-defconfig");
        return ExitCode::from(2);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::from(2)
        }
    }
}

fn run(args: Args) -> Result<()> {
    let params = GenerateParams {
        project: args.project,
        kernel_defconfig: args.kernel_defconfig,
        kernel_defconfig_overlays: args.kernel_defconfig_overlays,
        kernel_build_config_overlays: args.kernel_build_config_overlays,
        build_mode: args.build_mode,
        abi_mode: args.abi_mode,
        out_file: PathBuf::from(args.out_file),
    };
    let root = kernel_root()?;
    generator::generate(&root, &params)?;
    Ok(())
}

/// The binary is deployed into `<kernel>/scripts/`; the kernel tree it
/// configures is two directory levels up from the executable.
fn kernel_root() -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| Error::msg(format!("failed to locate running executable: {e}")))?;
    let exe = exe.canonicalize().unwrap_or(exe);
    exe.parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .ok_or_else(|| Error::msg("executable has no enclosing kernel tree"))
}
