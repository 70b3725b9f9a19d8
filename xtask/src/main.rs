use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use clap::Parser;

const EBPF_TARGET: &str = "bpfel-unknown-none";

#[derive(Parser)]
enum Cli {
    /// Build the XDP counting program
    BuildEbpf {
        /// Set the endianness of the BPF target
        #[clap(default_value = EBPF_TARGET, long)]
        target: String,
        /// Build in release mode
        #[clap(long)]
        release: bool,
    },
    /// Build the XDP program and the daemon, then run the daemon as root
    Run {
        /// Build in release mode
        #[clap(long)]
        release: bool,
        /// Arguments to pass to pktcount
        #[clap(last = true)]
        run_args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let workspace_root = workspace_root()?;

    match cli {
        Cli::BuildEbpf { target, release } => build_ebpf(&workspace_root, &target, release),
        Cli::Run { release, run_args } => {
            build_ebpf(&workspace_root, EBPF_TARGET, release)?;
            run(&workspace_root, release, &run_args)
        }
    }
}

fn profile(release: bool) -> &'static str {
    if release {
        "release"
    } else {
        "debug"
    }
}

fn build_ebpf(workspace_root: &Path, target: &str, release: bool) -> Result<()> {
    let ebpf_dir = workspace_root.join("pktcount-ebpf");

    let mut cmd = Command::new("cargo");
    cmd.current_dir(&ebpf_dir)
        .env_remove("RUSTUP_TOOLCHAIN")
        .args([
            "+nightly",
            "build",
            "--target",
            target,
            "-Z",
            "build-std=core",
        ]);

    if release {
        cmd.arg("--release");
    }

    let status = cmd.status().context("failed to build eBPF program")?;
    if !status.success() {
        bail!("eBPF build failed with status: {}", status);
    }

    Ok(())
}

fn run(workspace_root: &Path, release: bool, run_args: &[String]) -> Result<()> {
    let mut cmd = Command::new("cargo");
    cmd.current_dir(workspace_root)
        .args(["build", "--package", "pktcount"]);

    if release {
        cmd.arg("--release");
    }

    let status = cmd.status().context("failed to build userspace binary")?;
    if !status.success() {
        bail!("userspace build failed with status: {}", status);
    }

    let bin = workspace_root
        .join("target")
        .join(profile(release))
        .join("pktcount");
    let object = workspace_root
        .join("pktcount-ebpf")
        .join("target")
        .join(EBPF_TARGET)
        .join(profile(release))
        .join("pktcount-ebpf");

    let mut cmd = Command::new("sudo");
    cmd.arg(bin).arg("--program").arg(object);
    cmd.args(run_args);

    let status = cmd.status().context("failed to run pktcount")?;
    if !status.success() {
        bail!("pktcount exited with status: {}", status);
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = Command::new("cargo")
        .args(["metadata", "--format-version=1", "--no-deps"])
        .output()
        .context("failed to run cargo metadata")?;

    let metadata: serde_json::Value =
        serde_json::from_slice(&output.stdout).context("failed to parse cargo metadata")?;

    let root = metadata["workspace_root"]
        .as_str()
        .context("workspace_root not found")?;
    Ok(PathBuf::from(root))
}
