//! Build automation tasks for the docpool workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for docpool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all checks (format, lint, test, docs)
    Ci,
    /// Check formatting
    Fmt,
    /// Run clippy on all targets, warnings denied
    Clippy,
    /// Run the whole test suite
    Test,
    /// Run only the pool integration tests against the mock driver
    PoolTests {
        /// Only run tests whose name contains this filter
        filter: Option<String>,
    },
    /// Build documentation without dependencies
    Doc,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            fmt(&sh)?;
            clippy(&sh)?;
            test(&sh)?;
            doc(&sh)?;
            println!("All CI checks passed!");
        }
        Command::Fmt => fmt(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test => test(&sh)?,
        Command::PoolTests { filter } => pool_tests(&sh, filter.as_deref())?,
        Command::Doc => doc(&sh)?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let manifest = String::from_utf8(output.stdout).context("invalid UTF-8 in cargo output")?;
    PathBuf::from(manifest.trim())
        .parent()
        .map(PathBuf::from)
        .context("failed to get workspace root")
}

fn fmt(sh: &Shell) -> Result<()> {
    println!("==> fmt");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    println!("==> clippy");
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell) -> Result<()> {
    println!("==> test");
    cmd!(sh, "cargo test --workspace").run()?;
    Ok(())
}

fn pool_tests(sh: &Shell, filter: Option<&str>) -> Result<()> {
    println!("==> pool integration tests");
    let filter = filter.unwrap_or_default();
    cmd!(sh, "cargo test -p docpool-testing --tests -- {filter}").run()?;
    Ok(())
}

fn doc(sh: &Shell) -> Result<()> {
    println!("==> doc");
    cmd!(sh, "cargo doc --workspace --no-deps")
        .env("RUSTDOCFLAGS", "-D warnings")
        .run()?;
    Ok(())
}
