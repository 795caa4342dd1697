//! Unibuild CLI entrypoint.
//!
//! This binary drives the dual-architecture build and exposes the merge
//! operations individually for use on pre-built artifacts.

use clap::Parser;
use std::io::Write;
use unibuild::arch::Architecture;
use unibuild::archive::merge::{CopyThroughPolicy, merge_archives};
use unibuild::cli::{BuildArgs, Cli, Command, MergeArchiveArgs, MergeArgs};
use unibuild::driver::{BuildConfig, Driver};
use unibuild::error::Result;
use unibuild::executor::SystemCommandExecutor;
use unibuild::image::merge_images;
use unibuild::manifest::ArtifactManifest;
use unibuild::object::merge_objects;
use unibuild::output::{report_lines, success_message, write_stderr_line};

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    match &cli.command {
        Command::Build(args) => run_build(args, stderr),
        Command::MergeImage(args) => run_merge_image(args, stderr),
        Command::MergeObject(args) => run_merge_object(args, stderr),
        Command::MergeArchive(args) => run_merge_archive(args, stderr),
    }
}

/// Runs the full dual-architecture build and merge.
fn run_build(args: &BuildArgs, stderr: &mut dyn Write) -> Result<()> {
    let config = build_config_for_args(args)?;
    let executor = SystemCommandExecutor;
    let driver = Driver::new(&config, &executor);

    let report = if args.quiet {
        driver.run(&mut std::io::sink())?
    } else {
        driver.run(stderr)?
    };

    if !args.quiet {
        write_stderr_line(stderr, "");
        write_stderr_line(stderr, success_message(&report));
        for line in report_lines(&report) {
            write_stderr_line(stderr, line);
        }
    }

    Ok(())
}

/// Merges single-architecture images from the command line.
fn run_merge_image(args: &MergeArgs, stderr: &mut dyn Write) -> Result<()> {
    merge_images(&args.inputs, &args.output)?;
    write_stderr_line(stderr, format!("Wrote universal image {}", args.output));
    Ok(())
}

/// Merges single-architecture objects from the command line.
fn run_merge_object(args: &MergeArgs, stderr: &mut dyn Write) -> Result<()> {
    merge_objects(&args.inputs, &args.output)?;
    write_stderr_line(stderr, format!("Wrote universal object {}", args.output));
    Ok(())
}

/// Merges per-architecture archives from the command line.
fn run_merge_archive(args: &MergeArchiveArgs, stderr: &mut dyn Write) -> Result<()> {
    let policy = copy_through_policy(args.strict_members);
    let merged = merge_archives(&args.inputs, &args.output, policy)?;
    write_stderr_line(
        stderr,
        format!(
            "Wrote merged archive {} ({} universal, {} copied through)",
            args.output,
            merged.universal_count(),
            merged.copied_count()
        ),
    );
    Ok(())
}

/// Builds a driver configuration from the CLI flags.
fn build_config_for_args(args: &BuildArgs) -> Result<BuildConfig> {
    let mut config = BuildConfig::openssl_defaults(
        args.source.clone(),
        args.prefix.clone(),
        args.config_dir.clone(),
    );

    if !args.arch.is_empty() {
        config.architectures = args
            .arch
            .iter()
            .map(|name| Architecture::try_from(name.as_str()))
            .collect::<Result<Vec<_>>>()?;
    }

    if let Some(manifest_path) = &args.manifest {
        config.manifest = ArtifactManifest::from_file(manifest_path)?;
    }

    config.copy_through = copy_through_policy(args.strict_members);

    Ok(config)
}

fn copy_through_policy(strict: bool) -> CopyThroughPolicy {
    if strict {
        CopyThroughPolicy::Strict
    } else {
        CopyThroughPolicy::Lenient
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}
