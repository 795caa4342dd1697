//! CLI argument definitions for unibuild.
//!
//! This module defines the command-line interface using clap. It is
//! separated from the main entrypoint to keep the binary small and focused
//! on orchestration.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

/// Build and merge universal (multi-architecture) Mach-O libraries.
#[derive(Parser, Debug)]
#[command(name = "unibuild")]
#[command(version, about)]
#[command(long_about = concat!(
    "Build and merge universal (multi-architecture) Mach-O libraries.\n\n",
    "unibuild drives an autoconf-style native library build once per target ",
    "architecture into architecture-tagged build directories, then combines ",
    "the per-architecture outputs into universal binaries: dynamic libraries ",
    "are repackaged whole, while static archives are merged member-by-member ",
    "so that shared compilation units become universal objects.\n\n",
    "The merged artifacts are written to the first-listed architecture's ",
    "build tree at the paths a single-architecture build would have used, so ",
    "a downstream install step need not know that merging occurred.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build a source tree for the host pair and merge the outputs:\n",
    "    $ unibuild build -s ./openssl-1.1.1m -p /opt/demo --config-dir /opt/demo/etc\n\n",
    "  Merge two single-architecture dylibs:\n",
    "    $ unibuild merge-image build_x86_64/libssl.dylib build_arm64/libssl.dylib -o libssl.dylib\n\n",
    "  Merge two static archives, failing on architecture-specific members:\n",
    "    $ unibuild merge-archive libcrypto_x86.a libcrypto_arm.a -o libcrypto.a --strict-members\n",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build for every target architecture and merge the outputs.
    Build(BuildArgs),

    /// Merge single-architecture images into one universal image.
    MergeImage(MergeArgs),

    /// Merge single-architecture object files into one universal object.
    MergeObject(MergeArgs),

    /// Merge per-architecture static archives member-by-member.
    MergeArchive(MergeArchiveArgs),
}

/// Arguments for the build command.
#[derive(Parser, Debug, Clone)]
pub struct BuildArgs {
    /// Source directory containing the Configure script.
    #[arg(short, long, value_name = "DIR")]
    pub source: Utf8PathBuf,

    /// Installation prefix passed to the configure script.
    #[arg(short, long, value_name = "DIR")]
    pub prefix: Utf8PathBuf,

    /// Configuration directory passed to the configure script.
    #[arg(long, value_name = "DIR")]
    pub config_dir: Utf8PathBuf,

    /// Target architecture (repeatable; the first receives the merged
    /// artifacts) [default: host architecture and its counterpart].
    #[arg(short, long, value_name = "ARCH")]
    pub arch: Vec<String>,

    /// JSON manifest of expected build artifacts [default: OpenSSL 1.1
    /// library layout].
    #[arg(short, long, value_name = "FILE")]
    pub manifest: Option<Utf8PathBuf>,

    /// Fail when an archive member is present in only one architecture's
    /// build instead of carrying it through single-architecture.
    #[arg(long)]
    pub strict_members: bool,

    /// Suppress progress output.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the whole-file merge commands.
#[derive(Parser, Debug, Clone)]
pub struct MergeArgs {
    /// Single-architecture input files, one per architecture.
    #[arg(value_name = "INPUT", num_args = 2..)]
    pub inputs: Vec<Utf8PathBuf>,

    /// Destination for the universal output.
    #[arg(short, long, value_name = "FILE")]
    pub output: Utf8PathBuf,
}

/// Arguments for the archive merge command.
#[derive(Parser, Debug, Clone)]
pub struct MergeArchiveArgs {
    /// Per-architecture input archives.
    #[arg(value_name = "INPUT", num_args = 2..)]
    pub inputs: Vec<Utf8PathBuf>,

    /// Destination for the merged archive.
    #[arg(short, long, value_name = "FILE")]
    pub output: Utf8PathBuf,

    /// Fail when a member is present in only one input archive.
    #[arg(long)]
    pub strict_members: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_build_invocation() {
        let cli = Cli::parse_from([
            "unibuild",
            "build",
            "-s",
            "./openssl",
            "-p",
            "/opt/demo",
            "--config-dir",
            "/opt/demo/etc",
            "-a",
            "arm64",
            "-a",
            "x86_64",
            "--strict-members",
        ]);

        let Command::Build(args) = cli.command else {
            panic!("expected build subcommand");
        };
        assert_eq!(args.source, Utf8PathBuf::from("./openssl"));
        assert_eq!(args.arch, vec!["arm64".to_owned(), "x86_64".to_owned()]);
        assert!(args.strict_members);
        assert!(!args.quiet);
        assert!(args.manifest.is_none());
    }

    #[test]
    fn parses_a_merge_image_invocation() {
        let cli = Cli::parse_from([
            "unibuild",
            "merge-image",
            "a.dylib",
            "b.dylib",
            "-o",
            "universal.dylib",
        ]);

        let Command::MergeImage(args) = cli.command else {
            panic!("expected merge-image subcommand");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.output, Utf8PathBuf::from("universal.dylib"));
    }

    #[test]
    fn merge_commands_require_two_inputs() {
        let result = Cli::try_parse_from(["unibuild", "merge-object", "only.o", "-o", "out.o"]);
        assert!(result.is_err());
    }

    #[test]
    fn verify_cli_assertions() {
        use clap::CommandFactory;

        Cli::command().debug_assert();
    }
}
