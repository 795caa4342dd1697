//! Shared test utilities for the unibuild crate.

use crate::executor::{CommandExecutor, Invocation};
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::io;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Side effect run when a stubbed invocation is consumed, standing in for
/// the files a real build tool would produce.
pub type SideEffect = Box<dyn Fn(&Invocation) -> io::Result<()>>;

/// Represents an expected command invocation for testing.
pub struct ExpectedCall {
    /// The program expected to be executed (e.g., "make").
    pub program: &'static str,
    /// The arguments expected to be passed.
    pub args: Vec<String>,
    /// The result to return when this command is invoked.
    pub result: io::Result<Output>,
    /// Optional filesystem side effect simulating the tool's output.
    pub side_effect: Option<SideEffect>,
}

impl ExpectedCall {
    /// An expected call that succeeds with empty output and no side effect.
    #[must_use]
    pub fn succeeding(program: &'static str, args: Vec<String>) -> Self {
        Self {
            program,
            args,
            result: Ok(success_output()),
            side_effect: None,
        }
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations in order and returns predefined
/// results, allowing tests to verify build orchestration without running
/// real commands.
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    #[must_use]
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, invocation: &Invocation) -> io::Result<Output> {
        let call = self
            .expected
            .borrow_mut()
            .pop_front()
            .expect("unexpected command invocation");

        assert_eq!(call.program, invocation.program);
        assert_eq!(call.args, invocation.args);

        if let Some(side_effect) = &call.side_effect {
            side_effect(invocation)?;
        }

        call.result
    }
}

/// 64-bit Mach-O magic, little-endian on disk.
const MH_MAGIC_64: u32 = 0xfeed_facf;

/// Build a minimal thin Mach-O file: a 64-bit header with no load commands
/// followed by an opaque body. Enough for the mergers, which only read the
/// header and treat the rest as payload.
#[must_use]
pub fn thin_macho(cputype: u32, cpusubtype: u32, filetype: u32, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + body.len());
    for field in [MH_MAGIC_64, cputype, cpusubtype, filetype, 0, 0, 0, 0] {
        out.extend_from_slice(&field.to_le_bytes());
    }
    out.extend_from_slice(body);
    out
}

/// Write fixture bytes to `dir/name` and return the path.
///
/// # Panics
///
/// Panics on I/O failure or a non-UTF-8 temp path; fixtures are
/// test-only.
pub fn write_fixture(dir: &std::path::Path, name: &str, contents: &[u8]) -> Utf8PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    Utf8PathBuf::from_path_buf(path).expect("utf-8 fixture path")
}

/// Write a static archive with the given members, in order.
///
/// # Panics
///
/// Panics on I/O failure; fixtures are test-only.
pub fn write_archive(
    dir: &std::path::Path,
    name: &str,
    members: &[(&str, &[u8])],
) -> Utf8PathBuf {
    let path = dir.join(name);
    let file = fs::File::create(&path).expect("create archive fixture");
    let mut builder = ar::Builder::new(file);
    for (member_name, contents) in members {
        let header = ar::Header::new((*member_name).into(), contents.len() as u64);
        builder
            .append(&header, *contents)
            .expect("append archive member");
    }
    Utf8PathBuf::from_path_buf(path).expect("utf-8 fixture path")
}

/// Read back an archive's members as `(name, contents)` pairs, in order.
///
/// # Panics
///
/// Panics if the archive cannot be read; fixtures are test-only.
#[must_use]
pub fn read_archive(path: &Utf8Path) -> Vec<(String, Vec<u8>)> {
    let file = fs::File::open(path).expect("open archive");
    let mut archive = ar::Archive::new(file);
    let mut members = Vec::new();
    while let Some(entry) = archive.next_entry() {
        let mut entry = entry.expect("read archive entry");
        let name = String::from_utf8_lossy(entry.header().identifier()).into_owned();
        let mut contents = Vec::new();
        io::Read::read_to_end(&mut entry, &mut contents).expect("read member contents");
        members.push((name, contents));
    }
    members
}
