//! End-to-end build driver coverage over a stubbed external build.
//!
//! Exercises the full flow: two sequential architecture builds (simulated
//! by executor side effects), then the merge phase producing one universal
//! dynamic image and one merged static archive at the host build tree's
//! artifact paths.

use camino::Utf8PathBuf;
use unibuild::arch::Architecture;
use unibuild::archive::merge::MemberDisposition;
use unibuild::driver::{ArtifactReport, BuildConfig, BuildError, Driver};
use unibuild::executor::Invocation;
use unibuild::fat::{architectures, read_fat};
use unibuild::macho::{MH_DYLIB, MH_OBJECT};
use unibuild::manifest::{ArtifactManifest, BuildArtifact};
use unibuild::test_utils::{
    ExpectedCall, StubExecutor, read_archive, success_output, thin_macho, write_archive,
    write_fixture,
};

fn utf8(path: std::path::PathBuf) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path).expect("utf-8 temp path")
}

fn test_config(temp: &tempfile::TempDir) -> BuildConfig {
    let mut config = BuildConfig::openssl_defaults(
        utf8(temp.path().to_owned()),
        Utf8PathBuf::from("/opt/demo"),
        Utf8PathBuf::from("/opt/demo/etc"),
    );
    config.architectures = vec![
        Architecture::try_from("x86_64").expect("valid"),
        Architecture::try_from("arm64").expect("valid"),
    ];
    config.manifest = ArtifactManifest::new(vec![
        BuildArtifact::image("libdemo.dylib"),
        BuildArtifact::archive("libdemo.a"),
    ]);
    config
}

/// A make invocation whose side effect writes the artifacts a real build
/// would leave in its build directory.
fn make_call(
    cputype: u32,
    dylib_body: &'static [u8],
    members: Vec<(&'static str, Vec<u8>)>,
) -> ExpectedCall {
    ExpectedCall {
        program: "make",
        args: Vec::new(),
        result: Ok(success_output()),
        side_effect: Some(Box::new(move |invocation: &Invocation| {
            let dir = invocation.cwd.as_std_path();
            write_fixture(
                dir,
                "libdemo.dylib",
                &thin_macho(cputype, 3, MH_DYLIB, dylib_body),
            );
            let entries: Vec<(&str, &[u8])> = members
                .iter()
                .map(|(name, contents)| (*name, contents.as_slice()))
                .collect();
            write_archive(dir, "libdemo.a", &entries);
            Ok(())
        })),
    }
}

#[test]
fn builds_both_architectures_and_merges_every_artifact() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config = test_config(&temp);
    let x86 = &config.architectures[0];
    let arm = &config.architectures[1];

    let a_obj = thin_macho(x86.cputype(), 3, MH_OBJECT, b"a.o intel only");
    let b_x86 = thin_macho(x86.cputype(), 3, MH_OBJECT, b"b.o intel");
    let b_arm = thin_macho(arm.cputype(), 0, MH_OBJECT, b"b.o arm");
    let c_obj = thin_macho(arm.cputype(), 0, MH_OBJECT, b"c.o arm only");

    let executor = StubExecutor::new(vec![
        ExpectedCall::succeeding("perl", config.configure_args(x86)),
        make_call(
            x86.cputype(),
            b"intel image",
            vec![("a.o", a_obj.clone()), ("b.o", b_x86.clone())],
        ),
        ExpectedCall::succeeding("perl", config.configure_args(arm)),
        make_call(
            arm.cputype(),
            b"arm image",
            vec![("b.o", b_arm.clone()), ("c.o", c_obj.clone())],
        ),
    ]);

    let mut progress = Vec::new();
    let report = Driver::new(&config, &executor)
        .run(&mut progress)
        .expect("build succeeds");
    executor.assert_finished();

    // Exactly one report entry per manifest artifact, at host-tree paths.
    assert_eq!(report.artifacts.len(), 2);
    let image_path = config.build_dir(x86).join("libdemo.dylib");
    let archive_path = config.build_dir(x86).join("libdemo.a");
    assert_eq!(report.artifacts[0].path(), &image_path);
    assert_eq!(report.artifacts[1].path(), &archive_path);

    // The merged image is universal and reports both architectures.
    let archs = architectures(&image_path).expect("universal image");
    let names: Vec<&str> = archs.iter().map(Architecture::as_str).collect();
    assert_eq!(names, vec!["x86_64", "arm64"]);

    // The merged archive lists the union of member names; the shared member
    // holds both slices, unique members are carried through untouched.
    let members = read_archive(&archive_path);
    let member_names: Vec<&str> = members.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(member_names, vec!["a.o", "b.o", "c.o"]);
    assert_eq!(members[0].1, a_obj);
    assert_eq!(members[2].1, c_obj);

    let merged_b = write_fixture(temp.path(), "merged_b.o", &members[1].1);
    let slices = read_fat(&merged_b).expect("universal member");
    assert_eq!(slices.len(), 2);
    assert_eq!(slices[0].data, b_x86);
    assert_eq!(slices[1].data, b_arm);

    match &report.artifacts[1] {
        ArtifactReport::Archive { members, .. } => {
            assert_eq!(
                members,
                &vec![
                    ("a.o".to_owned(), MemberDisposition::CopiedThrough),
                    ("b.o".to_owned(), MemberDisposition::Universal),
                    ("c.o".to_owned(), MemberDisposition::CopiedThrough),
                ]
            );
        }
        other => panic!("expected archive report, got {other:?}"),
    }

    // Progress narrates the sequential builds and each merge.
    let progress = String::from_utf8(progress).expect("progress was not UTF-8");
    assert!(progress.contains("Building x86_64 (1/2)"));
    assert!(progress.contains("Building arm64 (2/2)"));
    assert!(progress.contains("Merging libdemo.a"));
}

#[test]
fn a_member_merge_failure_aborts_the_whole_build() {
    let temp = tempfile::tempdir().expect("temp dir");
    let config = test_config(&temp);
    let x86 = &config.architectures[0];
    let arm = &config.architectures[1];

    // The counterpart build emits b.o with the host's cputype: the member
    // merge sees an architecture collision and the build must abort.
    let executor = StubExecutor::new(vec![
        ExpectedCall::succeeding("perl", config.configure_args(x86)),
        make_call(
            x86.cputype(),
            b"intel image",
            vec![("b.o", thin_macho(x86.cputype(), 3, MH_OBJECT, b"intel"))],
        ),
        ExpectedCall::succeeding("perl", config.configure_args(arm)),
        make_call(
            arm.cputype(),
            b"arm image",
            vec![("b.o", thin_macho(x86.cputype(), 3, MH_OBJECT, b"mislabelled"))],
        ),
    ]);

    let result = Driver::new(&config, &executor).run(&mut std::io::sink());
    executor.assert_finished();

    match result {
        Err(BuildError::Archive { artifact, .. }) => {
            assert_eq!(artifact, Utf8PathBuf::from("libdemo.a"));
        }
        other => panic!("expected archive merge failure, got {other:?}"),
    }

    // The failed archive merge left the host archive as the thin original.
    let archive_path = config.build_dir(x86).join("libdemo.a");
    let members = read_archive(&archive_path);
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].1, thin_macho(x86.cputype(), 3, MH_OBJECT, b"intel"));
}
