//! Batch driver behavior against a scripted frontend server.

use std::sync::Arc;

use kernelc::diagnostics::CollectingSink;
use kernelc::fingerprint::JsonFingerprintStore;
use kernelc::{BatchCompiler, BatchOptions, DriverError};

use crate::common::{runnable_artifacts, ChildScript, ScriptedSpawner};

struct Fixture {
    compiler: BatchCompiler,
    spawner_calls: std::sync::Arc<std::sync::Mutex<Vec<(std::path::PathBuf, Vec<String>)>>>,
    sink: Arc<CollectingSink>,
    options: BatchOptions,
    dir: tempfile::TempDir,
}

fn fixture(script: ChildScript) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let artifacts = runnable_artifacts(dir.path());

    let main = dir.path().join("m.dart");
    std::fs::write(&main, "void main() {}\n").unwrap();

    let spawner = ScriptedSpawner::new(script);
    let spawner_calls = spawner.calls();
    let sink = Arc::new(CollectingSink::new());
    let compiler = BatchCompiler::new(
        Arc::new(artifacts),
        Arc::new(spawner),
        sink.clone(),
        Arc::new(JsonFingerprintStore),
    );

    let options = BatchOptions {
        sdk_root: "/sdk".to_string(),
        main_path: main.to_string_lossy().into_owned(),
        output_file_path: "/out.dill".to_string(),
        link_platform_kernel: true,
        ..BatchOptions::default()
    };

    Fixture { compiler, spawner_calls, sink, options, dir }
}

fn success_script() -> ChildScript {
    ChildScript::Lines {
        stdout: vec!["result k1".to_string(), "k1 /out.dill 0".to_string()],
        stderr: vec![],
        exit_code: 0,
    }
}

#[tokio::test]
async fn test_successful_compile() {
    let fixture = fixture(success_script());

    let output = fixture.compiler.compile(&fixture.options).await.unwrap().unwrap();
    assert_eq!(output.output_path, "/out.dill");
    assert_eq!(output.error_count, 0);

    let calls = fixture.spawner_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.last().unwrap().ends_with("m.dart"));
}

#[tokio::test]
async fn test_nonzero_exit_is_absent() {
    let fixture = fixture(ChildScript::Lines {
        stdout: vec![],
        stderr: vec!["fatal: bad input".to_string()],
        exit_code: 1,
    });

    let output = fixture.compiler.compile(&fixture.options).await.unwrap();
    assert!(output.is_none());

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(fixture.sink.lines().iter().any(|line| line == "fatal: bad input"));
}

#[tokio::test]
async fn test_bare_terminator_is_absent_despite_clean_exit() {
    let fixture = fixture(ChildScript::Lines {
        stdout: vec!["result k1".to_string(), "k1".to_string()],
        stderr: vec![],
        exit_code: 0,
    });

    let output = fixture.compiler.compile(&fixture.options).await.unwrap();
    assert!(output.is_none());
}

#[tokio::test]
async fn test_fingerprint_skips_unchanged_compile() {
    let mut fixture = fixture(success_script());
    let depfile = fixture.dir.path().join("out.d");
    std::fs::write(&depfile, format!("/out.dill: {}\n", fixture.options.main_path)).unwrap();
    fixture.options.depfile_path = Some(depfile.to_string_lossy().into_owned());

    // First compile runs and persists the fingerprint.
    let output = fixture.compiler.compile(&fixture.options).await.unwrap().unwrap();
    assert_eq!(output.error_count, 0);
    assert_eq!(fixture.spawner_calls.lock().unwrap().len(), 1);
    assert!(depfile.with_extension("d.fingerprint").exists());

    // Second compile sees matching inputs and never spawns.
    let output = fixture.compiler.compile(&fixture.options).await.unwrap().unwrap();
    assert_eq!(output.output_path, "/out.dill");
    assert_eq!(output.error_count, 0);
    assert_eq!(fixture.spawner_calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_fingerprint_miss_after_source_change() {
    let mut fixture = fixture(success_script());
    let depfile = fixture.dir.path().join("out.d");
    std::fs::write(&depfile, format!("/out.dill: {}\n", fixture.options.main_path)).unwrap();
    fixture.options.depfile_path = Some(depfile.to_string_lossy().into_owned());

    fixture.compiler.compile(&fixture.options).await.unwrap().unwrap();
    std::fs::write(&fixture.options.main_path, "void main() { changed(); }\n").unwrap();

    fixture.compiler.compile(&fixture.options).await.unwrap().unwrap();
    assert_eq!(fixture.spawner_calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_tool_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = BatchCompiler::new(
        Arc::new(crate::common::FixedArtifacts {
            binary: dir.path().join("missing-dart"),
            snapshot: dir.path().join("missing.snapshot"),
        }),
        Arc::new(ScriptedSpawner::new(success_script())),
        Arc::new(CollectingSink::new()),
        Arc::new(JsonFingerprintStore),
    );

    let err = compiler
        .compile(&BatchOptions {
            sdk_root: "/sdk".to_string(),
            main_path: "/p/m.dart".to_string(),
            output_file_path: "/out.dill".to_string(),
            ..BatchOptions::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::ToolMissing { .. }));
}
