use std::sync::Arc;

use file_fetcher::test_support::{RecordingReporter, StubFetcher};
use file_fetcher::{
    DependencyFile, ErrorKind, FetchError, FetchResult, FetcherRegistry, Job, Orchestrator,
    ReportingService, ResultSink,
};
use file_fetcher_store::{FileResultSink, StoreError, read_artifact, read_snapshot};
use serde_json::{Value, json};

fn sample_job() -> Job {
    let definition = json!({
        "job": {
            "package-manager": "bundler",
            "source": {
                "provider": "github",
                "repo": "acme/widgets",
                "directory": "/",
                "branch": "main"
            },
            "experiments": { "grouped-updates": true }
        },
        "credentials": [{
            "type": "git_source",
            "host": "github.com",
            "username": "x-access-token",
            "password": "t0ken"
        }]
    });
    Job::from_definition("42", &definition, None).unwrap()
}

fn sample_result() -> FetchResult {
    FetchResult {
        files: vec![
            DependencyFile::text("Gemfile", "/", "gem 'rake'\n"),
            DependencyFile::binary("rake-13.0.6.gem", "/vendor/cache", vec![0x1f, 0x8b, 0x00, 0xff]),
        ],
        base_commit_sha: "1c6331732c41e4557a16dacb82534f1d1c831848".into(),
    }
}

#[tokio::test]
async fn writes_artifact_that_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let sink = FileResultSink::new(&output);

    sink.persist(&sample_result(), &sample_job()).await.unwrap();

    assert_eq!(read_artifact(&output).await.unwrap(), sample_result());
}

#[tokio::test]
async fn artifact_layout() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let sink = FileResultSink::new(&output);

    sink.persist(&sample_result(), &sample_job()).await.unwrap();

    let written: Value = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
    assert_eq!(
        written["base_commit_sha"],
        "1c6331732c41e4557a16dacb82534f1d1c831848"
    );

    let files = written["base64_dependency_files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["name"], "Gemfile");
    assert_eq!(files[0]["content"], "gem 'rake'\n");
    assert_eq!(files[0]["binary"], false);
    assert_eq!(files[1]["directory"], "/vendor/cache");
    assert_eq!(files[1]["content"], "H4sA/w==");
    assert_eq!(files[1]["binary"], true);
    assert!(written.get("job").is_none());
}

#[tokio::test]
async fn creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested/deeper/output.json");
    let sink = FileResultSink::new(&output);

    sink.persist(&sample_result(), &sample_job()).await.unwrap();

    assert!(output.exists());
}

#[tokio::test]
async fn snapshot_carries_job_without_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let snapshot = dir.path().join("job.json");
    let sink = FileResultSink::new(&output).with_snapshot(&snapshot);

    sink.persist(&sample_result(), &sample_job()).await.unwrap();

    let (result, job) = read_snapshot(&snapshot).await.unwrap();
    assert_eq!(result, sample_result());
    assert_eq!(job["package-manager"], "bundler");
    assert_eq!(job["source"]["repo"], "acme/widgets");

    let raw = std::fs::read_to_string(&snapshot).unwrap();
    assert!(!raw.contains("t0ken"));
}

#[tokio::test]
async fn missing_artifact_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.json");

    let err = read_artifact(&missing).await.unwrap_err();

    assert!(matches!(&err, StoreError::Io { path, .. } if path == &missing));
    assert!(err.to_string().contains("nope.json"));
}

#[tokio::test]
async fn malformed_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.json");
    std::fs::write(&path, r#"{"base_commit_sha": "abc"}"#).unwrap();

    assert!(matches!(
        read_artifact(&path).await,
        Err(StoreError::Json(_))
    ));
}

#[tokio::test]
async fn corrupt_binary_content() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output.json");
    std::fs::write(
        &path,
        r#"{"base64_dependency_files":[{"name":"a.gem","directory":"/","content":"!!not base64!!","binary":true}],"base_commit_sha":"abc"}"#,
    )
    .unwrap();

    assert!(matches!(
        read_artifact(&path).await,
        Err(StoreError::Decode(_))
    ));
}

#[tokio::test]
async fn failed_snapshot_leaves_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let snapshot = dir.path().join("snapshot");
    std::fs::create_dir(&snapshot).unwrap();
    let sink = FileResultSink::new(&output).with_snapshot(&snapshot);

    let err = sink.persist(&sample_result(), &sample_job()).await.unwrap_err();

    assert!(matches!(err, FetchError::Io(_)));
    assert!(!output.exists());
    assert!(snapshot.is_dir());

    let mut leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    leftovers.sort();
    assert_eq!(leftovers, vec!["snapshot"]);
}

#[tokio::test]
async fn failed_run_produces_report_but_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("output.json");
    let snapshot = dir.path().join("snapshot");
    std::fs::create_dir(&snapshot).unwrap();

    let fetcher = Arc::new(
        StubFetcher::new("1c6331732c41e4557a16dacb82534f1d1c831848")
            .with_files(vec![DependencyFile::text("Gemfile", "/", "gem 'rake'\n")]),
    );
    let mut registry = FetcherRegistry::new();
    registry.register("bundler", move |_| Box::new(Arc::clone(&fetcher)));

    let reporter = Arc::new(RecordingReporter::new());
    let orchestrator = Orchestrator::new(
        Arc::new(registry),
        Arc::clone(&reporter) as Arc<dyn ReportingService>,
        Arc::new(FileResultSink::new(&output).with_snapshot(&snapshot)),
    );

    let outcome = orchestrator.run(&sample_job()).await;

    assert!(!outcome.is_success());
    assert_eq!(reporter.errors().len(), 1);
    assert_eq!(reporter.errors()[0].kind, ErrorKind::UnknownError);
    assert_eq!(
        reporter.processed(),
        vec!["1c6331732c41e4557a16dacb82534f1d1c831848"]
    );
    assert!(!output.exists());
}
