mod common;

use carousel::{
    GalleryEventKind, GalleryStore, GenerationError, GenerationRequest, JobStatus,
};
use common::{response, studio, templates, CountingSource, ScriptedGenerator};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_job_is_generating_before_generator_resolves() {
    let generator = Arc::new(ScriptedGenerator::answering(Some(response("3", &["One", "Two"], 42))).gated());
    let source = Arc::new(CountingSource::new(templates()));
    let studio = studio(generator.clone(), source.clone(), None, GalleryStore::in_memory());
    let mut events = studio.gallery().subscribe();

    let (job_id, handle) = studio.submit(GenerationRequest::new("post-1", "2"));

    // Visible before anything was awaited
    let job = studio.queue().get(&job_id).expect("Job not queued");
    assert_eq!(job.status, JobStatus::Generating);
    assert_eq!(job.template_name, "Template 2");
    assert!(studio.gallery().is_empty());

    generator.release();
    let entry = handle
        .await
        .expect("Generation task panicked")
        .expect("Generation failed");

    assert_eq!(entry.id, job_id);
    assert_eq!(entry.slides.len(), 2);
    assert!(entry.slides[0].contains("class=\"cover\""));
    assert!(entry.slides[1].contains(">Two</div>"));
    assert_eq!(entry.backend_id, Some(42));

    let job = studio.queue().get(&job_id).expect("Job missing");
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.result_slides.as_ref().map(Vec::len), Some(2));
    assert!(job.completed_at.is_some());

    let event = events.recv().await.expect("No gallery event");
    assert_eq!(event.kind, GalleryEventKind::Completed);
    assert_eq!(event.entry_id.as_deref(), Some(job_id.as_str()));
    assert_eq!(studio.gallery().get(&job_id), Some(entry));
}

#[tokio::test]
async fn test_renders_with_template_from_response() {
    let generator = Arc::new(ScriptedGenerator::answering(Some(response("7", &["A"], 1))));
    let source = Arc::new(CountingSource::new(templates()));
    let studio = studio(generator, source.clone(), None, GalleryStore::in_memory());

    let (_, handle) = studio.submit(GenerationRequest::new("post-1", "2"));
    handle
        .await
        .expect("Generation task panicked")
        .expect("Generation failed");

    assert_eq!(source.requested(), vec!["7".to_string()]);
}

#[tokio::test]
async fn test_request_carries_configured_token_and_payload() {
    let generator = Arc::new(ScriptedGenerator::answering(Some(response("2", &["A"], 1))));
    let source = Arc::new(CountingSource::new(templates()));
    let studio = studio(generator.clone(), source, None, GalleryStore::in_memory());

    let request = GenerationRequest::new("https://example.com/article", "2")
        .with_auth_token(Some("secret".to_string()))
        .with_source_id(11)
        .with_rich_payload(json!({ "headline": "Breaking" }));
    let (_, handle) = studio.submit(request);
    handle
        .await
        .expect("Generation task panicked")
        .expect("Generation failed");

    let sent = generator.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].auth_token.as_deref(), Some("secret"));
    assert_eq!(sent[0].source_id, Some(11));
    assert_eq!(sent[0].rich_payload, Some(json!({ "headline": "Breaking" })));
}

async fn run_failing(
    generator: ScriptedGenerator,
    source: CountingSource,
) -> (GenerationError, carousel::GenerationJob, usize) {
    let studio = studio(
        Arc::new(generator),
        Arc::new(source),
        None,
        GalleryStore::in_memory(),
    );

    let (job_id, handle) = studio.submit(GenerationRequest::new("post-9", "2"));
    let error = handle
        .await
        .expect("Generation task panicked")
        .expect_err("Generation should fail");
    let job = studio.queue().get(&job_id).expect("Job missing");

    (error, job, studio.gallery().len())
}

#[tokio::test]
async fn test_empty_array_response_fails_job() {
    let (error, job, stored) = run_failing(
        ScriptedGenerator::answering(Some(json!([]))),
        CountingSource::new(templates()),
    )
    .await;

    assert_eq!(error, GenerationError::EmptyArray);
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.error_message, Some(GenerationError::EmptyArray.to_string()));
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_null_response_fails_job() {
    for answer in [None, Some(serde_json::Value::Null)] {
        let (error, job, stored) = run_failing(
            ScriptedGenerator::answering(answer),
            CountingSource::new(templates()),
        )
        .await;

        assert_eq!(error, GenerationError::EmptyResponse);
        assert_eq!(job.error_message, Some(GenerationError::EmptyResponse.to_string()));
        assert_eq!(stored, 0);
    }
}

#[tokio::test]
async fn test_transport_failure_fails_job() {
    let (error, job, _) = run_failing(
        ScriptedGenerator::failing("connection reset"),
        CountingSource::new(templates()),
    )
    .await;

    match &error {
        GenerationError::Transport(message) => assert!(message.contains("connection reset")),
        other => panic!("Expected Transport, got {:?}", other),
    }
    assert_eq!(job.status, JobStatus::Error);
}

#[tokio::test]
async fn test_malformed_response_fails_job() {
    let (error, _, stored) = run_failing(
        ScriptedGenerator::answering(Some(json!([{ "slideContents": [] }]))),
        CountingSource::new(templates()),
    )
    .await;

    assert!(matches!(error, GenerationError::MalformedPayload(_)));
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_unavailable_template_fails_job() {
    let source = CountingSource::new(templates());
    source.set_failing(true);

    let (error, job, stored) = run_failing(
        ScriptedGenerator::answering(Some(response("5", &["A"], 1))),
        source,
    )
    .await;

    match &error {
        GenerationError::TemplateUnavailable { template_id, .. } => assert_eq!(template_id, "5"),
        other => panic!("Expected TemplateUnavailable, got {:?}", other),
    }
    assert_eq!(job.error_message, Some(error.to_string()));
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn test_template_without_slides_fails_job() {
    let (error, _, _) = run_failing(
        ScriptedGenerator::answering(Some(response("5", &["A"], 1))),
        CountingSource::new(Vec::new()),
    )
    .await;

    assert!(matches!(error, GenerationError::TemplateUnavailable { .. }));
}

#[tokio::test]
async fn test_storage_failure_fails_job_without_partial_entry() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let blocker = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocker, "file").expect("Failed to write blocker file");
    let gallery = GalleryStore::open(blocker.join("gallery.json")).expect("Failed to open gallery");

    let studio = studio(
        Arc::new(ScriptedGenerator::answering(Some(response("2", &["A"], 1)))),
        Arc::new(CountingSource::new(templates())),
        None,
        gallery,
    );

    let (job_id, handle) = studio.submit(GenerationRequest::new("post-1", "2"));
    let error = handle
        .await
        .expect("Generation task panicked")
        .expect_err("Generation should fail");

    assert!(matches!(error, GenerationError::Storage(_)));
    assert!(studio.gallery().is_empty());
    assert_eq!(
        studio.queue().get(&job_id).map(|job| job.status),
        Some(JobStatus::Error)
    );
}

#[tokio::test]
async fn test_concurrent_jobs_complete_independently() {
    let generator = Arc::new(ScriptedGenerator::answering(Some(response("2", &["A", "B", "C"], 3))));
    let source = Arc::new(CountingSource::new(templates()));
    let studio = studio(generator, source.clone(), None, GalleryStore::in_memory());

    let handles: Vec<_> = (0..5)
        .map(|i| studio.submit(GenerationRequest::new(format!("post-{}", i), "2")))
        .collect();
    assert_eq!(studio.queue().in_progress(), 5);

    for (_, handle) in handles {
        let entry = handle
            .await
            .expect("Generation task panicked")
            .expect("Generation failed");
        assert_eq!(entry.slides.len(), 3);
    }

    assert_eq!(studio.queue().in_progress(), 0);
    assert_eq!(studio.gallery().len(), 5);
    assert!(studio
        .queue()
        .snapshot()
        .iter()
        .all(|job| job.status == JobStatus::Completed));
    assert_eq!(source.calls(), 1);
}
