//! Cross-service tests over the in-process store and mocked collaborators.

use super::pipeline::{PipelineLimits, PipelineService};
use super::relay::RelayService;
use super::worker::WorkerService;
use crate::adapters::memory::MemoryStore;
use crate::domain::error::CoreError;
use crate::domain::jobs::{JobOutcome, JobRecord, JobState};
use crate::domain::session::SessionStore;
use crate::domain::transcript::TranscriptSegment;
use crate::ports::media::MockMediaSource;
use crate::ports::queue::JobStore;
use crate::ports::transcriber::MockTranscriber;
use crate::ports::voice::MockVoiceGateway;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{NamedTempFile, TempPath};

fn test_limits() -> PipelineLimits {
    PipelineLimits {
        clip_seconds: 90.0,
        sample_seconds: 60.0,
        max_window_seconds: 120.0,
        timeout: Duration::from_secs(5),
        attempts: 1,
    }
}

fn segments() -> Vec<TranscriptSegment> {
    vec![
        TranscriptSegment {
            start: 0.0,
            end: 5.0,
            text: "hello and welcome".to_string(),
        },
        TranscriptSegment {
            start: 5.0,
            end: 11.0,
            text: "today we cover ownership".to_string(),
        },
    ]
}

fn temp_audio() -> TempPath {
    NamedTempFile::new().unwrap().into_temp_path()
}

#[tokio::test]
async fn voice_clone_happens_at_most_once_per_video() {
    let mut voice = MockVoiceGateway::new();
    voice
        .expect_clone_voice_from_url()
        .times(1)
        .returning(|_, _| Ok("voice-1".to_string()));

    let pipeline = PipelineService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MockMediaSource::new()),
        Arc::new(MockTranscriber::new()),
        Arc::new(voice),
        Arc::new(SessionStore::new(16)),
        test_limits(),
    );

    let first = pipeline
        .clone_from_sample_url("dQw4w9WgXcQ", "Ada", "https://example.com/sample.mp3")
        .await
        .unwrap();
    assert!(!first.cache_hit);
    assert_eq!(first.voice_id, "voice-1");

    let second = pipeline
        .clone_from_sample_url("dQw4w9WgXcQ", "Ada", "https://example.com/sample.mp3")
        .await
        .unwrap();
    assert!(second.cache_hit);
    assert_eq!(second.voice_id, "voice-1");
}

#[tokio::test]
async fn worker_drives_a_job_to_completion() {
    let store = Arc::new(MemoryStore::new());

    let mut media = MockMediaSource::new();
    media
        .expect_fetch_audio()
        .times(1)
        .returning(|_, _| Ok(temp_audio()));
    media
        .expect_extract_sample()
        .times(1)
        .returning(|_, _| Ok(temp_audio()));

    let mut transcriber = MockTranscriber::new();
    transcriber
        .expect_transcribe()
        .times(1)
        .returning(|_| Ok(segments()));

    let mut voice = MockVoiceGateway::new();
    voice
        .expect_clone_voice()
        .times(1)
        .returning(|_, _| Ok("voice-1".to_string()));

    let pipeline = Arc::new(PipelineService::new(
        Arc::clone(&store),
        Arc::new(media),
        Arc::new(transcriber),
        Arc::new(voice),
        Arc::new(SessionStore::new(16)),
        test_limits(),
    ));
    let worker = WorkerService::new(Arc::clone(&store), Arc::clone(&pipeline));

    let record = JobRecord::new("dQw4w9WgXcQ", "https://youtu.be/dQw4w9WgXcQ", "Ada");
    let job_id = record.id.clone();
    store.enqueue(record).await.unwrap();

    let dequeued = store.dequeue(0.1).await.unwrap().unwrap();
    assert_eq!(dequeued, job_id);
    worker.process_job(&job_id).await.unwrap();

    let done = store.load(&job_id).await.unwrap().unwrap();
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.progress, 100);
    match done.result.unwrap() {
        JobOutcome::Completed {
            video_id,
            voice_id,
            transcript_summary,
        } => {
            assert_eq!(video_id, "dQw4w9WgXcQ");
            assert_eq!(voice_id, "voice-1");
            assert!(transcript_summary.contains("hello"));
        }
        JobOutcome::Failed { error } => panic!("job failed: {}", error),
    }

    // Re-cloning for the same video hits the cache; the provider mock
    // would panic if it were called again.
    let retry = pipeline
        .clone_from_sample_url("dQw4w9WgXcQ", "Ada", "https://example.com/sample.mp3")
        .await
        .unwrap();
    assert!(retry.cache_hit);
    assert_eq!(retry.voice_id, "voice-1");
}

#[tokio::test]
async fn failed_derivation_records_the_error() {
    let store = Arc::new(MemoryStore::new());

    let mut media = MockMediaSource::new();
    media
        .expect_fetch_audio()
        .times(1)
        .returning(|_, _| Err("yt-dlp exited with status 1".into()));

    let pipeline = Arc::new(PipelineService::new(
        Arc::clone(&store),
        Arc::new(media),
        Arc::new(MockTranscriber::new()),
        Arc::new(MockVoiceGateway::new()),
        Arc::new(SessionStore::new(16)),
        test_limits(),
    ));
    let worker = WorkerService::new(Arc::clone(&store), pipeline);

    let record = JobRecord::new("dQw4w9WgXcQ", "https://youtu.be/dQw4w9WgXcQ", "Ada");
    let job_id = record.id.clone();
    store.enqueue(record).await.unwrap();
    worker.process_job(&job_id).await.unwrap();

    let done = store.load(&job_id).await.unwrap().unwrap();
    assert_eq!(done.state, JobState::Failed);
    match done.result.unwrap() {
        JobOutcome::Failed { error } => assert!(error.contains("yt-dlp")),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn question_quota_admits_exactly_the_limit() {
    let mut voice = MockVoiceGateway::new();
    voice
        .expect_build_conversation()
        .times(2)
        .returning(|_, _, _, _| Ok("an answer".to_string()));

    let relay = RelayService::new(
        Arc::new(voice),
        Arc::new(SessionStore::new(16)),
        2,
        Duration::from_secs(5),
    );

    for _ in 0..2 {
        relay
            .build_conversation("vid", "voice-1", "Ada", "some context", "why?")
            .await
            .unwrap();
    }
    let err = relay
        .build_conversation("vid", "voice-1", "Ada", "some context", "why?")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::QuotaExceeded { limit: 2 }));
}

#[tokio::test]
async fn quota_is_tracked_per_video() {
    let mut voice = MockVoiceGateway::new();
    voice
        .expect_build_conversation()
        .times(2)
        .returning(|_, _, _, _| Ok("an answer".to_string()));

    let relay = RelayService::new(
        Arc::new(voice),
        Arc::new(SessionStore::new(16)),
        1,
        Duration::from_secs(5),
    );

    relay
        .build_conversation("vid-a", "voice-1", "Ada", "ctx", "why?")
        .await
        .unwrap();
    // vid-a is exhausted, vid-b is untouched.
    relay
        .build_conversation("vid-b", "voice-1", "Ada", "ctx", "why?")
        .await
        .unwrap();
    let err = relay
        .build_conversation("vid-a", "voice-1", "Ada", "ctx", "why?")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::QuotaExceeded { limit: 1 }));
}

#[tokio::test]
async fn converse_requires_an_existing_agent() {
    let relay = RelayService::new(
        Arc::new(MockVoiceGateway::new()),
        Arc::new(SessionStore::new(16)),
        20,
        Duration::from_secs(5),
    );
    let err = match relay.converse("vid", "hello?").await {
        Ok(_) => panic!("expected converse to fail without an agent"),
        Err(e) => e,
    };
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn context_window_requires_a_known_transcript() {
    let pipeline = PipelineService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MockMediaSource::new()),
        Arc::new(MockTranscriber::new()),
        Arc::new(MockVoiceGateway::new()),
        Arc::new(SessionStore::new(16)),
        test_limits(),
    );

    let err = pipeline.context_window_for("vid", 8.0).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    pipeline.sessions().set_transcript("vid", segments());
    let window = pipeline.context_window_for("vid", 8.0).unwrap();
    assert!(window.contains("hello and welcome"));
}

#[tokio::test]
async fn create_agent_is_memoized_per_video() {
    let mut voice = MockVoiceGateway::new();
    voice
        .expect_create_agent()
        .times(1)
        .returning(|_, _, _| Ok("agent-1".to_string()));

    let sessions = Arc::new(SessionStore::new(16));
    let pipeline = PipelineService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MockMediaSource::new()),
        Arc::new(MockTranscriber::new()),
        Arc::new(voice),
        Arc::clone(&sessions),
        test_limits(),
    );
    sessions.set_transcript("vid", segments());
    sessions.set_voice_id("vid", "voice-1");

    let first = pipeline.create_agent("vid", "Ada").await.unwrap();
    let second = pipeline.create_agent("vid", "Ada").await.unwrap();
    assert_eq!(first, "agent-1");
    assert_eq!(second, "agent-1");
}

#[tokio::test]
async fn create_agent_rejects_missing_prerequisites() {
    let pipeline = PipelineService::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MockMediaSource::new()),
        Arc::new(MockTranscriber::new()),
        Arc::new(MockVoiceGateway::new()),
        Arc::new(SessionStore::new(16)),
        test_limits(),
    );

    // No session at all.
    let err = pipeline.create_agent("vid", "Ada").await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));

    // Transcript present but no voice anywhere.
    pipeline.sessions().set_transcript("vid", segments());
    let err = pipeline.create_agent("vid", "Ada").await.unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}
