//! Background worker consuming the durable job queue.

use crate::application::pipeline::PipelineService;
use crate::domain::error::CoreError;
use crate::domain::jobs::{JobOutcome, JobRecord, JobState, DERIVATION_STAGES};
use crate::domain::transcript;
use crate::ports::cache::VoiceCache;
use crate::ports::media::MediaSource;
use crate::ports::queue::JobStore;
use crate::ports::transcriber::Transcriber;
use crate::ports::voice::VoiceGateway;
use std::sync::Arc;
use tracing::{error, info, warn};

const SUMMARY_MAX_CHARS: usize = 400;

pub struct WorkerService<Q, C, M, T, V> {
    jobs: Arc<Q>,
    pipeline: Arc<PipelineService<C, M, T, V>>,
}

impl<Q, C, M, T, V> WorkerService<Q, C, M, T, V>
where
    Q: JobStore,
    C: VoiceCache,
    M: MediaSource,
    T: Transcriber,
    V: VoiceGateway,
{
    pub fn new(jobs: Arc<Q>, pipeline: Arc<PipelineService<C, M, T, V>>) -> Self {
        Self { jobs, pipeline }
    }

    /// Main worker loop - blocks on the queue waiting for job ids.
    pub async fn run_worker_loop(&self, worker_id: usize) {
        info!(worker_id, "worker started");
        loop {
            match self.jobs.dequeue(0.0).await {
                Ok(Some(job_id)) => {
                    if let Err(e) = self.process_job(&job_id).await {
                        error!(worker_id, job_id, error = %e, "job processing failed");
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    error!(worker_id, error = %e, "error dequeuing job");
                    tokio::time::sleep(tokio::time::Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Run one job through the full derivation. Stage failures land in the
    /// record's result for client polling; they are not raised to callers.
    pub async fn process_job(&self, job_id: &str) -> Result<(), CoreError> {
        let record = self
            .jobs
            .load(job_id)
            .await
            .map_err(|e| CoreError::internal("job store unavailable", e))?;
        let Some(mut record) = record else {
            warn!(job_id, "dequeued unknown job id");
            return Ok(());
        };
        if !record.advance(JobState::Active) {
            warn!(job_id, state = ?record.state, "job not in a runnable state");
            return Ok(());
        }
        self.save(&record).await;
        info!(job_id, video_id = %record.video_id, "derivation started");

        match self.run_stages(&mut record).await {
            Ok(outcome) => {
                record.advance(JobState::Completed);
                record.progress = 100;
                record.result = Some(outcome);
                info!(job_id, "derivation completed");
            }
            Err(e) => {
                record.advance(JobState::Failed);
                record.result = Some(JobOutcome::Failed {
                    error: e.to_string(),
                });
                error!(job_id, error = %e, "derivation failed");
            }
        }
        self.jobs
            .save(&record)
            .await
            .map_err(|e| CoreError::internal("job store unavailable", e))
    }

    async fn run_stages(&self, record: &mut JobRecord) -> Result<JobOutcome, CoreError> {
        let video_id = record.video_id.clone();

        let audio = self.pipeline.fetch_audio(&video_id, None).await?;
        self.step(record, 1).await;

        let segments = self
            .pipeline
            .transcribe_into_session(&video_id, &audio)
            .await?;
        self.step(record, 2).await;

        let sample = self.pipeline.extract_sample(&audio).await?;
        self.step(record, 3).await;

        let voice = self
            .pipeline
            .ensure_voice(&video_id, &record.speaker_name, &sample)
            .await?;
        self.step(record, 4).await;

        let summary = transcript::summary(&segments, SUMMARY_MAX_CHARS);
        self.step(record, 5).await;

        Ok(JobOutcome::Completed {
            video_id,
            voice_id: voice.computed.unwrap_or(voice.voice_id),
            transcript_summary: summary,
        })
    }

    async fn step(&self, record: &mut JobRecord, stage: usize) {
        record.set_stage_progress(stage, DERIVATION_STAGES);
        self.save(record).await;
    }

    /// Progress writes are advisory; a failed save must not fail the stage.
    async fn save(&self, record: &JobRecord) {
        if let Err(e) = self.jobs.save(record).await {
            warn!(job_id = %record.id, error = %e, "failed to persist job record");
        }
    }
}
