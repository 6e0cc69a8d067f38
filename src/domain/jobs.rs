//! Durable derivation jobs and their state machine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of stages in the full derivation pipeline; progress advances by
/// `round(100 * k / DERIVATION_STAGES)` after stage `k` completes.
pub const DERIVATION_STAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Result of a finished job, kept on the record for client polling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobOutcome {
    #[serde(rename_all = "camelCase")]
    Completed {
        video_id: String,
        voice_id: String,
        transcript_summary: String,
    },
    Failed {
        error: String,
    },
}

/// One durable derivation job. Mutated only by the worker; queryable by id
/// after completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub video_id: String,
    pub video_url: String,
    pub speaker_name: String,
    pub state: JobState,
    pub progress: u8,
    pub result: Option<JobOutcome>,
}

impl JobRecord {
    /// A fresh queued record. Every submission gets a new id; deduplication
    /// of repeat submissions for the same video is the caller's concern.
    pub fn new(video_id: &str, video_url: &str, speaker_name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            video_id: video_id.to_string(),
            video_url: video_url.to_string(),
            speaker_name: speaker_name.to_string(),
            state: JobState::Queued,
            progress: 0,
            result: None,
        }
    }

    /// Apply a state transition if it is legal. States only flow
    /// queued -> active -> {completed, failed}; terminal states are final.
    pub fn advance(&mut self, next: JobState) -> bool {
        let legal = matches!(
            (self.state, next),
            (JobState::Queued, JobState::Active)
                | (JobState::Active, JobState::Completed)
                | (JobState::Active, JobState::Failed)
        );
        if legal {
            self.state = next;
        }
        legal
    }

    pub fn set_stage_progress(&mut self, stage: usize, total: usize) {
        self.progress = (100.0 * stage as f64 / total as f64).round() as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_the_state_machine() {
        let mut job = JobRecord::new("vid", "url", "Speaker");
        assert_eq!(job.state, JobState::Queued);
        assert!(job.advance(JobState::Active));
        assert!(job.advance(JobState::Completed));
    }

    #[test]
    fn never_leaves_a_terminal_state() {
        let mut job = JobRecord::new("vid", "url", "Speaker");
        job.advance(JobState::Active);
        job.advance(JobState::Failed);
        assert!(!job.advance(JobState::Active));
        assert!(!job.advance(JobState::Completed));
        assert_eq!(job.state, JobState::Failed);
    }

    #[test]
    fn cannot_skip_the_active_state() {
        let mut job = JobRecord::new("vid", "url", "Speaker");
        assert!(!job.advance(JobState::Completed));
        assert!(!job.advance(JobState::Failed));
        assert_eq!(job.state, JobState::Queued);
    }

    #[test]
    fn stage_progress_is_rounded_percent() {
        let mut job = JobRecord::new("vid", "url", "Speaker");
        job.set_stage_progress(2, DERIVATION_STAGES);
        assert_eq!(job.progress, 40);
        job.set_stage_progress(5, DERIVATION_STAGES);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn each_submission_gets_a_fresh_id() {
        let a = JobRecord::new("vid", "url", "Speaker");
        let b = JobRecord::new("vid", "url", "Speaker");
        assert_ne!(a.id, b.id);
    }
}
