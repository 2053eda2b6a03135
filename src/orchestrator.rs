//! Drives a task from ticket to pull request.
//!
//! Stages run strictly in order: planning, code generation, normalization and
//! publishing. A failing stage stops the run and its error is tagged with the
//! stage so callers can tell where it broke.

use log::*;
use serde::Serialize;
use std::{fmt, future::Future, sync::Arc, time::Duration, time::Instant};

use crate::{
    Result,
    generate::{Generator, generate_code, generate_plan},
    patch::{FileChange, normalize::normalize},
    publisher::{GitPublisher, PublishRequest, PublishResult},
    task::Task,
};

/// Steps of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Planning,
    Generating,
    Normalizing,
    Publishing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Planning => "planning",
            Stage::Generating => "generating",
            Stage::Normalizing => "normalizing",
            Stage::Publishing => "publishing",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Running,
    Succeeded,
    Failed,
}

/// Outcome and wall time of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    pub elapsed_ms: u128,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub task_id: u64,
    pub plan: String,
    pub files: Vec<FileChange>,
    pub publish: PublishResult,
    pub stages: Vec<StageRecord>,
}

#[derive(Debug, Default)]
struct StageTracker {
    records: Vec<StageRecord>,
}

impl StageTracker {
    async fn run<T, F>(&mut self, stage: Stage, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        info!("{stage}: started");

        let index = self.records.len();
        self.records.push(StageRecord {
            stage,
            status: StageStatus::Running,
            elapsed_ms: 0,
        });

        let started = Instant::now();
        let result = work.await;

        let record = &mut self.records[index];
        record.elapsed_ms = started.elapsed().as_millis();

        match result {
            Ok(value) => {
                record.status = StageStatus::Succeeded;
                info!("{stage}: done in {}ms", record.elapsed_ms);
                Ok(value)
            }
            Err(err) => {
                record.status = StageStatus::Failed;
                error!("{stage}: failed: {err}");
                Err(err.in_stage(stage))
            }
        }
    }
}

/// Runs tasks through generation and publication.
pub struct Orchestrator {
    planner: Arc<dyn Generator>,
    coder: Arc<dyn Generator>,
    publisher: Arc<GitPublisher>,
    publish_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        planner: Arc<dyn Generator>,
        coder: Arc<dyn Generator>,
        publisher: Arc<GitPublisher>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            planner,
            coder,
            publisher,
            publish_timeout,
        }
    }

    pub async fn run(&self, task: &Task) -> Result<PipelineReport> {
        info!("processing task #{}: {}", task.id, task.title);

        let mut tracker = StageTracker::default();

        let plan = tracker
            .run(
                Stage::Planning,
                generate_plan(
                    self.planner.as_ref(),
                    &task.title,
                    &task.description,
                ),
            )
            .await?;

        let raw = tracker
            .run(
                Stage::Generating,
                generate_code(self.coder.as_ref(), &task.title, &task.description),
            )
            .await?;

        let files = tracker
            .run(Stage::Normalizing, async {
                let files = normalize(raw);
                debug!("normalized {} file(s)", files.len());
                Ok(files)
            })
            .await?;

        let request = PublishRequest {
            branch_name: task.branch_name(),
            commit_message: task.commit_message(),
            files: files.clone(),
            plan: Some(plan.clone()),
        };

        let publish = tracker
            .run(
                Stage::Publishing,
                self.publisher
                    .publish_with_timeout(request, self.publish_timeout),
            )
            .await?;

        info!("task #{} published: {}", task.id, publish.pr_url);

        Ok(PipelineReport {
            task_id: task.id,
            plan,
            files,
            publish,
            stages: tracker.records,
        })
    }
}
