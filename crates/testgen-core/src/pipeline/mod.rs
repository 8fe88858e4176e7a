//! Stage-by-stage test generation.
//!
//! A run walks a fixed sequence of stages. [`machine::next_stage`] picks the
//! successor of each stage from its [`StageOutcome`]; [`stages`] holds the
//! work itself. The only way a run fails after it starts is initial
//! generation producing nothing, in which case every staged file written
//! by the run is removed again.

pub mod context;
pub mod machine;
mod stages;

pub use context::{PipelineContext, PipelineState, StageRecord};
pub use machine::{next_stage, PipelineStage, StageOutcome};
pub use stages::UNCOVERED_MARKER;

use std::time::Instant;

use tracing::{error, Instrument};
use uuid::Uuid;

use crate::error::{Result, TestgenError};
use crate::obs;

/// Drives one [`PipelineContext`] through every stage.
pub struct Pipeline<'a> {
    ctx: PipelineContext<'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(ctx: PipelineContext<'a>) -> Self {
        Pipeline { ctx }
    }

    pub fn context(&self) -> &PipelineContext<'a> {
        &self.ctx
    }

    /// Run every stage and return the final state.
    ///
    /// Returns [`TestgenError::NothingGenerated`] when no unit produced an
    /// artifact; staging, report and filesystem errors propagate as-is.
    pub async fn run(&self) -> Result<PipelineState> {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.drive(run_id).instrument(span).await
    }

    async fn drive(&self, run_id: String) -> Result<PipelineState> {
        let clock = Instant::now();
        let mut state = PipelineState::new(run_id);
        obs::emit_run_started(&state.run_id, &self.ctx.config.project_name, self.ctx.units.len());

        while !state.stage.is_terminal() {
            let stage = state.stage;
            obs::emit_stage_started(stage);
            let started = Instant::now();
            let outcome = stages::execute(stage, &self.ctx, &mut state).await?;
            let duration_ms = started.elapsed().as_millis() as u64;
            obs::emit_stage_finished(stage, outcome, duration_ms);
            state.stages.push(StageRecord {
                stage,
                outcome,
                duration_ms,
            });
            state.stage = next_stage(stage, outcome);
        }

        let aborted = state.is_aborted();
        obs::emit_run_finished(
            &state.run_id,
            clock.elapsed().as_millis() as u64,
            state.build_verified,
            aborted,
        );

        if aborted {
            error!("no tests were generated successfully, aborting");
            self.discard(&mut state)?;
            return Err(TestgenError::NothingGenerated {
                attempted: self.ctx.units.len(),
            });
        }
        Ok(state)
    }

    /// Remove every staged file this run created.
    fn discard(&self, state: &mut PipelineState) -> Result<()> {
        for artifact in state.artifacts.values() {
            self.ctx.staging.remove(&artifact.path)?;
        }
        state.artifacts.clear();
        Ok(())
    }
}
