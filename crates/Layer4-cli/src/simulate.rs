//! Simulated agent loop
//!
//! Each iteration fans out `children` workers that make one simulated model
//! call each, then the root records a scratchpad entry. The loop asks to
//! terminate once `max_iterations` is reached.

use async_trait::async_trait;
use forgeloop_agent::{call_model, fan_out, loop_fn, AgentLoop, ChildJob, ChunkSink, ModelClient};
use forgeloop_core::{AgentLoopResult, ExecutionContext, ModelRequest, ModelResponse, ModelUsage, ScratchpadEntry};
use forgeloop_foundation::{Error, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Simulation knobs.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub children: usize,
    pub tokens_per_call: u64,
    pub max_iterations: u64,
    pub latency: Duration,
}

/// Model client that streams a canned answer and reports fixed usage.
pub struct SimulatedModel {
    tokens_per_call: u64,
    latency: Duration,
}

impl SimulatedModel {
    pub fn new(tokens_per_call: u64, latency: Duration) -> Self {
        Self {
            tokens_per_call,
            latency,
        }
    }
}

#[async_trait]
impl ModelClient for SimulatedModel {
    async fn complete(&self, request: &ModelRequest, sink: &ChunkSink) -> Result<ModelResponse> {
        let answer = format!("worked on: {}", request.prompt);
        for word in answer.split_whitespace() {
            sink.send(word);
        }
        tokio::time::sleep(self.latency).await;
        Ok(ModelResponse::new(
            answer,
            ModelUsage::new(self.tokens_per_call, self.tokens_per_call / 4),
        ))
    }
}

/// Model name for worker `index`; workers alternate between two models so
/// per-model limits have something to tell apart.
fn model_for(index: usize) -> &'static str {
    if index % 2 == 0 {
        "sim-large"
    } else {
        "sim-small"
    }
}

/// Build the step function for a simulation run.
pub fn simulated_loop(config: SimulationConfig) -> impl AgentLoop {
    let client = Arc::new(SimulatedModel::new(config.tokens_per_call, config.latency));

    loop_fn(move |ctx: Arc<ExecutionContext>| {
        let client = Arc::clone(&client);
        let config = config.clone();
        async move {
            let iteration = ctx.iteration();
            let jobs = (0..config.children)
                .map(|i| ChildJob::new(format!("worker-{iteration}-{i}"), i))
                .collect();

            let results = fan_out(&ctx, jobs, move |child, index| {
                let client = Arc::clone(&client);
                async move {
                    let request = ModelRequest::new(model_for(index), child.task());
                    call_model(&child, client.as_ref(), &request).await
                }
            })
            .await;

            let mut completed = 0;
            for result in results {
                match result {
                    Ok(_) => completed += 1,
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => return Err(Error::Step(e.to_string())),
                }
            }

            ctx.push_scratchpad(
                ScratchpadEntry::step(iteration, format!("fanned out to {completed} workers"))
                    .with_action("fan_out")
                    .with_observation(format!("{completed} workers completed")),
            );

            if iteration >= config.max_iterations {
                Ok(AgentLoopResult::terminate(json!({
                    "iterations": iteration,
                    "workers": completed,
                })))
            } else {
                Ok(AgentLoopResult::next())
            }
        }
    })
}
