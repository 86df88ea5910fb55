//! The Graph Executor: a sequential, single-path step loop over a
//! [`WorkflowDefinition`], as opposed to the BSP superstep loop in
//! [`crate::pregel`]. One node is current at a time; branching is resolved
//! by `Router` nodes rather than conditional edges.

use crate::error::{GraphError, Result};
use crate::execution_state::{self, fields};
use crate::node::{NodeContext, NodeRegistry, NodeRunner};
use crate::persistence;
use crate::progress::{ProgressEventKind, ProgressSink};
use crate::state::StateSchema;
use crate::workflow::WorkflowDefinition;
use langgraph_checkpoint::CheckpointSaver;
use serde_json::{json, Value};
use std::sync::Arc;

/// Default maximum number of steps permitted within a single invocation.
pub const DEFAULT_STEP_CAP: usize = 64;

/// The outcome of running the step loop to either completion or suspension.
#[derive(Debug, Clone)]
pub enum ExecutorOutcome {
    /// The workflow reached a terminal node; this is the final state.
    Completed(Value),
    /// The workflow is waiting on user input; state has been snapshotted.
    Suspended(Value),
}

/// Executes a [`WorkflowDefinition`] against a state, one node at a time.
pub struct GraphExecutor {
    nodes: NodeRegistry,
    progress: Arc<dyn ProgressSink>,
    checkpoint_saver: Option<Arc<dyn CheckpointSaver>>,
    schema: StateSchema,
    step_cap: usize,
}

impl GraphExecutor {
    pub fn new(nodes: NodeRegistry, progress: Arc<dyn ProgressSink>) -> Self {
        Self {
            nodes,
            progress,
            checkpoint_saver: None,
            schema: execution_state::canonical_schema(),
            step_cap: DEFAULT_STEP_CAP,
        }
    }

    pub fn with_checkpoint_saver(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.checkpoint_saver = Some(saver);
        self
    }

    pub fn with_step_cap(mut self, step_cap: usize) -> Self {
        self.step_cap = step_cap;
        self
    }

    fn next_node_id(&self, workflow: &WorkflowDefinition, state: &Value, current: &str) -> Result<Option<String>> {
        if let Some(next) = state.get(fields::NEXT_NODE).and_then(Value::as_str) {
            return Ok(Some(next.to_string()));
        }

        let current_node = workflow.node(current).ok_or_else(|| {
            GraphError::Validation(format!("current node '{current}' not found in workflow"))
        })?;

        if current_node.node_type == crate::workflow::ROUTER_NODE_TYPE {
            if let Some(route) = state.get(fields::ROUTE_CHOSEN).and_then(Value::as_str) {
                return Ok(Some(route.to_string()));
            }
        }

        Ok(workflow.outgoing_edge(current).map(|e| e.to.clone()))
    }

    /// Run the step loop starting at `workflow.entry_point` (or, on resumption,
    /// wherever `state.currentNodeId` points), invocation-scoped by
    /// `conversation_id`/`invocation_id`.
    #[tracing::instrument(skip(self, workflow, state), fields(workflow_id = %workflow.id, conversation_id))]
    pub async fn run(
        &self,
        workflow: &WorkflowDefinition,
        conversation_id: &str,
        invocation_id: &str,
        mut state: Value,
    ) -> Result<ExecutorOutcome> {
        workflow.validate()?;

        let mut current = state
            .get(fields::CURRENT_NODE_ID)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| workflow.entry_point.clone());

        let mut visited: Vec<(NodeContext, Arc<dyn NodeRunner>)> = Vec::new();

        for step in 0..self.step_cap {
            let node = workflow.node(&current).ok_or_else(|| {
                GraphError::Validation(format!("node '{current}' not found in workflow"))
            })?;

            let runner = self.nodes.get(&node.node_type).ok_or_else(|| {
                GraphError::Validation(format!("no node runner registered for type '{}'", node.node_type))
            })?;

            let ctx = NodeContext {
                conversation_id: conversation_id.to_string(),
                invocation_id: invocation_id.to_string(),
                node_id: current.clone(),
            };

            // Nodes that consult `services` built from state alone (e.g. the
            // Prompt Engine reads `currentNodeConfig` off state) need these
            // populated before `run` is invoked, not just after.
            state = execution_state::merge(
                &self.schema,
                &state,
                &json!({
                    fields::CURRENT_NODE_TYPE: node.node_type.clone(),
                    fields::CURRENT_NODE_CONFIG: node.config.clone(),
                }),
            )?;

            self.progress
                .emit(conversation_id, invocation_id, &current, ProgressEventKind::Started, None)
                .await
                .ok();

            visited.push((ctx.clone(), runner.clone()));

            let delta = match runner.run(&ctx, &state, &node.config).await {
                Ok(delta) => delta,
                Err(err) => {
                    self.progress
                        .emit(
                            conversation_id,
                            invocation_id,
                            &current,
                            ProgressEventKind::Error,
                            Some(json!({"code": err.code(), "message": err.to_string()})),
                        )
                        .await
                        .ok();
                    return Err(err);
                }
            };

            state = execution_state::merge(&self.schema, &state, &delta)?;
            state = execution_state::merge(
                &self.schema,
                &state,
                &json!({fields::CURRENT_NODE_ID: current}),
            )?;

            let needs_input = state
                .get(fields::NEEDS_USER_INPUT)
                .and_then(Value::as_bool)
                .unwrap_or(false);

            if needs_input {
                self.progress
                    .emit(
                        conversation_id,
                        invocation_id,
                        &current,
                        ProgressEventKind::AwaitingInput,
                        state.get(fields::AWAITING_INPUT_FOR).cloned(),
                    )
                    .await
                    .ok();

                if let Some(saver) = &self.checkpoint_saver {
                    persistence::save_state(saver, conversation_id, &state, step as i32).await?;
                }
                commit_visited(&visited, &state).await;
                return Ok(ExecutorOutcome::Suspended(state));
            }

            self.progress
                .emit(conversation_id, invocation_id, &current, ProgressEventKind::Completed, None)
                .await
                .ok();

            if workflow.is_terminal(&current) {
                if let Some(saver) = &self.checkpoint_saver {
                    persistence::save_state(saver, conversation_id, &state, step as i32).await?;
                }
                commit_visited(&visited, &state).await;
                return Ok(ExecutorOutcome::Completed(state));
            }

            match self.next_node_id(workflow, &state, &current)? {
                Some(next) => {
                    state = execution_state::merge(
                        &self.schema,
                        &state,
                        &json!({fields::NEXT_NODE: Value::Null}),
                    )?;
                    current = next;
                }
                None => {
                    return Err(GraphError::Validation(format!(
                        "node '{current}' is non-terminal but has no successor"
                    )));
                }
            }
        }

        Err(GraphError::StepLimitExceeded {
            step_cap: self.step_cap,
            node: current,
        })
    }
}

/// Calls `NodeRunner::commit` on every node visited this invocation, in
/// visitation order, with the final state. Write failures are logged and
/// otherwise ignored, matching the Progress Channel's non-fatal policy.
async fn commit_visited(visited: &[(NodeContext, Arc<dyn NodeRunner>)], final_state: &Value) {
    for (ctx, runner) in visited {
        if let Err(err) = runner.commit(ctx, final_state).await {
            tracing::warn!(node = %ctx.node_id, error = %err, "node commit hook failed");
        }
    }
}

/// Resume a suspended conversation: load the prior snapshot, append the new
/// `userPrompt`, increment `inputCursor`, and clear the suspension flags.
pub async fn resume_state(
    saver: &Arc<dyn CheckpointSaver>,
    schema: &StateSchema,
    conversation_id: &str,
    user_prompt: &str,
) -> Result<Option<Value>> {
    let Some(prior) = persistence::load_state(saver, conversation_id).await? else {
        return Ok(None);
    };

    let cursor = prior
        .get(fields::INPUT_CURSOR)
        .and_then(Value::as_i64)
        .unwrap_or(0);

    let delta = json!({
        fields::USER_PROMPT: user_prompt,
        fields::NEEDS_USER_INPUT: false,
        fields::AWAITING_INPUT_FOR: Value::Null,
        fields::INPUT_CURSOR: cursor + 1,
    });

    Ok(Some(execution_state::merge(schema, &prior, &delta)?))
}
