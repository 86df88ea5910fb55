//! Evaluates `config.routes` against state via the predicate DSL and writes
//! `__routeChosen`, which the graph executor reads in place of the static edge.

use async_trait::async_trait;
use langgraph_core::error::{GraphError, Result};
use langgraph_core::execution_state::fields;
use langgraph_core::node::{NodeContext, NodeRunner};
use langgraph_core::predicate::Predicate;
use serde_json::{json, Value};

pub const NODE_TYPE: &str = langgraph_core::workflow::ROUTER_NODE_TYPE;

struct Route {
    predicate: Option<Predicate>,
    condition: Option<String>,
    target: String,
    priority: i64,
}

#[derive(Default)]
pub struct RouterNode;

impl RouterNode {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NodeRunner for RouterNode {
    async fn run(&self, ctx: &NodeContext, state: &Value, config: &Value) -> Result<Value> {
        let default_route = config.get("defaultRoute").and_then(Value::as_str).map(str::to_string);
        let evaluate_all = config.get("evaluateAllConditions").and_then(Value::as_bool).unwrap_or(false);

        let mut routes = Vec::new();
        if let Some(entries) = config.get("routes").and_then(Value::as_array) {
            for entry in entries {
                let target = entry
                    .get("target")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| GraphError::node_execution(&ctx.node_id, "route entry missing 'target'"))?;
                let priority = entry.get("priority").and_then(Value::as_i64).unwrap_or(0);
                let condition = entry.get("condition").and_then(Value::as_str).map(str::to_string);
                let predicate = match condition.as_deref() {
                    Some(source) => Some(
                        Predicate::parse(source)
                            .map_err(|e| GraphError::node_execution(&ctx.node_id, format!("ROUTER_CONDITION_INVALID: {e}")))?,
                    ),
                    None => None,
                };
                routes.push(Route { predicate, condition, target, priority });
            }
        }
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut chosen: Option<&Route> = None;
        let mut matched_targets = Vec::new();
        for route in &routes {
            let matched = route.predicate.as_ref().map(|p| p.evaluate(state)).unwrap_or(true);
            if matched {
                matched_targets.push(route.target.as_str());
                if chosen.is_none() {
                    chosen = Some(route);
                }
                if !evaluate_all {
                    break;
                }
            }
        }

        if evaluate_all && matched_targets.len() > 1 {
            tracing::debug!(node = %ctx.node_id, matched = ?matched_targets, "evaluateAllConditions matched multiple routes");
        }

        let (target, reason) = match chosen {
            Some(route) => {
                let reason = match route.condition.as_deref() {
                    Some(condition) => format!("matched condition '{condition}', routed to '{}'", route.target),
                    None => format!("matched unconditional route to '{}'", route.target),
                };
                (route.target.clone(), reason)
            }
            None => {
                let target = default_route
                    .ok_or_else(|| GraphError::node_execution(&ctx.node_id, "no route matched and no defaultRoute configured"))?;
                let reason = format!("no route matched, used default '{target}'");
                (target, reason)
            }
        };

        Ok(json!({
            fields::ROUTE_CHOSEN: target,
            fields::ROUTING_REASON: reason,
        }))
    }
}
