//! Flowchart
//!
//! Nodes are emitted without coordinates and connectors reference them by
//! id, so the applier's layered layout decides where everything goes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::actions::{Action, CircleArgs, ConnectorArgs, RectangleArgs};

const TERMINAL_RADIUS: f64 = 50.0;
const PROCESS_SIZE: (f64, f64) = (200.0, 80.0);
const DECISION_SIZE: (f64, f64) = (220.0, 100.0);

/// Shape of a step
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowNodeKind {
    /// Entry point (circle)
    Start,
    /// Ordinary step (rectangle)
    #[default]
    Process,
    /// Branch (highlighted rectangle)
    Decision,
    /// Exit point (circle)
    End,
}

/// One node
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowStep {
    /// Id referenced by edges (defaults to `step-N`)
    pub id: Option<String>,
    /// Text inside the node
    pub label: String,
    /// Shape
    pub kind: FlowNodeKind,
}

impl FlowStep {
    /// Step with a label and kind
    pub fn new(label: impl Into<String>, kind: FlowNodeKind) -> Self {
        Self {
            id: None,
            label: label.into(),
            kind,
        }
    }

    /// Give the step an explicit id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// One directed edge between step ids
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    /// Source step id
    pub from: String,
    /// Target step id
    pub to: String,
    /// Text at the connector midpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Flowchart template
///
/// With no edges the steps are chained in order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowchartTemplate {
    /// Nodes
    pub steps: Vec<FlowStep>,
    /// Edges (empty chains the steps)
    pub edges: Vec<FlowEdge>,
}

impl Default for FlowchartTemplate {
    fn default() -> Self {
        Self {
            steps: vec![
                FlowStep::new("Start", FlowNodeKind::Start),
                FlowStep::new("Step", FlowNodeKind::Process),
                FlowStep::new("End", FlowNodeKind::End),
            ],
            edges: Vec::new(),
        }
    }
}

impl FlowchartTemplate {
    fn step_ids(&self) -> Vec<String> {
        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)| step.id.clone().unwrap_or_else(|| format!("step-{}", i + 1)))
            .collect()
    }

    /// Node actions first, then one connector per edge
    #[must_use]
    pub fn expand(&self) -> Vec<Action> {
        let ids = self.step_ids();
        let mut actions: Vec<Action> = self
            .steps
            .iter()
            .zip(&ids)
            .map(|(step, id)| node(step, id))
            .collect();

        let edges: Vec<FlowEdge> = if self.edges.is_empty() {
            ids.windows(2)
                .map(|pair| FlowEdge {
                    from: pair[0].clone(),
                    to: pair[1].clone(),
                    label: None,
                })
                .collect()
        } else {
            self.edges.clone()
        };

        let known: HashSet<&str> = ids.iter().map(String::as_str).collect();
        for (n, edge) in edges.into_iter().enumerate() {
            if !known.contains(edge.from.as_str()) || !known.contains(edge.to.as_str()) {
                tracing::warn!(from = %edge.from, to = %edge.to, "Flowchart edge references an unknown step");
                continue;
            }
            actions.push(Action::CreateConnector(ConnectorArgs {
                start_id: Some(edge.from),
                end_id: Some(edge.to),
                label: edge.label,
                id: Some(format!("flow-edge-{}", n + 1)),
                ..ConnectorArgs::default()
            }));
        }
        actions
    }
}

fn node(step: &FlowStep, id: &str) -> Action {
    let text = Some(step.label.clone());
    let id = Some(id.to_string());
    match step.kind {
        FlowNodeKind::Start | FlowNodeKind::End => Action::CreateCircle(CircleArgs {
            radius: Some(TERMINAL_RADIUS),
            color: Some(if step.kind == FlowNodeKind::Start { "green" } else { "red" }.to_string()),
            text,
            id,
            ..CircleArgs::default()
        }),
        FlowNodeKind::Process | FlowNodeKind::Decision => {
            let (width, height, color) = if step.kind == FlowNodeKind::Decision {
                (DECISION_SIZE.0, DECISION_SIZE.1, "yellow")
            } else {
                (PROCESS_SIZE.0, PROCESS_SIZE.1, "lightblue")
            };
            Action::CreateRectangle(RectangleArgs {
                width: Some(width),
                height: Some(height),
                color: Some(color.to_string()),
                text,
                id,
                ..RectangleArgs::default()
            })
        }
    }
}
