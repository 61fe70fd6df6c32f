//! Diagram layout
//!
//! Layered placement for node/edge diagrams produced within one command.
//! Layers come from Kahn's algorithm: each pass takes every node whose
//! remaining indegree is zero as one layer. Nodes left over once the frontier
//! is empty sit on a cycle and are placed together in one extra final layer.
//!
//! Only objects created by the current command and referenced by connectors
//! created by the same command take part; everything pre-existing is ignored.

use std::collections::HashMap;

use super::draft::BoardDraft;
use super::geometry::Point;

/// Horizontal gap between nodes in one layer
pub const HORIZONTAL_GAP: f64 = 60.0;

/// Vertical gap between layers
pub const VERTICAL_GAP: f64 = 80.0;

/// Result of a layout pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiagramLayout {
    /// Node ids per layer, top to bottom
    pub layers: Vec<Vec<String>>,
    /// New top-left corner per node, in layer order
    pub positions: Vec<(String, Point)>,
}

impl DiagramLayout {
    /// Layer index of a node
    #[must_use]
    pub fn layer_of(&self, id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|node| node == id))
    }

    /// New position of a node
    #[must_use]
    pub fn position_of(&self, id: &str) -> Option<Point> {
        self.positions
            .iter()
            .find(|(node, _)| node == id)
            .map(|(_, point)| *point)
    }
}

/// Split `nodes` into layers following `edges`
///
/// `nodes` order decides the order within each layer. Edges whose endpoints
/// are not both in `nodes`, and self-loops, are ignored.
#[must_use]
pub fn compute_layers(nodes: &[String], edges: &[(String, String)]) -> Vec<Vec<String>> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut indegree = vec![0usize; nodes.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (from, to) in edges {
        let (Some(&from), Some(&to)) = (index.get(from.as_str()), index.get(to.as_str())) else {
            continue;
        };
        if from == to {
            continue;
        }
        children[from].push(to);
        indegree[to] += 1;
    }

    let mut visited = vec![false; nodes.len()];
    let mut layers: Vec<Vec<String>> = Vec::new();
    let mut frontier: Vec<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();

    while !frontier.is_empty() {
        for &node in &frontier {
            visited[node] = true;
        }
        let mut next = Vec::new();
        for &node in &frontier {
            for &child in &children[node] {
                indegree[child] -= 1;
                if indegree[child] == 0 && !visited[child] {
                    next.push(child);
                }
            }
        }
        next.sort_unstable();
        next.dedup();
        layers.push(frontier.iter().map(|&i| nodes[i].clone()).collect());
        frontier = next;
    }

    let leftovers: Vec<String> = (0..nodes.len())
        .filter(|&i| !visited[i])
        .map(|i| nodes[i].clone())
        .collect();
    if !leftovers.is_empty() {
        layers.push(leftovers);
    }

    layers
}

/// Lay out the diagram formed by `new_connectors` over `new_objects`
///
/// `new_objects` are ids created by the current command in creation order.
/// Layers are centered horizontally on `anchor` and the whole stack is
/// centered vertically on it. Returns an empty layout when no connector links
/// two new objects.
#[must_use]
pub fn layout_diagram(
    draft: &BoardDraft,
    new_objects: &[String],
    new_connectors: &[String],
    anchor: Point,
) -> DiagramLayout {
    let mut referenced: Vec<&str> = Vec::new();
    let mut edges: Vec<(String, String)> = Vec::new();

    for connector in new_connectors.iter().filter_map(|id| draft.get(id)) {
        let ends = [connector.start_id.as_deref(), connector.end_id.as_deref()];
        for id in ends.into_iter().flatten() {
            if !referenced.contains(&id) {
                referenced.push(id);
            }
        }
        if let (Some(from), Some(to)) = (&connector.start_id, &connector.end_id) {
            edges.push((from.clone(), to.clone()));
        }
    }

    let nodes: Vec<String> = new_objects
        .iter()
        .filter(|id| referenced.contains(&id.as_str()))
        .filter(|id| draft.get(id).is_some_and(|object| !object.is_connector()))
        .cloned()
        .collect();
    if nodes.is_empty() {
        return DiagramLayout::default();
    }

    let layers = compute_layers(&nodes, &edges);
    let size = |id: &str| {
        draft
            .get(id)
            .map_or((0.0, 0.0), |object| (object.width, object.height))
    };

    let layer_heights: Vec<f64> = layers
        .iter()
        .map(|layer| layer.iter().map(|id| size(id).1).fold(0.0, f64::max))
        .collect();
    let gaps = VERTICAL_GAP * layers.len().saturating_sub(1) as f64;
    let total_height: f64 = layer_heights.iter().sum::<f64>() + gaps;

    let mut positions = Vec::with_capacity(nodes.len());
    let mut top = anchor.y - total_height / 2.0;
    for (layer, height) in layers.iter().zip(&layer_heights) {
        let widths: Vec<f64> = layer.iter().map(|id| size(id).0).collect();
        let row_width = widths.iter().sum::<f64>()
            + HORIZONTAL_GAP * layer.len().saturating_sub(1) as f64;
        let mut left = anchor.x - row_width / 2.0;
        for (id, width) in layer.iter().zip(&widths) {
            let node_height = size(id).1;
            let y = top + (height - node_height) / 2.0;
            positions.push((id.clone(), Point::new(left, y)));
            left += width + HORIZONTAL_GAP;
        }
        top += height + VERTICAL_GAP;
    }

    DiagramLayout { layers, positions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardObject, ObjectType};

    fn ids(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    fn edge(from: &str, to: &str) -> (String, String) {
        (from.to_string(), to.to_string())
    }

    #[test]
    fn test_chain_gives_one_node_per_layer() {
        let layers = compute_layers(&ids(&["a", "b", "c"]), &[edge("a", "b"), edge("b", "c")]);
        assert_eq!(layers, vec![ids(&["a"]), ids(&["b"]), ids(&["c"])]);
    }

    #[test]
    fn test_fan_out_shares_a_layer() {
        let layers = compute_layers(
            &ids(&["root", "left", "right", "join"]),
            &[
                edge("root", "left"),
                edge("root", "right"),
                edge("left", "join"),
                edge("right", "join"),
            ],
        );
        assert_eq!(
            layers,
            vec![ids(&["root"]), ids(&["left", "right"]), ids(&["join"])]
        );
    }

    #[test]
    fn test_cycle_lands_in_final_layer() {
        let layers = compute_layers(
            &ids(&["start", "a", "b"]),
            &[edge("start", "a"), edge("a", "b"), edge("b", "a")],
        );
        assert_eq!(layers, vec![ids(&["start"]), ids(&["a", "b"])]);
    }

    #[test]
    fn test_pure_cycle_terminates() {
        let layers = compute_layers(&ids(&["a", "b"]), &[edge("a", "b"), edge("b", "a")]);
        assert_eq!(layers, vec![ids(&["a", "b"])]);
    }

    fn draft_with_diagram() -> BoardDraft {
        let mut connector = BoardObject::new("c1", ObjectType::Connector);
        connector.start_id = Some("a".to_string());
        connector.end_id = Some("b".to_string());
        let mut tall = BoardObject::new("b", ObjectType::Rectangle);
        tall.height = 140.0;
        BoardDraft::from_snapshot([
            BoardObject::new("old", ObjectType::Rectangle),
            BoardObject::new("a", ObjectType::Rectangle),
            tall,
            connector,
        ])
    }

    #[test]
    fn test_layout_stacks_layers_around_anchor() {
        let draft = draft_with_diagram();
        let layout = layout_diagram(
            &draft,
            &ids(&["a", "b", "c1"]),
            &ids(&["c1"]),
            Point::new(500.0, 400.0),
        );

        assert_eq!(layout.layer_of("a"), Some(0));
        assert_eq!(layout.layer_of("b"), Some(1));
        assert_eq!(layout.layer_of("old"), None);

        // 100 + 80 + 140 = 320 total, centered on y = 400.
        let a = layout.position_of("a").unwrap();
        let b = layout.position_of("b").unwrap();
        assert!((a.y - 240.0).abs() < 1e-9);
        assert!((b.y - 420.0).abs() < 1e-9);
        assert!((a.x - 425.0).abs() < 1e-9);
        assert!((b.x - 425.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_connectors_means_no_layout() {
        let draft = draft_with_diagram();
        let layout = layout_diagram(&draft, &ids(&["a", "b"]), &[], Point::ORIGIN);
        assert!(layout.layers.is_empty());
        assert!(layout.positions.is_empty());
    }
}
