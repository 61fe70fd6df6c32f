//! Organize board
//!
//! Groups objects by type and lays each group out as a near-square grid
//! (`ceil(sqrt(n))` columns). Groups run left to right in type order and the
//! whole arrangement is centered on the viewport. Connectors are not placed;
//! they follow their endpoints.

use std::collections::BTreeMap;

use super::geometry::Point;
use super::object::{BoardObject, ObjectType};

/// Gap between cells of one grid
pub const CELL_GAP: f64 = 20.0;

/// Gap between neighbouring groups
pub const GROUP_GAP: f64 = 80.0;

struct Group<'a> {
    members: Vec<&'a BoardObject>,
    columns: usize,
    cell: (f64, f64),
}

impl Group<'_> {
    fn rows(&self) -> usize {
        self.members.len().div_ceil(self.columns)
    }

    fn width(&self) -> f64 {
        span(self.columns, self.cell.0)
    }

    fn height(&self) -> f64 {
        span(self.rows(), self.cell.1)
    }
}

fn span(count: usize, cell: f64) -> f64 {
    count as f64 * cell + count.saturating_sub(1) as f64 * CELL_GAP
}

/// Compute new top-left positions for every non-connector object
///
/// Returned in placement order: group by group, row-major within a group.
#[must_use]
pub fn arrange_by_type<'a>(
    objects: impl IntoIterator<Item = &'a BoardObject>,
    center: Point,
) -> Vec<(String, Point)> {
    let mut by_type: BTreeMap<ObjectType, Vec<&BoardObject>> = BTreeMap::new();
    for object in objects.into_iter().filter(|o| !o.is_connector()) {
        by_type.entry(object.object_type).or_default().push(object);
    }

    let groups: Vec<Group<'_>> = by_type
        .into_values()
        .map(|members| {
            let columns = (members.len() as f64).sqrt().ceil().max(1.0) as usize;
            let cell = members.iter().fold((0.0_f64, 0.0_f64), |(w, h), o| {
                (w.max(o.width), h.max(o.height))
            });
            Group {
                members,
                columns,
                cell,
            }
        })
        .collect();
    if groups.is_empty() {
        return Vec::new();
    }

    let total_width: f64 = groups.iter().map(Group::width).sum::<f64>()
        + GROUP_GAP * groups.len().saturating_sub(1) as f64;
    let tallest = groups.iter().map(Group::height).fold(0.0, f64::max);

    let top = center.y - tallest / 2.0;
    let mut left = center.x - total_width / 2.0;
    let mut placed = Vec::new();
    for group in &groups {
        for (i, object) in group.members.iter().enumerate() {
            let column = i % group.columns;
            let row = i / group.columns;
            placed.push((
                object.id.clone(),
                Point::new(
                    left + column as f64 * (group.cell.0 + CELL_GAP),
                    top + row as f64 * (group.cell.1 + CELL_GAP),
                ),
            ));
        }
        left += group.width() + GROUP_GAP;
    }
    placed
}
