//! Action Applier
//!
//! Turns decoded [`Action`]s into positioned board objects and store calls.
//!
//! # Coordinates
//!
//! Every `x`/`y` in an action is an offset from the viewport center captured
//! when the command was issued. Missing offsets mean "at the center".
//!
//! # Persistence ordering
//!
//! Node creates are awaited one by one as actions arrive. Connectors (and
//! their labels) are only recorded in the draft; [`ActionApplier::finish`]
//! runs the diagram layout, waits the settle delay and then flushes them, so
//! a store enforcing connector -> node references never sees a dangling id.
//!
//! ```text
//! apply(create_*)      ──► store.create_object (awaited)
//! apply(create_connector) ─► draft + pending
//! finish() ──► layout ─► update moved nodes ─► settle ─► labels ─► connectors
//! ```
//!
//! References to ids that do not exist (the board may have changed since the
//! snapshot) are silent no-ops.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::actions::{
    Action, BulkUpdateArgs, CircleArgs, ConnectorArgs, LineArgs, MoveArgs, ObjectFilter,
    RectangleArgs, StickyNoteArgs, TextArgs, UpdateArgs,
};

use super::draft::BoardDraft;
use super::geometry::{Anchor, Point};
use super::ids::IdScope;
use super::layout::{layout_diagram, DiagramLayout};
use super::object::{BoardObject, ObjectPatch, ObjectType};
use super::organize::arrange_by_type;
use super::store::{BoardStore, StoreError};

/// Default wait between the last node write and the connector flush
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(150);

/// Length of a line created without an end point
const DEFAULT_LINE_LENGTH: f64 = 100.0;

/// Font size of connector labels
const LABEL_FONT_SIZE: f64 = 14.0;

/// Per-command applier settings
#[derive(Clone, Debug)]
pub struct ApplierOptions {
    /// Viewport center when the command was issued
    pub viewport_center: Point,
    /// Wait before flushing deferred connectors
    pub settle_delay: Duration,
    /// Recorded as `created_by` on new objects
    pub requester: Option<String>,
}

impl Default for ApplierOptions {
    fn default() -> Self {
        Self {
            viewport_center: Point::ORIGIN,
            settle_delay: DEFAULT_SETTLE_DELAY,
            requester: None,
        }
    }
}

/// Counters collected while applying one command
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ApplyReport {
    /// Actions that changed the draft
    pub applied: usize,
    /// Actions that were no-ops, with the reason
    pub skipped: Vec<String>,
    /// Store calls that failed
    pub store_errors: Vec<StoreError>,
}

/// Final state after [`ActionApplier::finish`]
#[derive(Clone, Debug)]
pub struct ApplyOutcome {
    /// Draft contents in insertion order
    pub objects: Vec<BoardObject>,
    /// Diagram layout, empty when no connector was created
    pub layout: DiagramLayout,
    /// Counters
    pub report: ApplyReport,
}

impl ApplyOutcome {
    /// Look up a final object
    #[must_use]
    pub fn object(&self, id: &str) -> Option<&BoardObject> {
        self.objects.iter().find(|o| o.id == id)
    }
}

/// Applies the actions of exactly one command
pub struct ActionApplier {
    store: Arc<dyn BoardStore>,
    draft: BoardDraft,
    ids: IdScope,
    options: ApplierOptions,
    /// Ids created by this command, in creation order
    created: Vec<String>,
    /// Connectors and labels recorded but not yet sent to the store
    pending: Vec<String>,
    report: ApplyReport,
}

impl ActionApplier {
    /// Create an applier seeded from the client's snapshot
    pub fn new(
        store: Arc<dyn BoardStore>,
        snapshot: impl IntoIterator<Item = BoardObject>,
        options: ApplierOptions,
    ) -> Self {
        Self::with_scope(store, snapshot, options, IdScope::fresh())
    }

    /// Create an applier with an explicit id scope
    pub fn with_scope(
        store: Arc<dyn BoardStore>,
        snapshot: impl IntoIterator<Item = BoardObject>,
        options: ApplierOptions,
        ids: IdScope,
    ) -> Self {
        Self {
            store,
            draft: BoardDraft::from_snapshot(snapshot),
            ids,
            options,
            created: Vec::new(),
            pending: Vec::new(),
            report: ApplyReport::default(),
        }
    }

    /// Current draft
    #[must_use]
    pub fn draft(&self) -> &BoardDraft {
        &self.draft
    }

    /// Id scope of this command
    #[must_use]
    pub fn id_scope(&self) -> &IdScope {
        &self.ids
    }

    /// Ids of connectors and labels still waiting for the flush
    #[must_use]
    pub fn pending(&self) -> &[String] {
        &self.pending
    }

    /// Apply one action
    pub async fn apply(&mut self, action: &Action) {
        tracing::debug!(tool = %action.tool(), "Applying action");
        let changed = match action {
            Action::CreateStickyNote(args) => self.create_sticky(args).await,
            Action::CreateRectangle(args) => self.create_rectangle(args).await,
            Action::CreateCircle(args) => self.create_circle(args).await,
            Action::CreateLine(args) => self.create_line(args).await,
            Action::CreateText(args) => self.create_text(args).await,
            Action::CreateConnector(args) => self.create_connector(args),
            Action::MoveObject(args) => self.move_object(args).await,
            Action::UpdateObject(args) => self.update_object(args).await,
            Action::BulkUpdateObjects(args) => self.bulk_update(args).await,
            Action::DeleteObject(args) => {
                let id = self.ids.resolve(&args.id).to_string();
                self.delete_cascading(&id).await
            }
            Action::ClearBoard(_) => self.clear_board().await,
            Action::OrganizeBoard(_) => self.organize().await,
            Action::AnalyzeBoard(_) => true,
        };
        if changed {
            self.report.applied += 1;
        } else {
            tracing::debug!(tool = %action.tool(), "Action was a no-op");
            self.report.skipped.push(action.tool().to_string());
        }
    }

    /// Apply a sequence of actions in order
    pub async fn apply_all<'a>(&mut self, actions: impl IntoIterator<Item = &'a Action>) {
        for action in actions {
            self.apply(action).await;
        }
    }

    /// Run the layout pass, flush deferred connectors and return the result
    pub async fn finish(mut self) -> ApplyOutcome {
        let new_connectors: Vec<String> = self
            .created
            .iter()
            .filter(|id| self.draft.get(id).is_some_and(BoardObject::is_connector))
            .cloned()
            .collect();

        let layout = if new_connectors.is_empty() {
            DiagramLayout::default()
        } else {
            layout_diagram(
                &self.draft,
                &self.created,
                &new_connectors,
                self.options.viewport_center,
            )
        };
        for (id, position) in &layout.positions {
            if let Some(object) = self.draft.get_mut(id) {
                object.move_to(*position);
            }
            self.persist_update(id).await;
            self.reroute_attached(id).await;
        }

        if !self.pending.is_empty() {
            if !self.options.settle_delay.is_zero() {
                tokio::time::sleep(self.options.settle_delay).await;
            }
            self.flush_pending().await;
        }

        tracing::debug!(
            applied = self.report.applied,
            skipped = self.report.skipped.len(),
            layers = layout.layers.len(),
            "Command applied"
        );
        ApplyOutcome {
            objects: self.draft.into_objects(),
            layout,
            report: self.report,
        }
    }

    // ---------------------------------------------------------------------
    // Creation
    // ---------------------------------------------------------------------

    fn at_offset(&self, x: Option<f64>, y: Option<f64>) -> Point {
        self.options
            .viewport_center
            .offset(x.unwrap_or(0.0), y.unwrap_or(0.0))
    }

    fn new_object(&mut self, raw_id: Option<&str>, object_type: ObjectType) -> BoardObject {
        let id = self.ids.assign(raw_id, object_type);
        let mut object = BoardObject::new(id, object_type);
        object.created_by = self.options.requester.clone();
        object
    }

    async fn create_sticky(&mut self, args: &StickyNoteArgs) -> bool {
        let mut object = self.new_object(args.id.as_deref(), ObjectType::Sticky);
        let position = self.at_offset(args.x, args.y);
        object.x = position.x;
        object.y = position.y;
        object.width = args.width.unwrap_or(object.width);
        object.height = args.height.unwrap_or(object.height);
        object.text = Some(args.text.clone());
        object.color = args.color.clone();
        self.create_node(object).await
    }

    async fn create_rectangle(&mut self, args: &RectangleArgs) -> bool {
        let mut object = self.new_object(args.id.as_deref(), ObjectType::Rectangle);
        let position = self.at_offset(args.x, args.y);
        object.x = position.x;
        object.y = position.y;
        object.width = args.width.unwrap_or(object.width);
        object.height = args.height.unwrap_or(object.height);
        object.color = args.color.clone();
        object.stroke_color = args.stroke_color.clone();
        object.text = args.text.clone();
        self.create_node(object).await
    }

    async fn create_circle(&mut self, args: &CircleArgs) -> bool {
        let mut object = self.new_object(args.id.as_deref(), ObjectType::Circle);
        let position = self.at_offset(args.x, args.y);
        object.x = position.x;
        object.y = position.y;
        if let Some(radius) = args.radius {
            object.width = radius * 2.0;
            object.height = radius * 2.0;
        }
        object.color = args.color.clone();
        object.text = args.text.clone();
        self.create_node(object).await
    }

    async fn create_line(&mut self, args: &LineArgs) -> bool {
        let mut object = self.new_object(args.id.as_deref(), ObjectType::Line);
        let start = self.at_offset(args.x1, args.y1);
        let end = self.at_offset(
            Some(args.x2.unwrap_or(args.x1.unwrap_or(0.0) + DEFAULT_LINE_LENGTH)),
            Some(args.y2.unwrap_or(args.y1.unwrap_or(0.0))),
        );
        object.set_endpoints(start, end);
        object.color = args.color.clone();
        object.stroke_width = args.stroke_width;
        self.create_node(object).await
    }

    async fn create_text(&mut self, args: &TextArgs) -> bool {
        let mut object = self.new_object(args.id.as_deref(), ObjectType::Text);
        let position = self.at_offset(args.x, args.y);
        object.x = position.x;
        object.y = position.y;
        object.text = Some(args.text.clone());
        object.font_size = args.font_size;
        object.color = args.color.clone();
        self.create_node(object).await
    }

    async fn create_node(&mut self, mut object: BoardObject) -> bool {
        object.clamp_size();
        let id = object.id.clone();
        if let Err(e) = self.store.create_object(&object).await {
            tracing::warn!(id = %id, error = %e, "Store rejected create");
            self.report.store_errors.push(e);
        }
        self.draft.insert(object);
        self.created.push(id);
        true
    }

    /// Resolve one connector end to an object id and a point
    fn resolve_end(
        &self,
        id: Option<&str>,
        x: Option<f64>,
        y: Option<f64>,
        anchor: Anchor,
    ) -> Option<(Option<String>, Point)> {
        match id {
            Some(raw) => {
                let id = self.ids.resolve(raw);
                let target = self.draft.get(id)?;
                Some((Some(id.to_string()), target.bounds().anchor_point(anchor)))
            }
            None => match (x, y) {
                (Some(x), Some(y)) => Some((None, self.at_offset(Some(x), Some(y)))),
                _ => None,
            },
        }
    }

    fn create_connector(&mut self, args: &ConnectorArgs) -> bool {
        let start_anchor = args.start_anchor.unwrap_or(Anchor::Bottom);
        let end_anchor = args.end_anchor.unwrap_or(Anchor::Top);
        let start = self.resolve_end(
            args.start_id.as_deref(),
            args.start_x,
            args.start_y,
            start_anchor,
        );
        let end = self.resolve_end(args.end_id.as_deref(), args.end_x, args.end_y, end_anchor);
        let (Some((start_id, start)), Some((end_id, end))) = (start, end) else {
            tracing::debug!(
                start = ?args.start_id,
                end = ?args.end_id,
                "Connector endpoint not on board, skipping"
            );
            return false;
        };

        let mut connector = self.new_object(args.id.as_deref(), ObjectType::Connector);
        connector.set_endpoints(start, end);
        connector.start_anchor = start_id.as_ref().map(|_| start_anchor);
        connector.end_anchor = end_id.as_ref().map(|_| end_anchor);
        connector.start_id = start_id;
        connector.end_id = end_id;
        connector.color = args.color.clone();
        let connector_id = connector.id.clone();

        self.draft.insert(connector);
        self.created.push(connector_id.clone());
        self.pending.push(connector_id.clone());

        if let Some(text) = args.label.as_deref().filter(|t| !t.trim().is_empty()) {
            let mut label = BoardObject::new(label_id(&connector_id), ObjectType::Text);
            label.text = Some(text.to_string());
            label.font_size = Some(LABEL_FONT_SIZE);
            label.created_by = self.options.requester.clone();
            center_on(&mut label, start.midpoint(end));
            self.pending.insert(self.pending.len() - 1, label.id.clone());
            self.draft.insert(label);
        }
        true
    }

    // ---------------------------------------------------------------------
    // Modification
    // ---------------------------------------------------------------------

    async fn move_object(&mut self, args: &MoveArgs) -> bool {
        let id = self.ids.resolve(&args.id).to_string();
        let target = self.at_offset(Some(args.x), Some(args.y));
        let Some(object) = self.draft.get_mut(&id) else {
            return false;
        };
        object.move_to(target);
        self.persist_update(&id).await;
        self.reroute_attached(&id).await;
        true
    }

    /// Convert viewport offsets in a patch to board coordinates
    fn absolute_patch(&self, patch: &ObjectPatch) -> ObjectPatch {
        let center = self.options.viewport_center;
        ObjectPatch {
            x: patch.x.map(|x| center.x + x),
            y: patch.y.map(|y| center.y + y),
            ..patch.clone()
        }
    }

    async fn patch_object(&mut self, id: &str, patch: &ObjectPatch) -> bool {
        let Some(object) = self.draft.get_mut(id) else {
            return false;
        };
        patch.apply_to(object);
        self.persist_update(id).await;
        if patch.changes_geometry() {
            self.reroute_attached(id).await;
        }
        true
    }

    async fn update_object(&mut self, args: &UpdateArgs) -> bool {
        let id = self.ids.resolve(&args.id).to_string();
        let patch = self.absolute_patch(&args.patch);
        self.patch_object(&id, &patch).await
    }

    fn matching(&self, filter: &ObjectFilter) -> Vec<String> {
        let ids: Option<HashSet<&str>> = filter
            .ids
            .as_ref()
            .map(|ids| ids.iter().map(|raw| self.ids.resolve(raw)).collect());
        self.draft
            .iter()
            .filter(|o| filter.object_type.map_or(true, |t| o.object_type == t))
            .filter(|o| {
                filter.color.as_deref().map_or(true, |wanted| {
                    o.color
                        .as_deref()
                        .is_some_and(|c| c.eq_ignore_ascii_case(wanted))
                })
            })
            .filter(|o| ids.as_ref().map_or(true, |ids| ids.contains(o.id.as_str())))
            .map(|o| o.id.clone())
            .collect()
    }

    async fn bulk_update(&mut self, args: &BulkUpdateArgs) -> bool {
        let targets = self.matching(&args.filter);
        let patch = self.absolute_patch(&args.updates);
        for id in &targets {
            self.patch_object(id, &patch).await;
        }
        !targets.is_empty()
    }

    async fn organize(&mut self) -> bool {
        let placement = arrange_by_type(self.draft.iter(), self.options.viewport_center);
        for (id, position) in &placement {
            if let Some(object) = self.draft.get_mut(id) {
                object.move_to(*position);
            }
            self.persist_update(id).await;
            self.reroute_attached(id).await;
        }
        !placement.is_empty()
    }

    /// Recompute endpoints of connectors anchored to `node_id`
    async fn reroute_attached(&mut self, node_id: &str) {
        for connector_id in self.draft.connectors_attached_to(node_id) {
            let Some(connector) = self.draft.get(&connector_id) else {
                continue;
            };
            let start = self.endpoint(
                connector.start_id.as_deref(),
                connector.start_anchor,
                connector.start,
            );
            let end = self.endpoint(
                connector.end_id.as_deref(),
                connector.end_anchor,
                connector.end,
            );
            let (Some(start), Some(end)) = (start, end) else {
                continue;
            };
            if let Some(connector) = self.draft.get_mut(&connector_id) {
                connector.set_endpoints(start, end);
            }
            self.persist_update(&connector_id).await;

            let label = label_id(&connector_id);
            if let Some(object) = self.draft.get_mut(&label) {
                center_on(object, start.midpoint(end));
                self.persist_update(&label).await;
            }
        }
    }

    fn endpoint(
        &self,
        id: Option<&str>,
        anchor: Option<Anchor>,
        fallback: Option<Point>,
    ) -> Option<Point> {
        match id.and_then(|id| self.draft.get(id)) {
            Some(node) => Some(node.bounds().anchor_point(anchor.unwrap_or_default())),
            None => fallback,
        }
    }

    // ---------------------------------------------------------------------
    // Deletion
    // ---------------------------------------------------------------------

    /// Delete an object and every connector (and label) attached to it
    async fn delete_cascading(&mut self, id: &str) -> bool {
        if !self.draft.contains(id) {
            return false;
        }
        for connector_id in self.draft.connectors_attached_to(id) {
            self.delete_one(&label_id(&connector_id)).await;
            self.delete_one(&connector_id).await;
        }
        if self.draft.get(id).is_some_and(BoardObject::is_connector) {
            self.delete_one(&label_id(id)).await;
        }
        self.delete_one(id).await;
        true
    }

    async fn delete_one(&mut self, id: &str) {
        if self.draft.remove(id).is_none() {
            return;
        }
        if let Some(index) = self.pending.iter().position(|p| p == id) {
            // Never reached the store.
            self.pending.remove(index);
            return;
        }
        if let Err(e) = self.store.delete_object(id).await {
            tracing::warn!(id = %id, error = %e, "Store rejected delete");
            self.report.store_errors.push(e);
        }
    }

    async fn clear_board(&mut self) -> bool {
        if self.draft.is_empty() {
            return false;
        }
        let (connectors, others): (Vec<_>, Vec<_>) = self
            .draft
            .iter()
            .map(|o| (o.id.clone(), o.is_connector()))
            .partition(|(_, is_connector)| *is_connector);
        for (id, _) in connectors.into_iter().chain(others) {
            self.delete_one(&id).await;
        }
        true
    }

    // ---------------------------------------------------------------------
    // Store
    // ---------------------------------------------------------------------

    async fn persist_update(&mut self, id: &str) {
        if self.pending.iter().any(|p| p == id) {
            return;
        }
        let Some(object) = self.draft.get(id) else {
            return;
        };
        if let Err(e) = self.store.update_object(object).await {
            tracing::warn!(id = %id, error = %e, "Store rejected update");
            self.report.store_errors.push(e);
        }
    }

    async fn flush_pending(&mut self) {
        for id in std::mem::take(&mut self.pending) {
            let Some(object) = self.draft.get(&id) else {
                continue;
            };
            if let Err(e) = self.store.create_object(object).await {
                tracing::warn!(id = %id, error = %e, "Store rejected deferred create");
                self.report.store_errors.push(e);
            }
        }
    }
}

fn label_id(connector_id: &str) -> String {
    format!("{connector_id}-label")
}

fn center_on(object: &mut BoardObject, point: Point) {
    object.x = point.x - object.width / 2.0;
    object.y = point.y - object.height / 2.0;
}
