//! Board Model and Action Application
//!
//! Everything the client side needs to turn a decoded action stream into
//! board objects:
//!
//! - [`geometry`] / [`object`]: points, anchors and the object superset
//! - [`draft`]: the per-command mirror of the board
//! - [`ids`]: per-command id namespacing
//! - [`applier`]: action application and persistence ordering
//! - [`layout`]: layered diagram layout
//! - [`organize`]: grid arrangement for `organize_board`
//! - [`replay`]: decoder-to-applier driver
//! - [`store`]: the external store interface and an in-memory implementation

pub mod applier;
pub mod draft;
pub mod geometry;
pub mod ids;
pub mod layout;
pub mod object;
pub mod organize;
pub mod replay;
pub mod store;

pub use applier::{
    ActionApplier, ApplierOptions, ApplyOutcome, ApplyReport, DEFAULT_SETTLE_DELAY,
};
pub use draft::BoardDraft;
pub use geometry::{Anchor, Bounds, Point};
pub use ids::{new_nonce, IdScope};
pub use layout::{compute_layers, layout_diagram, DiagramLayout, HORIZONTAL_GAP, VERTICAL_GAP};
pub use object::{BoardObject, ObjectPatch, ObjectType, STICKY_MIN_SIZE};
pub use organize::arrange_by_type;
pub use replay::{ReplayOutcome, StreamReplayer};
pub use store::{BoardStore, InMemoryBoardStore, StoreError, StoreOp};
