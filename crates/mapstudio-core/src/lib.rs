//! Mapstudio core: mapping records, the diagram derived from them, and the
//! gestures that write back.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        MAPPING GRAPH SYNC                            │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  suggestions ──► MappingStore (records, orphans, review gate)        │
//! │                      │   ▲                                           │
//! │            signature │   │ canonical mutations                       │
//! │                      ▼   │                                           │
//! │                  Projector ──► GraphProjection ──► rendering surface │
//! │                      ▲                                   │           │
//! │                      │                                   │ gestures  │
//! │                      └──── GraphEditController ◄─────────┘           │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`paths`]: canonical dotted paths and the XML / JSON notations.
//! - [`store`]: the ordered record list, the single source of truth.
//! - [`graph`]: nodes and edges derived from the store, plus positions.
//! - [`controller`]: diagram gestures turned into record mutations.
//! - [`review`]: the manual confirmation gate in front of export.
//! - [`session`]: one owner bundling all of the above.

pub mod controller;
pub mod graph;
pub mod paths;
pub mod record;
pub mod review;
pub mod session;
pub mod shape;
pub mod signature;
pub mod store;

pub use controller::{EditOutcome, GraphEditController, GraphGesture, Selection};
pub use graph::{
    GraphEdge, GraphNode, GraphProjection, LayoutConfig, NodeKey, NodeRole, OrphanSets, Position,
    PositionCache, Projector, SideNotations,
};
pub use paths::PathNotation;
pub use record::{
    ConfidenceBand, MappingOrigin, MappingRecord, MappingSuggestion, RecordId, RecordPatch,
    TransformType,
};
pub use review::{ensure_exportable, ExportBlocked, ReviewGate};
pub use session::MappingSession;
pub use shape::{ArtifactType, PathType, SourceType, TargetType};
pub use signature::StoreSignature;
pub use store::MappingStore;
