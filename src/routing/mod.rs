//! Routing subsystem: the layer registry and the dispatch engine.
//!
//! # Data Flow
//! ```text
//! Registration (configuration phase, &mut Dispatcher):
//!     register / register_error / mount
//!     → matcher.rs (normalize mount path)
//!     → layer.rs (tag handler kind)
//!     → append to registry
//!
//! Dispatch (Arc<Dispatcher>):
//!     Request, Response
//!     → router.rs (open a frame at index 0)
//!     → frame.rs (scan, trim, invoke, restore)
//!     → path.rs (url rewriting per mount point)
//!     → terminal collaborator on exhaustion
//! ```
//!
//! # Design Decisions
//! - Registry frozen once shared; traversal is read-only
//! - Deterministic: same registry and path always visit the same layers
//! - First match in registration order wins

pub mod frame;
pub mod layer;
pub mod matcher;
pub mod path;
pub mod router;

pub use frame::Next;
pub use layer::{Layer, LayerKind};
pub use matcher::MountMatcher;
pub use router::{Dispatcher, DispatcherId};
