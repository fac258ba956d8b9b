//! Reaction-to-membership synchronization engine.
//!
//! Members toggle marks on a menu posting; the engine keeps their roles in
//! step with those marks. The platform is asynchronous, rate limited and
//! gives no ordering guarantees, so correctness rests on three properties:
//!
//! - one event per (actor, posting) at a time ([`EventDeduplicator`])
//! - idempotent, read-before-write mutations ([`MembershipMutator`], [`MarkMutator`])
//! - exclusive menus clear their other options under the same lock
//!   ([`ExclusivityEnforcer`])
//!
//! [`Synchronizer`] wires the pieces together.

mod dedup;
mod error;
mod exclusivity;
mod marks;
mod membership;
mod permission;
mod registry;
mod resolver;
mod sync;

pub use dedup::{EventDeduplicator, ProcessingGuard};
pub use error::{DenyReason, IgnoreReason, RegistryError, SyncError};
pub use exclusivity::{ExclusivityEnforcer, OptionCleanup};
pub use marks::{MarkChange, MarkMutator};
pub use membership::{MembershipChange, MembershipMutator};
pub use permission::PermissionGate;
pub use registry::{MenuRegistry, MenuSource, SourceFut};
pub use resolver::resolve;
pub use sync::{EventOutcome, ProcessReport, RunSummary, SyncSettings, Synchronizer};
