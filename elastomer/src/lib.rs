//! Elastomer - typed, observable in-process key-value archive
//!
//! Components stage values into named slots without knowing who reads
//! them, and observers react to mutations without knowing who wrote them.
//! The store is untyped internally, but every slot keeps its payload type,
//! and every access to the store is totally ordered.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  callers (any thread)                                         │
//! │   stage / post / observe / retire / express / express_values  │
//! └──────────────────────────────┬────────────────────────────────┘
//!                                │ units of work (unbounded FIFO)
//!                                ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  Sequencer thread                                             │
//! │  ┌──────────────────────┐   ┌──────────────────────────────┐  │
//! │  │ values               │   │ observers                    │  │
//! │  │ SlotId -> Value      │   │ SlotId -> Receipt -> Reg.    │  │
//! │  └──────────────────────┘   └──────────────────────────────┘  │
//! └──────────────────────────────┬────────────────────────────────┘
//!                                │ one MutationEvent per observer
//!                                ▼
//! ┌──────────────────┐  ┌──────────────────┐
//! │ DeliveryContext  │  │ DeliveryContext  │  ...
//! │ (observer A, B)  │  │ (observer C)     │
//! └──────────────────┘  └──────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! ## Slots
//!
//! A [`Slot<T>`] names one storage location holding values of type `T`.
//! Its identity is the name together with the payload type. The slot
//! captures `T`'s equality at construction, which the archive uses to
//! drop redundant writes.
//!
//! ## Sequencer
//!
//! One dedicated thread runs every read, write, registration and
//! retirement to completion, in submission order. Observer callbacks
//! never run there.
//!
//! ## Delivery contexts
//!
//! Callbacks and read results run on a [`DeliveryContext`] passed
//! explicitly by the caller. Each observer sees events in commit order.
//!
//! # Customization Points
//!
//! - `DeliveryContext`: where callbacks run (default: [`TaskContext`])
//! - `Scheduler`: how delayed writes and posts wait (default:
//!   [`TokioScheduler`])
//! - `SlotCapability`: per-type acceptance and equality
//!
//! # Example
//!
//! ```rust
//! use elastomer::{Archive, TaskContext};
//!
//! # #[tokio::main]
//! # async fn main() -> elastomer::Result<()> {
//! let archive = Archive::with_defaults()?;
//! let a = archive.define_slot::<i32>("a")?;
//! let b = archive.define_slot::<i32>("b")?;
//!
//! archive.stage(&a, 1);
//! archive.stage(&b, 2);
//!
//! let snapshot = archive.fetch_values([&a, &b]).await?;
//! assert_eq!(snapshot.get(&a).as_deref(), Some(&1));
//! assert_eq!(snapshot.get(&b).as_deref(), Some(&2));
//!
//! let ctx = TaskContext::spawn("ui");
//! archive.observe(&a, &ctx.context(), |event| {
//!     assert_eq!(event.new_value(), Some(&10));
//! });
//! archive.stage(&a, 10);
//! # archive.flush().await?;
//! # ctx.flush().await;
//! # Ok(())
//! # }
//! ```

// Modules
pub mod archive;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod slot;

// Re-exports for convenience
pub use archive::{Archive, ArchiveStats, Snapshot, StageOptions};
pub use config::{ArchiveConfig, ConfigError};
pub use delivery::{ContextRef, DeliveryContext, Job, Scheduler, TaskContext, TokioScheduler};
pub use elastomer_types::{CommitSeq, Receipt, SlotId, Timestamp};
pub use error::{ArchiveError, Result};
pub use event::{ErasedValue, MutationEvent, MutationKind};
pub use slot::{erase, Slot, SlotCapability, SlotKey, SlotRegistry, TypedCapability, Value};
