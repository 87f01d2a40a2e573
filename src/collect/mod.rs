//! Remote catalog collection.
//!
//! One pipeline serves every content kind. A remote page is decoded into raw
//! records, each record is bound to a local category, normalized, matched
//! against the store by its dedup key, and then inserted, merged into the
//! existing row or skipped. Runs advance page by page under a persisted
//! continuation state that an operator can cancel.

pub mod continuation;
pub mod decode;
pub mod dedup;
pub mod episodes;
pub mod error;
pub mod image;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod pseudo;
pub mod record;
pub mod schema;
pub mod source;
pub mod store;
pub mod taxonomy;

pub use continuation::{ContinuationState, RunPhase};
pub use dedup::{BlendPolicy, DedupKey};
pub use error::{CollectError, CollectResult, SkipReason};
pub use image::{ImageSynchronizer, SyncedImage};
pub use merge::MergeDecision;
pub use pipeline::{CollectContext, RunOutcome, RunRequest, RunSummary};
pub use pseudo::PseudoRewriter;
pub use record::{CanonicalRecord, FieldPatch, FieldValue, PlayGroup, RemoteRecord, StoredRecord};
pub use source::{CollectionSource, KindRules};
pub use store::{CategoryDirectory, InsertOutcome, RecordStore, RunStateStore};
