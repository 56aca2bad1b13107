//! Session coordination: dispatch, aggregation, and lifecycle.

pub mod aggregate;
pub mod coordinator;
pub mod dispatch;
pub mod observer;

pub use aggregate::{
    Artifact, ArtifactKind, ArtifactPayload, InputItemRecord, ItemAggregator, ItemRecord,
    ResponseRecord, ResponseState,
};
pub use coordinator::{SessionCoordinator, SessionHandle, SessionResult, SessionState};
pub use dispatch::{DispatchOutcome, EventDispatcher, Flow};
pub use observer::{NullObserver, SessionObserver};
