//! IO side of the harvester: transports, checkpoint and object stores,
//! discovery, item processing, delivery and the per-source orchestration.

mod checkpoint;
mod config;
mod decode;
mod discover;
mod dispatch;
mod fetch;
mod filename;
mod object_store;
mod orchestrator;
mod persist;
mod pool;
mod processor;
mod render;
mod source;
pub mod sources;
mod stager;
mod types;

pub use checkpoint::{CheckpointError, CheckpointStore, CheckpointUpdate};
pub use config::{HarvestSettings, RunMode};
pub use decode::{decode_output, decode_text, DecodedText};
pub use discover::{DiscoveredSet, DiscoverySettings, ItemDiscoverer};
pub use dispatch::{
    BatchDispatcher, BatchId, DeliveryMode, DispatchError, DispatchOp, DispatchSettings,
    DryRunDispatcher, HttpBatchDispatcher,
};
pub use fetch::{FetchSettings, HttpTransport, ReqwestTransport};
pub use filename::{absolute_url, asset_filename};
pub use object_store::{FsObjectStore, ObjectStore, StoreError};
pub use orchestrator::{utc_now, Clock, Harvester};
pub use persist::{AtomicFileWriter, PersistError};
pub use pool::{PoolOutcome, WorkerPool};
pub use processor::{ItemProcessor, ProcessError, ProcessorSettings, SnapProcessor};
pub use render::{HttpListingRenderer, ListingSettings, PageRenderer, RenderError};
pub use source::{MediaSlot, ParseError, SourceAdapter};
pub use stager::{MediaStager, StagerSettings};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, ItemPayload};
