pub mod error;
pub mod model;
pub mod pod;
pub mod source;

pub use error::PodlogError;
pub use model::{ErrorBlock, Occurrence, RequestObservation, Severity, UniqueErrorGroup};
pub use pod::{PodCategory, PodDescriptor, PodListing, PodPhase};
pub use source::{LogSource, PodSource};
