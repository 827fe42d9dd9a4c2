//! Shared domain types for the Tempest client.
//!
//! Everything here is transport-agnostic: job identifiers and status,
//! the progress event shape sent by the generation service, submission
//! and artifact models, and the [`ArtifactSource`] seam through which
//! the session layer reaches the collaborator store.

pub mod artifact;
pub mod progress;
pub mod request;
pub mod source;
pub mod status;
pub mod types;

pub use artifact::{Artifact, ArtifactFilter, ArtifactPatch, ArtifactSummary, Page};
pub use progress::ProgressEvent;
pub use request::{GenerationRequest, OutputFormat, TargetAudience, TechnicalDepth};
pub use source::{ArtifactSource, FetchOutcome, JobSnapshot, SourceError};
pub use status::JobStatus;
pub use types::{JobId, Timestamp};
