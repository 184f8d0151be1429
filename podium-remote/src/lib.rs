//! PODIUM Remote - RobotEvents API client
//!
//! Every call goes through [`RemoteClient::request`], which owns the retry
//! and backoff policy and turns every failure into a [`RemoteError`] value.
//! Endpoint helpers decode into the schema structs in [`types`]; a payload
//! that does not match is reported as `RemoteError::Decode`.

pub mod backoff;
pub mod client;
pub mod transport;
pub mod types;

pub use backoff::Backoff;
pub use client::{validate_path, RemoteClient};
pub use transport::{
    HttpResponse, HttpTransport, MockReply, MockTransport, RecordedCall, ReqwestTransport,
    TransportError,
};
pub use types::{
    Award, EventSummary, IdRef, PageMeta, Paged, SkillsEntry, SkillsScores, SkillsTeam,
    TeamWinner,
};

pub use podium_core::RemoteError;

/// Result type alias for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;
