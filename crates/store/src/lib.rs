//! MongoDB-backed stream store, command orchestrator, and projection
//! queries — the only crate in the workspace that touches IO.

pub mod command;
pub mod config;
pub mod queries;
pub mod stream_store;

pub use command::{handle_command, EvolveFn, HandlerOutcome, InitialStateFn, StreamDeclaration};
pub use config::VorfallConfig;
pub use queries::{
    count_projections, find_multiple_projections, find_one_projection, FindOneProjectionOptions,
    Pagination, ProjectionQueryOptions,
};
pub use stream_store::{
    map_mongo_error, AppendResult, AppendedStream, ReadStreamResult, StreamDocument, StreamMetadata,
    StreamStore,
};
