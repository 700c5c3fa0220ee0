pub mod server;

pub use server::{
    CreateServerRequest, Meta, Pricing, Repository, ServerList, ServerMetadata, ServerRecord,
    ServerSummary, UpdateServerRequest,
};
