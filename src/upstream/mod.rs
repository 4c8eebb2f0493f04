// everything that talks to the upstream service: the pooled transport, the retry policy, the
// api types and the resolver/paginator
pub mod endpoints;
pub mod fixups;
pub mod model;
pub mod resolver;
pub mod retry;
pub mod transport;

pub use endpoints::Endpoints;
pub use transport::{
    DynUpstreamTransport, HttpTransport, Pool, StreamingResponse, UpstreamRequest,
    UpstreamResponse, UpstreamTransport,
};
