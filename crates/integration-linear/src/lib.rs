mod cache;
mod client;
mod config;
mod graphql;

pub use cache::TtlCache;
pub use client::LinearDirectoryClient;
pub use config::{
    LinearConfig, DEFAULT_DETAIL_CACHE_TTL_SECS, DEFAULT_LINEAR_API_URL,
    DEFAULT_LINEAR_TIMEOUT_SECS, DEFAULT_LISTING_CACHE_TTL_SECS,
};
pub use graphql::{GraphqlRequest, GraphqlTransport, ReqwestGraphqlTransport};
