//! GraphQL API client: query construction, response decoding, transport.

pub mod query;
pub mod transport;
pub mod types;

pub use query::PageQuery;
pub use transport::{GithubTransport, Transport};
pub use types::SyncPage;
