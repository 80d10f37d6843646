//! External tools used by the capability providers
//!
//! - [`search`](crate::tools::search) - Web/news search and page fetching via daedra

pub mod search;

pub use search::{DaedraSearch, PageContent, SearchBackend, SearchHit};
