//! Conversation extraction from the messaging history search API.

pub(crate) mod extract;
pub(crate) mod record;
pub(crate) mod search;

pub use extract::{Extraction, extract};
pub use record::ProcessedRow;
pub use search::{HistoryClient, SearchQuery};
