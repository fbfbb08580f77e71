use serde_json::Value;

use super::record::{ProcessedRow, process_conversations};
use super::search::{ConversationSource, SearchQuery};

/// Everything gathered over one run.
#[derive(Debug, Default)]
pub struct Extraction {
    pub conversations: Vec<Value>,
    pub rows: Vec<ProcessedRow>,
    pub overdue: usize,
}

impl Extraction {
    pub fn total(&self) -> usize {
        self.conversations.len()
    }

    /// Share of fetched conversations that are not overdue.
    pub fn success_rate(&self) -> f64 {
        success_rate(self.total(), self.overdue)
    }

    fn absorb(&mut self, page: Vec<Value>) {
        let (rows, overdue) = process_conversations(&page);
        self.rows.extend(rows);
        self.overdue += overdue;
        self.conversations.extend(page);
    }
}

pub fn success_rate(total: usize, overdue: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (total - overdue) as f64 / total as f64
}

/// Walks the search results page by page until a page comes back empty.
pub async fn extract<S: ConversationSource>(
    source: &S,
    query: &SearchQuery,
    batch_size: usize,
) -> Extraction {
    let mut extraction = Extraction::default();
    let mut offset = 0;

    loop {
        let page = source.fetch(query, offset, batch_size).await;
        if page.is_empty() {
            break;
        }

        tracing::info!("Retrieved {} conversations - Offset: {offset}", page.len());
        extraction.absorb(page);

        offset += batch_size;
    }

    extraction
}
