//! Batch-write chunking and retry, ported from `database.py`'s
//! `prepare_chunks_to_send` / `_batch_write`.
//!
//! The original flattens `(table, request)` pairs *across all tables*
//! before chunking to 25 — chunking per-table first would produce
//! different batch boundaries and isn't what the reference does.

use std::collections::HashMap;
use std::time::Duration;

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{AttributeValue, PutRequest, WriteRequest};
use futures::stream::{self, StreamExt};

use crate::error::StoreError;

const CHUNK_SIZE: usize = 25;
const MAX_RETRIES: u32 = 10;
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

type TableItems = HashMap<String, Vec<HashMap<String, AttributeValue>>>;

/// Flatten `(table, item)` pairs across tables, then chunk to `CHUNK_SIZE`,
/// regrouping each chunk back into per-table item lists.
pub fn prepare_chunks(request_items: TableItems) -> Vec<TableItems> {
    let flattened: Vec<(String, HashMap<String, AttributeValue>)> = request_items
        .into_iter()
        .flat_map(|(table, items)| items.into_iter().map(move |item| (table.clone(), item)))
        .collect();

    flattened
        .chunks(CHUNK_SIZE)
        .map(|chunk| {
            let mut grouped: TableItems = HashMap::new();
            for (table, item) in chunk {
                grouped.entry(table.clone()).or_default().push(item.clone());
            }
            grouped
        })
        .collect()
}

fn to_write_requests(items: Vec<HashMap<String, AttributeValue>>) -> Vec<WriteRequest> {
    items
        .into_iter()
        .map(|item| {
            WriteRequest::builder()
                .put_request(PutRequest::builder().set_item(Some(item)).build().expect("item is set"))
                .build()
        })
        .collect()
}

fn from_write_requests(reqs: Vec<WriteRequest>) -> Vec<HashMap<String, AttributeValue>> {
    reqs.into_iter()
        .filter_map(|r| r.put_request.map(|p| p.item))
        .collect()
}

/// Submit one 25-item (at most) chunk, resubmitting only the
/// `UnprocessedItems` the store hands back, with exponential backoff.
async fn write_chunk(client: &Client, chunk: TableItems) -> Result<(), StoreError> {
    let mut to_send: HashMap<String, Vec<WriteRequest>> = chunk
        .into_iter()
        .map(|(table, items)| (table, to_write_requests(items)))
        .collect();

    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0u32;

    loop {
        let resp = client
            .batch_write_item()
            .set_request_items(Some(to_send.clone()))
            .send()
            .await
            .map_err(|e| StoreError::Db(Box::new(e)))?;

        let unprocessed = resp.unprocessed_items.unwrap_or_default();
        if unprocessed.values().all(|v| v.is_empty()) {
            return Ok(());
        }

        attempt += 1;
        if attempt > MAX_RETRIES {
            let unprocessed_items: HashMap<String, Vec<HashMap<String, AttributeValue>>> =
                unprocessed
                    .into_iter()
                    .map(|(table, reqs)| (table, from_write_requests(reqs)))
                    .collect();
            return Err(StoreError::RetryExhausted {
                unprocessed: unprocessed_items,
            });
        }

        log::warn!(
            "batch_write_item attempt {attempt} left unprocessed items, retrying in {:?}",
            backoff
        );
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
        to_send = unprocessed;
    }
}

/// Submit every chunk, up to `db_workers` in flight at once. Returns the
/// first error encountered, if any.
pub async fn write_all(
    client: &Client,
    request_items: TableItems,
    db_workers: usize,
) -> Result<(), StoreError> {
    let chunks = prepare_chunks(request_items);
    let workers = db_workers.max(1);
    let results: Vec<Result<(), StoreError>> = stream::iter(chunks)
        .map(|chunk| write_chunk(client, chunk))
        .buffer_unordered(workers)
        .collect()
        .await;
    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(n: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([("id".to_string(), AttributeValue::S(n.to_string()))])
    }

    fn count(items: &TableItems) -> usize {
        items.values().map(|v| v.len()).sum()
    }

    #[test]
    fn chunks_flatten_across_tables_before_splitting() {
        let mut request_items: TableItems = HashMap::new();
        request_items.insert("records".to_string(), vec![item("r1")]);
        request_items.insert(
            "terms".to_string(),
            (0..30).map(|i| item(&format!("t{i}"))).collect(),
        );

        let chunks = prepare_chunks(request_items);
        assert_eq!(chunks.len(), 2);
        let total: usize = chunks.iter().map(count).sum();
        assert_eq!(total, 31);
        // flatten-then-chunk means the first chunk is always full regardless
        // of which table's items happened to iterate first.
        assert_eq!(count(&chunks[0]), 25);
        assert_eq!(count(&chunks[1]), 6);
    }
}
