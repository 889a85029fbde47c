//! Ingest Orchestrator (C4): drives C1→C2→C3 for one list (seed) or the
//! full roster (update), with bounded concurrency, throttling, and
//! per-batch checkpoint commits. Ported from `original_source/src/task.py`,
//! `seed.py`, and `updater.py`.

pub mod stops;

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::archive::{self, Checkpoint, Mail, MailingList};
use crate::config::Config;
use crate::indexer::{Indexer, IndexParams};
use crate::store::Store;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Archive(#[from] crate::error::ArchiveError),
    #[error(transparent)]
    Store(#[from] crate::error::StoreError),
}

/// One mail, indexed and possibly filtered. `None` means the mail was
/// skipped (changeset mail) and no row should be written.
fn prepare(mail: Mail, params: &IndexParams) -> Option<(Mail, Vec<crate::indexer::Term>)> {
    if stops::is_changeset(&mail) {
        log::info!(
            "skipping changeset mail, month={}, id={}, subject={:?}",
            mail.month, mail.id, mail.subject
        );
        return None;
    }

    let filtered_body = stops::strip_stop_lines(&mail.body);
    let terms = Indexer::new(params).index(&mail.author, &mail.email, &mail.subject, &filtered_body);
    let terms: Vec<_> = terms.into_iter().filter(|t| !stops::is_stop_term(t)).collect();
    Some((mail, terms))
}

/// Fetch one mail and run the skip/filter/index pipeline. The mail's
/// identity is always returned (even when skipped) so the caller can
/// advance the checkpoint past changeset mail, per scenario 5 in the spec.
async fn fetch_and_prepare(
    list: Arc<MailingList>,
    url: String,
    params: IndexParams,
) -> Result<(Mail, Option<Vec<crate::indexer::Term>>), OrchestratorError> {
    let mail = list.fetch_mail(&url).await?;
    match prepare(mail.clone(), &params) {
        Some((mail, terms)) => Ok((mail, Some(terms))),
        None => Ok((mail, None)),
    }
}

/// Run one list to exhaustion: load checkpoint, stream URLs in
/// `mail_workers`-sized batches, index+write each batch, commit a
/// checkpoint after every batch, then throttle-sleep.
///
/// Returns whether at least one record was written.
pub async fn run_list(cfg: &Config, store: &Store, http: reqwest::Client, list_name: &str) -> Result<bool, OrchestratorError> {
    let (month, id) = store.get_checkpoint(list_name).await?;
    log::info!("loaded checkpoint, list={list_name}, month={month:?}, id={id:?}");

    let checkpoint = Checkpoint { month, id };
    let list = Arc::new(MailingList::new(http, cfg.archive_base_url.clone(), list_name, checkpoint));
    let mut urls = archive::mail_urls(list.clone());

    let mut changed = false;
    loop {
        let batch = archive::next_batch(&mut urls, cfg.mail_workers).await;
        if batch.is_empty() {
            break;
        }

        // `buffered` (not `buffer_unordered`) preserves batch order while still
        // running up to `mail_workers` fetches concurrently — the checkpoint
        // below depends on the *last URL of the batch*, not completion order.
        let results: Vec<Result<(Mail, Option<Vec<crate::indexer::Term>>), OrchestratorError>> = stream::iter(batch)
            .map(|item| {
                let list = list.clone();
                let params = cfg.index_params.clone();
                async move {
                    let url = item?;
                    fetch_and_prepare(list, url, params).await
                }
            })
            .buffered(cfg.mail_workers)
            .collect()
            .await;

        let mut last_seen: Option<(String, String)> = None;
        for result in results {
            let (mail, terms) = result?;
            last_seen = Some((mail.month.clone(), mail.id.clone()));
            if let Some(terms) = terms {
                store.put_mail_and_terms(&mail, &terms).await?;
                changed = true;
            }
        }

        // The checkpoint advances past the last mail *seen* in the batch, not
        // just the last one written — changeset mail is skipped but the crawl
        // must not re-visit it on the next run (spec scenario 5).
        if let Some((month, id)) = last_seen {
            store.put_checkpoint(list_name, &month, &id).await?;
            log::info!("stored checkpoint, list={list_name}, month={month}, id={id}");
        }

        tokio::time::sleep(std::time::Duration::from_secs_f64(cfg.throttle_sleep_secs)).await;
    }

    Ok(changed)
}

/// Iterate the fixed roster sequentially, updating each to exhaustion,
/// then report whether any list produced at least one record.
pub async fn run_update_sweep(cfg: &Config, store: &Store, http: reqwest::Client) -> Result<bool, OrchestratorError> {
    let mut changed = false;
    for list_name in crate::config::MAILING_LISTS {
        let list_changed = run_list(cfg, store, http.clone(), list_name).await?;
        changed = changed || list_changed;
    }
    Ok(changed)
}
