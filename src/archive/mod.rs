//! Archive Source (C1): enumerates a mailing list's month and message URLs
//! from the checkpoint forward, and parses one message's HTML page into a
//! [`Mail`]. Ported from `original_source/src/mail.py`.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use regex::Regex;
use scraper::{Html, Selector};
use tokio::sync::mpsc;

use crate::error::ArchiveError;

/// A `(month, id)` pair marking the last successfully indexed message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub month: String,
    pub id: String,
}

/// A single archived message, as produced by C1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub list: String,
    pub month: String,
    pub id: String,
    pub subject: String,
    pub author: String,
    pub email: String,
    /// ISO-8601 UTC, `YYYY-MM-DDTHH:MM:SSZ`.
    pub date: String,
    pub body: String,
}

pub struct MailingList {
    client: reqwest::Client,
    base_url: String,
    name: String,
    checkpoint: Checkpoint,
}

impl MailingList {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, name: impl Into<String>, checkpoint: Checkpoint) -> Self {
        Self { client, base_url: base_url.into(), name: name.into(), checkpoint }
    }

    pub fn url(&self) -> String {
        format!("{}/{}", self.base_url, self.name)
    }

    async fn fetch_html(&self, url: &str) -> Result<Html, ArchiveError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ArchiveError::Fetch { url: url.to_string(), source })?;
        let resp = resp
            .error_for_status()
            .map_err(|source| ArchiveError::Fetch { url: url.to_string(), source })?;
        let text = resp
            .text()
            .await
            .map_err(|source| ArchiveError::Fetch { url: url.to_string(), source })?;
        Ok(Html::parse_document(&text))
    }

    /// Every hyperlink whose visible text is `[ Date ]`, resolved to a
    /// per-month `date.html` URL.
    async fn fetch_month_urls(&self) -> Result<Vec<String>, ArchiveError> {
        let page = self.fetch_html(&format!("{}/", self.url())).await?;
        let a = Selector::parse("a").expect("static selector");
        Ok(page
            .select(&a)
            .filter(|el| el.text().collect::<String>().trim() == "[ Date ]")
            .filter_map(|el| el.value().attr("href"))
            .map(|href| format!("{}/{href}", self.url()))
            .collect())
    }

    /// Every hyperlink whose `href` matches `[0-9]+\.html` on a month page,
    /// resolved relative to the month URL's directory.
    async fn fetch_mail_urls(&self, month_url: &str) -> Result<Vec<String>, ArchiveError> {
        let page = self.fetch_html(month_url).await?;
        let a = Selector::parse("a").expect("static selector");
        let link_re = Regex::new(r"^[0-9]+\.html$").expect("static regex");
        let dir = month_url.rsplit_once('/').map(|(d, _)| d).unwrap_or(month_url);
        Ok(page
            .select(&a)
            .filter_map(|el| el.value().attr("href"))
            .filter(|href| link_re.is_match(href))
            .map(|href| format!("{dir}/{href}"))
            .collect())
    }

    /// Fetch and parse one message page into a [`Mail`].
    pub async fn fetch_mail(&self, url: &str) -> Result<Mail, ArchiveError> {
        let (list, month, id) = split_mail_url(url).ok_or_else(|| ArchiveError::Parse {
            url: url.to_string(),
            reason: "URL does not match .../{list}/{month}/{id}.html".to_string(),
        })?;

        let page = self.fetch_html(url).await?;
        let text_of = |sel: &str| -> Option<String> {
            let selector = Selector::parse(sel).ok()?;
            page.select(&selector).next().map(|el| el.text().collect::<String>().trim().to_string())
        };

        let subject = text_of("h1").ok_or_else(|| missing(url, "h1"))?;
        let author_raw = text_of("b").ok_or_else(|| missing(url, "b"))?;
        let email_raw = text_of("a").ok_or_else(|| missing(url, "a"))?;
        let date_raw = text_of("i").ok_or_else(|| missing(url, "i"))?;
        let body = text_of("pre").unwrap_or_default();

        let email = email_raw.replace(" at ", "@");
        let date = parse_archive_date(&date_raw, url)?;

        let author = if crate::indexer::normalize(&author_raw).is_empty() {
            email.clone()
        } else {
            author_raw
        };

        Ok(Mail { list, month, id, subject, author, email, date, body })
    }
}

fn missing(url: &str, tag: &str) -> ArchiveError {
    ArchiveError::Parse { url: url.to_string(), reason: format!("missing <{tag}>") }
}

/// Derive `(list, month, id)` from a message URL's last three path
/// components, stripping `.html`.
fn split_mail_url(url: &str) -> Option<(String, String, String)> {
    let trimmed = url.strip_suffix(".html")?;
    let mut parts = trimmed.rsplitn(3, '/');
    let id = parts.next()?.to_string();
    let month = parts.next()?.to_string();
    let list = parts.next()?.rsplit('/').next()?.to_string();
    Some((list, month, id))
}

/// Parse `Day Mon DD HH:MM:SS TZ YYYY` (e.g. `Tue Feb 04 09:15:03 GMT 2025`)
/// into ISO-8601 UTC. A missing or malformed TZ token is a hard parse
/// error — never silently fall back to local time (see spec Open Questions).
fn parse_archive_date(raw: &str, url: &str) -> Result<String, ArchiveError> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    let [_weekday, month_abbr, day, time, tz, year] = fields[..] else {
        return Err(ArchiveError::Parse {
            url: url.to_string(),
            reason: format!("expected 6 whitespace-separated date fields, got {:?}", raw),
        });
    };
    if tz.is_empty() {
        return Err(ArchiveError::Parse { url: url.to_string(), reason: "missing TZ token in date".to_string() });
    }

    let month = month_number(month_abbr).ok_or_else(|| ArchiveError::Parse {
        url: url.to_string(),
        reason: format!("unrecognized month abbreviation {month_abbr:?}"),
    })?;
    let day: u32 = day.parse().map_err(|_| ArchiveError::Parse { url: url.to_string(), reason: format!("bad day {day:?}") })?;
    let year: i32 = year.parse().map_err(|_| ArchiveError::Parse { url: url.to_string(), reason: format!("bad year {year:?}") })?;

    let mut time_parts = time.split(':');
    let (h, m, s) = (
        time_parts.next().and_then(|v| v.parse::<u32>().ok()),
        time_parts.next().and_then(|v| v.parse::<u32>().ok()),
        time_parts.next().and_then(|v| v.parse::<u32>().ok()),
    );
    let (h, m, s) = match (h, m, s) {
        (Some(h), Some(m), Some(s)) => (h, m, s),
        _ => return Err(ArchiveError::Parse { url: url.to_string(), reason: format!("bad time {time:?}") }),
    };

    let date = chrono::NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ArchiveError::Parse { url: url.to_string(), reason: "invalid calendar date".to_string() })?;
    let datetime = date
        .and_hms_opt(h, m, s)
        .ok_or_else(|| ArchiveError::Parse { url: url.to_string(), reason: "invalid time of day".to_string() })?;

    Ok(format!("{}Z", datetime.format("%Y-%m-%dT%H:%M:%S")))
}

fn month_number(abbr: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];
    MONTHS.iter().position(|m| m.eq_ignore_ascii_case(abbr)).map(|i| i as u32 + 1)
}

/// A pull-based stream of message URLs, strictly older→newer from the point
/// after the checkpoint, fed by a single producer task (§9 Design Notes).
pub struct MailUrls {
    rx: mpsc::Receiver<Result<String, ArchiveError>>,
}

impl Stream for MailUrls {
    type Item = Result<String, ArchiveError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Enumerate URLs lazily so the orchestrator can batch-consume without
/// materializing the whole archive upfront.
pub fn mail_urls(list: Arc<MailingList>) -> MailUrls {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        if let Err(err) = produce(&list, &tx).await {
            let _ = tx.send(Err(err)).await;
        }
    });
    MailUrls { rx }
}

async fn produce(list: &MailingList, tx: &mpsc::Sender<Result<String, ArchiveError>>) -> Result<(), ArchiveError> {
    let checkpoint_month_url = format!("{}/{}/date.html", list.url(), list.checkpoint.month);
    let checkpoint_id_url = format!("{}/{}/{}.html", list.url(), list.checkpoint.month, list.checkpoint.id);

    let mut month_urls = list.fetch_month_urls().await?;
    if let Some(i) = month_urls.iter().position(|u| u == &checkpoint_month_url) {
        month_urls.truncate(i + 1);
    }
    month_urls.reverse();

    for month_url in month_urls {
        let mut urls = list.fetch_mail_urls(&month_url).await?;
        if month_url == checkpoint_month_url {
            if let Some(i) = urls.iter().position(|u| u == &checkpoint_id_url) {
                urls = urls.split_off(i + 1);
            }
        }
        for url in urls {
            if tx.send(Ok(url)).await.is_err() {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Drain up to `n` items from a [`MailUrls`] stream into a batch.
pub async fn next_batch(urls: &mut MailUrls, n: usize) -> Vec<Result<String, ArchiveError>> {
    use futures::StreamExt;
    let mut batch = VecDeque::with_capacity(n);
    for _ in 0..n {
        match urls.next().await {
            Some(item) => batch.push_back(item),
            None => break,
        }
    }
    batch.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_mail_url_extracts_list_month_id() {
        let (list, month, id) =
            split_mail_url("https://mail.openjdk.org/pipermail/loom-dev/2025-February/025752.html").unwrap();
        assert_eq!(list, "loom-dev");
        assert_eq!(month, "2025-February");
        assert_eq!(id, "025752");
    }

    #[test]
    fn split_mail_url_rejects_non_html() {
        assert!(split_mail_url("https://example.com/list/month/id").is_none());
    }

    #[test]
    fn parse_archive_date_converts_to_iso8601_z() {
        let iso = parse_archive_date("Tue Feb 04 09:15:03 GMT 2025", "u").unwrap();
        assert_eq!(iso, "2025-02-04T09:15:03Z");
    }

    #[test]
    fn parse_archive_date_missing_tz_is_hard_error() {
        assert!(parse_archive_date("Tue Feb 04 09:15:03 2025", "u").is_err());
    }

    #[test]
    fn month_number_is_case_insensitive_and_bounded() {
        assert_eq!(month_number("Feb"), Some(2));
        assert_eq!(month_number("feb"), Some(2));
        assert_eq!(month_number("Xyz"), None);
    }
}
