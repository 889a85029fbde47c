//! Storage Writer (C3) and the read-side query functions used by C5.
//!
//! One `Store` wraps a single shared `aws_sdk_dynamodb::Client` (§9 "Shared
//! store client") used by both the write pool (seed/update) and the read
//! pool (the query handler).

pub mod av;
pub mod batch;

use std::collections::HashMap;

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::Serialize;

use crate::archive::Mail;
use crate::config::{Config, TableNames};
use crate::error::StoreError;
use crate::indexer::{Term, join_term, normalize};

pub struct Store {
    client: Client,
    tables: TableNames,
    db_workers: usize,
}

/// A Record row trimmed to the fields the read API returns (§4.5 Response).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordItem {
    pub list: String,
    pub month: String,
    pub id: String,
    pub date: String,
    pub author: String,
    pub email: String,
    pub subject: String,
}

/// Common query parameters shared by every C5 access pattern (§4.5).
#[derive(Debug, Clone)]
pub struct CommonParams {
    pub forward: bool,
    pub limit: i32,
    pub start_key: Option<HashMap<String, AttributeValue>>,
    pub date_range: Option<(String, String)>,
}

/// One page of query results plus the next cursor, if any.
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

fn s(v: &str) -> AttributeValue {
    AttributeValue::S(v.to_string())
}

fn get_s(item: &HashMap<String, AttributeValue>, key: &str) -> Result<String, StoreError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            StoreError::RecordNotFoundInBatchGet {
                list: item
                    .get("list")
                    .and_then(|v| v.as_s().ok())
                    .unwrap_or("?")
                    .to_string(),
                month_id: key.to_string(),
            }
        })
}

pub fn record_from_item(item: &HashMap<String, AttributeValue>) -> Result<RecordItem, StoreError> {
    Ok(RecordItem {
        list: get_s(item, "list")?,
        month: get_s(item, "month")?,
        id: get_s(item, "id")?,
        date: get_s(item, "date")?,
        author: get_s(item, "author")?,
        email: get_s(item, "email")?,
        subject: get_s(item, "subject")?,
    })
}

impl Store {
    pub async fn connect(cfg: &Config) -> Self {
        let region = aws_sdk_dynamodb::config::Region::new(cfg.aws_region.clone());
        let shared_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(region)
            .load()
            .await;
        Self {
            client: Client::new(&shared_config),
            tables: cfg.tables.clone(),
            db_workers: cfg.db_workers,
        }
    }

    #[cfg(test)]
    pub fn from_client(client: Client, tables: TableNames, db_workers: usize) -> Self {
        Self { client, tables, db_workers }
    }

    // ---- C3: writer ----------------------------------------------------

    /// Write one Record row plus one Term row per term, per
    /// `database.py`'s `put_mail_record_and_terms`.
    pub async fn put_mail_and_terms(&self, mail: &Mail, terms: &[Term]) -> Result<(), StoreError> {
        let authorkey = normalize(&mail.author);
        let emailkey = normalize(&mail.email);
        let month_id = format!("{}/{}", mail.month, mail.id);
        let authorkey_date = format!("{authorkey}/{}", mail.date);
        let emailkey_date = format!("{emailkey}/{}", mail.date);

        let record_item: HashMap<String, AttributeValue> = HashMap::from([
            ("list".to_string(), s(&mail.list)),
            ("month_id".to_string(), s(&month_id)),
            ("date".to_string(), s(&mail.date)),
            ("month".to_string(), s(&mail.month)),
            ("id".to_string(), s(&mail.id)),
            ("author".to_string(), s(&mail.author)),
            ("authorkey".to_string(), s(&authorkey)),
            ("email".to_string(), s(&mail.email)),
            ("emailkey".to_string(), s(&emailkey)),
            ("authorkey_date".to_string(), s(&authorkey_date)),
            ("emailkey_date".to_string(), s(&emailkey_date)),
            ("subject".to_string(), s(&mail.subject)),
            ("terms".to_string(), AttributeValue::N(terms.len().to_string())),
            ("datekey".to_string(), AttributeValue::N("1".to_string())),
        ]);

        let term_items: Vec<HashMap<String, AttributeValue>> = terms
            .iter()
            .map(|term| {
                let joined = join_term(term);
                let list_term = format!("{}/{joined}", mail.list);
                let date_month_id = format!("{}/{month_id}", mail.date);
                HashMap::from([
                    ("p".to_string(), s(&list_term)),
                    ("s".to_string(), s(&date_month_id)),
                    ("d".to_string(), s(&mail.date)),
                    ("t".to_string(), s(&joined)),
                ])
            })
            .collect();

        let request_items = HashMap::from([
            (self.tables.records.clone(), vec![record_item]),
            (self.tables.terms.clone(), term_items),
        ]);

        batch::write_all(&self.client, request_items, self.db_workers).await
    }

    pub async fn put_checkpoint(&self, list: &str, month: &str, id: &str) -> Result<(), StoreError> {
        let item = HashMap::from([
            ("list".to_string(), s(list)),
            ("month".to_string(), s(month)),
            ("id".to_string(), s(id)),
        ]);
        self.client
            .put_item()
            .table_name(&self.tables.checkpoints)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| StoreError::Db(Box::new(e)))?;
        Ok(())
    }

    /// Returns `("", "")` when no checkpoint has been written yet.
    pub async fn get_checkpoint(&self, list: &str) -> Result<(String, String), StoreError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.tables.checkpoints)
            .key("list", s(list))
            .send()
            .await
            .map_err(|e| StoreError::Db(Box::new(e)))?;

        match resp.item {
            Some(item) => {
                let month = item.get("month").and_then(|v| v.as_s().ok()).unwrap_or("").to_string();
                let id = item.get("id").and_then(|v| v.as_s().ok()).unwrap_or("").to_string();
                Ok((month, id))
            }
            None => Ok((String::new(), String::new())),
        }
    }

    /// Conditional patch: always bumps `last_check`; `last_update` only if
    /// `changed`. Returns the timestamp written.
    pub async fn update_status(&self, changed: bool, now: &str) -> Result<(), StoreError> {
        let mut update_expr = "SET #last_check = :now".to_string();
        let mut names = HashMap::from([("#last_check".to_string(), "last_check".to_string())]);
        let values = HashMap::from([(":now".to_string(), s(now))]);

        if changed {
            update_expr.push_str(", #last_update = :now");
            names.insert("#last_update".to_string(), "last_update".to_string());
        }

        self.client
            .update_item()
            .table_name(&self.tables.status)
            .key("pk", AttributeValue::N("1".to_string()))
            .update_expression(update_expr)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .send()
            .await
            .map_err(|e| StoreError::Db(Box::new(e)))?;
        Ok(())
    }

    pub async fn get_status(&self) -> Result<(Option<String>, Option<String>), StoreError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.tables.status)
            .key("pk", AttributeValue::N("1".to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Db(Box::new(e)))?;

        let item = resp.item.unwrap_or_default();
        let last_check = item.get("last_check").and_then(|v| v.as_s().ok()).map(|s| s.to_string());
        let last_update = item.get("last_update").and_then(|v| v.as_s().ok()).map(|s| s.to_string());
        Ok((last_check, last_update))
    }

    // ---- C5: query access paths -----------------------------------------

    pub async fn search_mail(&self, list: &str, term: &str, cp: &CommonParams) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        let list_term = format!("{list}/{term}");
        let mut names = HashMap::from([("#p".to_string(), "p".to_string())]);
        let mut values = HashMap::from([(":p".to_string(), s(&list_term))]);
        let mut key_cond = "#p = :p".to_string();

        if let Some((from, to)) = &cp.date_range {
            names.insert("#s".to_string(), "s".to_string());
            values.insert(":from".to_string(), s(&format!("{from}/")));
            values.insert(":to".to_string(), s(&format!("{to}/\u{FFFF}")));
            key_cond.push_str(" AND #s BETWEEN :from AND :to");
        }

        let mut req = self
            .client
            .query()
            .table_name(&self.tables.terms)
            .key_condition_expression(key_cond)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .scan_index_forward(cp.forward)
            .limit(cp.limit);
        if let Some(start) = &cp.start_key {
            req = req.set_exclusive_start_key(Some(start.clone()));
        }
        let resp = req.send().await.map_err(|e| StoreError::Db(Box::new(e)))?;
        Ok(Page {
            items: resp.items.unwrap_or_default(),
            cursor: resp.last_evaluated_key.and_then(|k| av::encode_cursor(&k)),
        })
    }

    pub async fn search_mail_global(&self, term: &str, cp: &CommonParams) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        let mut names = HashMap::from([("#t".to_string(), "t".to_string())]);
        let mut values = HashMap::from([(":t".to_string(), s(term))]);
        let mut key_cond = "#t = :t".to_string();

        if let Some((from, to)) = &cp.date_range {
            names.insert("#d".to_string(), "d".to_string());
            values.insert(":from".to_string(), s(from));
            values.insert(":to".to_string(), s(&format!("{to}\u{FFFF}")));
            key_cond.push_str(" AND #d BETWEEN :from AND :to");
        }

        let mut req = self
            .client
            .query()
            .table_name(&self.tables.terms)
            .index_name("term_date")
            .key_condition_expression(key_cond)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .scan_index_forward(cp.forward)
            .limit(cp.limit);
        if let Some(start) = &cp.start_key {
            req = req.set_exclusive_start_key(Some(start.clone()));
        }
        let resp = req.send().await.map_err(|e| StoreError::Db(Box::new(e)))?;
        Ok(Page {
            items: resp.items.unwrap_or_default(),
            cursor: resp.last_evaluated_key.and_then(|k| av::encode_cursor(&k)),
        })
    }

    pub async fn latest_mail(&self, list: &str, cp: &CommonParams) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        let mut names = HashMap::from([("#list".to_string(), "list".to_string())]);
        let mut values = HashMap::from([(":list".to_string(), s(list))]);
        let mut key_cond = "#list = :list".to_string();
        extend_date_range(&cp.date_range, "date", &mut names, &mut values, &mut key_cond);

        let mut req = self
            .client
            .query()
            .table_name(&self.tables.records)
            .index_name("list_date")
            .key_condition_expression(key_cond)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .scan_index_forward(cp.forward)
            .limit(cp.limit);
        if let Some(start) = &cp.start_key {
            req = req.set_exclusive_start_key(Some(start.clone()));
        }
        let resp = req.send().await.map_err(|e| StoreError::Db(Box::new(e)))?;
        Ok(Page {
            items: resp.items.unwrap_or_default(),
            cursor: resp.last_evaluated_key.and_then(|k| av::encode_cursor(&k)),
        })
    }

    pub async fn latest_mail_global(&self, cp: &CommonParams) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        let mut names = HashMap::from([("#datekey".to_string(), "datekey".to_string())]);
        let mut values = HashMap::from([(":dk".to_string(), AttributeValue::N("1".to_string()))]);
        let mut key_cond = "#datekey = :dk".to_string();
        extend_date_range(&cp.date_range, "date", &mut names, &mut values, &mut key_cond);

        let mut req = self
            .client
            .query()
            .table_name(&self.tables.records)
            .index_name("datekey_date")
            .key_condition_expression(key_cond)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .scan_index_forward(cp.forward)
            .limit(cp.limit);
        if let Some(start) = &cp.start_key {
            req = req.set_exclusive_start_key(Some(start.clone()));
        }
        let resp = req.send().await.map_err(|e| StoreError::Db(Box::new(e)))?;
        Ok(Page {
            items: resp.items.unwrap_or_default(),
            cursor: resp.last_evaluated_key.and_then(|k| av::encode_cursor(&k)),
        })
    }

    pub async fn mail_by_author(&self, list: &str, authorkey: &str, cp: &CommonParams) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        self.by_scoped_key(&self.tables.records.clone(), "list_authorkey_date", "authorkey_date", list, authorkey, cp).await
    }

    pub async fn mail_by_email(&self, list: &str, emailkey: &str, cp: &CommonParams) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        self.by_scoped_key(&self.tables.records.clone(), "list_emailkey_date", "emailkey_date", list, emailkey, cp).await
    }

    async fn by_scoped_key(
        &self,
        table: &str,
        index: &str,
        sort_attr: &str,
        list: &str,
        key_value: &str,
        cp: &CommonParams,
    ) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        let mut names = HashMap::from([
            ("#list".to_string(), "list".to_string()),
            ("#kd".to_string(), sort_attr.to_string()),
        ]);
        let mut values = HashMap::from([(":list".to_string(), s(list))]);

        let key_cond = if let Some((from, to)) = &cp.date_range {
            values.insert(":from".to_string(), s(&format!("{key_value}/{from}")));
            values.insert(":to".to_string(), s(&format!("{key_value}/{to}\u{FFFF}")));
            "#list = :list AND #kd BETWEEN :from AND :to".to_string()
        } else {
            values.insert(":prefix".to_string(), s(&format!("{key_value}/")));
            "#list = :list AND begins_with(#kd, :prefix)".to_string()
        };

        let mut req = self
            .client
            .query()
            .table_name(table)
            .index_name(index)
            .key_condition_expression(key_cond)
            .set_expression_attribute_names(Some(names.drain().collect()))
            .set_expression_attribute_values(Some(values))
            .scan_index_forward(cp.forward)
            .limit(cp.limit);
        if let Some(start) = &cp.start_key {
            req = req.set_exclusive_start_key(Some(start.clone()));
        }
        let resp = req.send().await.map_err(|e| StoreError::Db(Box::new(e)))?;
        Ok(Page {
            items: resp.items.unwrap_or_default(),
            cursor: resp.last_evaluated_key.and_then(|k| av::encode_cursor(&k)),
        })
    }

    pub async fn mail_by_author_global(&self, authorkey: &str, cp: &CommonParams) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        self.by_global_key("authorkey_date", "authorkey", authorkey, cp).await
    }

    pub async fn mail_by_email_global(&self, emailkey: &str, cp: &CommonParams) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        self.by_global_key("emailkey_date", "emailkey", emailkey, cp).await
    }

    async fn by_global_key(
        &self,
        index: &str,
        partition_attr: &str,
        key_value: &str,
        cp: &CommonParams,
    ) -> Result<Page<HashMap<String, AttributeValue>>, StoreError> {
        let mut names = HashMap::from([("#k".to_string(), partition_attr.to_string())]);
        let mut values = HashMap::from([(":k".to_string(), s(key_value))]);
        let mut key_cond = "#k = :k".to_string();
        extend_date_range(&cp.date_range, "date", &mut names, &mut values, &mut key_cond);

        let mut req = self
            .client
            .query()
            .table_name(&self.tables.records)
            .index_name(index)
            .key_condition_expression(key_cond)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .scan_index_forward(cp.forward)
            .limit(cp.limit);
        if let Some(start) = &cp.start_key {
            req = req.set_exclusive_start_key(Some(start.clone()));
        }
        let resp = req.send().await.map_err(|e| StoreError::Db(Box::new(e)))?;
        Ok(Page {
            items: resp.items.unwrap_or_default(),
            cursor: resp.last_evaluated_key.and_then(|k| av::encode_cursor(&k)),
        })
    }

    pub async fn get_mail(&self, search_items: &[HashMap<String, AttributeValue>]) -> Result<Vec<HashMap<String, AttributeValue>>, StoreError> {
        let keys: Vec<HashMap<String, AttributeValue>> = search_items
            .iter()
            .map(mail_key_from_search_item)
            .collect::<Result<_, _>>()?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let resp = self
            .client
            .batch_get_item()
            .request_items(
                &self.tables.records,
                aws_sdk_dynamodb::types::KeysAndAttributes::builder()
                    .set_keys(Some(keys.clone()))
                    .build()
                    .map_err(|e| StoreError::Db(Box::new(e)))?,
            )
            .send()
            .await
            .map_err(|e| StoreError::Db(Box::new(e)))?;

        let responses = resp
            .responses
            .and_then(|mut r| r.remove(&self.tables.records))
            .unwrap_or_default();

        let mut mails = Vec::with_capacity(keys.len());
        for key in &keys {
            let found = responses.iter().find(|item| {
                item.get("list") == key.get("list") && item.get("month_id") == key.get("month_id")
            });
            match found {
                Some(item) => mails.push(item.clone()),
                None => {
                    return Err(StoreError::RecordNotFoundInBatchGet {
                        list: key.get("list").and_then(|v| v.as_s().ok()).unwrap_or("?").to_string(),
                        month_id: key.get("month_id").and_then(|v| v.as_s().ok()).unwrap_or("?").to_string(),
                    });
                }
            }
        }
        Ok(mails)
    }
}

fn extend_date_range(
    date_range: &Option<(String, String)>,
    date_attr: &str,
    names: &mut HashMap<String, String>,
    values: &mut HashMap<String, AttributeValue>,
    key_cond: &mut String,
) {
    if let Some((from, to)) = date_range {
        names.insert("#dt".to_string(), date_attr.to_string());
        values.insert(":from".to_string(), s(from));
        values.insert(":to".to_string(), s(&format!("{to}\u{FFFF}")));
        key_cond.push_str(" AND #dt BETWEEN :from AND :to");
    }
}

/// Derive the Record batch-get key from a Term-row search hit, per
/// `server.py`'s `mail_key_from_search_item`.
pub fn mail_key_from_search_item(
    item: &HashMap<String, AttributeValue>,
) -> Result<HashMap<String, AttributeValue>, StoreError> {
    let p = get_s(item, "p")?;
    let sk = get_s(item, "s")?;
    let list = p.split_once('/').map(|(l, _)| l.to_string()).unwrap_or(p);
    let month_id = sk.split_once('/').map(|(_, rest)| rest.to_string()).unwrap_or(sk);
    Ok(HashMap::from([
        ("list".to_string(), s(&list)),
        ("month_id".to_string(), s(&month_id)),
    ]))
}
