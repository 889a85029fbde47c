//! Environment-driven configuration, following the `AuthConfig::from_env()`
//! pattern: plain `std::env::var` reads with `unwrap_or_else` defaults.

use crate::indexer::IndexParams;

/// DynamoDB table names. Overridable so integration tests can point at a
/// disposable namespace without touching the others.
#[derive(Debug, Clone)]
pub struct TableNames {
    pub records: String,
    pub terms: String,
    pub checkpoints: String,
    pub status: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            records: "openjdk-mail-records".to_string(),
            terms: "openjdk-mail-terms".to_string(),
            checkpoints: "openjdk-mail-checkpoints".to_string(),
            status: "openjdk-mail-status".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub archive_base_url: String,
    pub aws_region: String,
    pub mail_workers: usize,
    pub db_workers: usize,
    pub throttle_sleep_secs: f64,
    pub tables: TableNames,
    pub index_params: IndexParams,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            archive_base_url: std::env::var("ARCHIVE_BASE_URL")
                .unwrap_or_else(|_| "https://mail.openjdk.org/pipermail".to_string()),
            aws_region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-west-1".to_string()),
            mail_workers: env_usize("MAIL_WORKERS", 20),
            db_workers: env_usize("DB_WORKERS", 10),
            throttle_sleep_secs: std::env::var("THROTTLE_SLEEP_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1.5),
            tables: TableNames {
                records: std::env::var("TABLE_RECORDS")
                    .unwrap_or_else(|_| TableNames::default().records),
                terms: std::env::var("TABLE_TERMS")
                    .unwrap_or_else(|_| TableNames::default().terms),
                checkpoints: std::env::var("TABLE_CHECKPOINTS")
                    .unwrap_or_else(|_| TableNames::default().checkpoints),
                status: std::env::var("TABLE_STATUS")
                    .unwrap_or_else(|_| TableNames::default().status),
            },
            index_params: IndexParams::default(),
        }
    }
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Fixed roster of lists the update driver sweeps, per `original_source/src/updater.py`.
pub const MAILING_LISTS: &[&str] = &[
    "amber-dev",
    "babylon-dev",
    "classfile-api-dev",
    "compiler-dev",
    "crac-dev",
    "discuss",
    "graal-dev",
    "jdk-dev",
    "jigsaw-dev",
    "leyden-dev",
    "lilliput-dev",
    "loom-dev",
    "net-dev",
    "nio-dev",
    "panama-dev",
    "quality-discuss",
    "valhalla-dev",
    "valhalla-spec-comments",
    "valhalla-spec-experts",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        // SAFETY: test-only, single-threaded access to process env.
        for key in [
            "ARCHIVE_BASE_URL",
            "AWS_REGION",
            "MAIL_WORKERS",
            "DB_WORKERS",
            "THROTTLE_SLEEP_SECS",
        ] {
            unsafe { std::env::remove_var(key) };
        }
        let cfg = Config::from_env();
        assert_eq!(cfg.archive_base_url, "https://mail.openjdk.org/pipermail");
        assert_eq!(cfg.aws_region, "us-west-1");
        assert_eq!(cfg.mail_workers, 20);
        assert_eq!(cfg.db_workers, 10);
        assert_eq!(cfg.throttle_sleep_secs, 1.5);
    }

    #[test]
    fn roster_matches_updater() {
        assert_eq!(MAILING_LISTS.len(), 19);
        assert!(MAILING_LISTS.contains(&"loom-dev"));
    }
}
