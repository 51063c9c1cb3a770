//! Backup file naming

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};

/// Backup path for `target`: `<target>.<md5 of target path>.<UTC timestamp>`
pub fn backup_path_for(target: &str) -> String {
    backup_path_at(target, Utc::now())
}

pub fn backup_path_at(target: &str, when: DateTime<Utc>) -> String {
    let digest = Md5::digest(target.as_bytes());
    format!("{}.{:x}.{}", target, digest, when.format("%Y%m%d%H%M%S"))
}
