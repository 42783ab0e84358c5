//! Backup blob naming

use chrono::{DateTime, Utc};

pub const DEFAULT_BACKUP_PREFIX: &str = "apim_";
pub const BACKUP_EXTENSION: &str = ".bak";

/// Minute-granularity UTC stamp, e.g. `202403051407`
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// `<prefix><yyyyMMddHHmm>.bak` for the given instant.
///
/// Two runs in the same minute with the same prefix produce the same name.
pub fn backup_blob_name(prefix: &str, now: DateTime<Utc>) -> String {
    format!("{}{}{}", prefix, now.format(TIMESTAMP_FORMAT), BACKUP_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use regex::Regex;

    #[test]
    fn test_backup_blob_name() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 59).unwrap();
        assert_eq!(backup_blob_name("apim_", now), "apim_202403051407.bak");
        assert_eq!(backup_blob_name("", now), "202403051407.bak");
    }

    #[test]
    fn test_backup_blob_name_pattern() {
        let pattern = Regex::new(r"^contoso-\d{12}\.bak$").unwrap();
        assert!(pattern.is_match(&backup_blob_name("contoso-", Utc::now())));
    }

    #[test]
    fn test_same_minute_collides() {
        let first = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 58).unwrap();
        assert_eq!(
            backup_blob_name(DEFAULT_BACKUP_PREFIX, first),
            backup_blob_name(DEFAULT_BACKUP_PREFIX, second)
        );
    }
}
