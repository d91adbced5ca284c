//! Hive-style partition paths.
//!
//! Builds `key=value` directory prefixes for written tables and extracts
//! them back from file paths when a table is read.

use std::collections::BTreeMap;

/// Directory value used for a null partition value.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// Characters that cannot appear verbatim in a partition directory value.
fn needs_escape(c: char) -> bool {
    matches!(c, '/' | '\\' | '=' | '%' | ':' | '#' | '?' | '*' | '"' | '\'') || c.is_control()
}

/// Percent-escape a partition value for use in a directory name.
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                escaped.push_str(&format!("%{byte:02X}"));
            }
        } else {
            escaped.push(c);
        }
    }
    escaped
}

fn hex_digit(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Reverse [`escape_value`]. Malformed escapes are kept verbatim.
pub fn unescape_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Build the directory prefix for one combination of partition values.
///
/// Keys keep the order given, so `[("year", 2018), ("month", 11)]` becomes
/// `year=2018/month=11`. `None` maps to [`DEFAULT_PARTITION`].
pub fn partition_prefix<K: AsRef<str>>(values: &[(K, Option<String>)]) -> String {
    values
        .iter()
        .map(|(key, value)| match value {
            Some(v) => format!("{}={}", key.as_ref(), escape_value(v)),
            None => format!("{}={DEFAULT_PARTITION}", key.as_ref()),
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Extracts partition values from file paths.
///
/// For Hive-style paths like `year=2018/month=11/part-0.parquet`, every
/// `key=value` directory segment is returned. A value of
/// [`DEFAULT_PARTITION`] comes back as `None`.
///
/// # Examples
///
/// ```
/// use sparkify_core::PartitionExtractor;
///
/// let values = PartitionExtractor::extract("time/year=2018/month=11/part-0.parquet");
/// assert_eq!(values.get("year"), Some(&Some("2018".to_string())));
/// assert_eq!(values.get("month"), Some(&Some("11".to_string())));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionExtractor;

impl PartitionExtractor {
    /// Extract partition columns in directory order.
    pub fn columns(path: &str) -> Vec<(String, Option<String>)> {
        let mut segments: Vec<&str> = path.split('/').collect();
        // The last segment is the file name
        segments.pop();

        segments
            .into_iter()
            .filter_map(|segment| segment.split_once('='))
            .map(|(key, value)| {
                let value = (value != DEFAULT_PARTITION).then(|| unescape_value(value));
                (key.to_string(), value)
            })
            .collect()
    }

    /// Extract all partition values from a path, keyed by column name.
    pub fn extract(path: &str) -> BTreeMap<String, Option<String>> {
        Self::columns(path).into_iter().collect()
    }
}
