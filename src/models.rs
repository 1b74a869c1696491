//! Data models for search responses and collected news records.
//!
//! - [`SearchResponse`] / [`SearchItem`]: the JSON payload of one search page,
//!   field names as the API sends them.
//! - [`NewsRecord`]: a normalized article as written to part and merged files.
//!   Field order is the CSV column order.

use crate::filter::strip_emphasis;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Timestamp layout used by the search API and by persisted files,
/// e.g. `Mon, 03 Jan 2022 10:00:00 +0900`.
pub const PUB_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Column names of part and merged files, in order.
pub const COLUMNS: [&str; 7] = [
    "title",
    "url",
    "source_url",
    "description",
    "date",
    "quarter",
    "keyword",
];

/// One page of search results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    /// Number of documents the API reports as available for the query.
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

impl SearchResponse {
    /// The result handed out when a search could not be completed.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// A raw search hit before normalization.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub originallink: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "pubDate")]
    pub pub_date: String,
}

/// A normalized news article.
///
/// `quarter` and `keyword` stay empty until the record is handed to the
/// part writer, which tags it with the pair that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NewsRecord {
    pub title: String,
    pub url: String,
    pub source_url: String,
    pub description: String,
    #[serde(rename = "date", with = "pub_date")]
    pub published_at: DateTime<FixedOffset>,
    pub quarter: String,
    pub keyword: String,
}

impl NewsRecord {
    /// Normalize a raw search hit.
    ///
    /// Returns `None` when the publish date does not parse; such hits are
    /// dropped as non-matching rather than reported.
    pub fn from_item(item: SearchItem) -> Option<Self> {
        let published_at = parse_pub_date(&item.pub_date)?;
        Some(Self {
            title: strip_emphasis(&item.title),
            url: item.link,
            source_url: item.originallink,
            description: strip_emphasis(&item.description),
            published_at,
            quarter: String::new(),
            keyword: String::new(),
        })
    }

    pub fn has_column(name: &str) -> bool {
        COLUMNS.contains(&name)
    }

    /// Value of a column as it appears in the CSV output.
    pub fn column(&self, name: &str) -> Option<String> {
        let value = match name {
            "title" => self.title.clone(),
            "url" => self.url.clone(),
            "source_url" => self.source_url.clone(),
            "description" => self.description.clone(),
            "date" => self.published_at.format(PUB_DATE_FORMAT).to_string(),
            "quarter" => self.quarter.clone(),
            "keyword" => self.keyword.clone(),
            _ => return None,
        };
        Some(value)
    }
}

pub fn parse_pub_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(raw.trim(), PUB_DATE_FORMAT).ok()
}

mod pub_date {
    use super::PUB_DATE_FORMAT;
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(PUB_DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_pub_date(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unparseable date '{raw}'")))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    /// Format a KST timestamp the way the search API does.
    pub(crate) fn kst(year: i32, month: u32, day: u32) -> String {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(year, month, day, 10, 30, 0)
            .unwrap()
            .format(PUB_DATE_FORMAT)
            .to_string()
    }

    pub(crate) fn item(title: &str, link: &str, pub_date: &str) -> SearchItem {
        SearchItem {
            title: title.to_string(),
            link: link.to_string(),
            originallink: format!("{link}?orig"),
            description: format!("{title} 본문"),
            pub_date: pub_date.to_string(),
        }
    }

    #[test]
    fn test_search_response_deserialization() {
        let json = r#"{
            "lastBuildDate": "Mon, 03 Jan 2022 10:30:00 +0900",
            "total": 250,
            "start": 1,
            "display": 1,
            "items": [{
                "title": "<b>청도군</b> 소식",
                "originallink": "https://example.com/orig",
                "link": "https://n.news.naver.com/1",
                "description": "설명 <b>청도군</b>",
                "pubDate": "Mon, 03 Jan 2022 10:30:00 +0900"
            }]
        }"#;
        let resp: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.total, 250);
        assert_eq!(resp.items.len(), 1);
        assert_eq!(resp.items[0].pub_date, "Mon, 03 Jan 2022 10:30:00 +0900");
    }

    #[test]
    fn test_search_response_missing_fields_default() {
        let resp: SearchResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(resp.total, 0);
        assert!(resp.items.is_empty());
    }

    #[test]
    fn test_from_item_normalizes_fields() {
        let raw = SearchItem {
            title: "<b>청도군</b> 소식".to_string(),
            link: "https://n.news.naver.com/1".to_string(),
            originallink: "https://example.com/orig".to_string(),
            description: "설명 <b>청도군</b>".to_string(),
            pub_date: kst(2022, 1, 3),
        };
        let record = NewsRecord::from_item(raw).unwrap();
        assert_eq!(record.title, "청도군 소식");
        assert_eq!(record.description, "설명 청도군");
        assert_eq!(record.url, "https://n.news.naver.com/1");
        assert_eq!(record.source_url, "https://example.com/orig");
        assert_eq!(record.published_at.year(), 2022);
        assert!(record.quarter.is_empty());
        assert!(record.keyword.is_empty());
    }

    #[test]
    fn test_from_item_drops_unparseable_date() {
        let raw = item("청도군", "https://n.news.naver.com/1", "2022-01-03 10:30");
        assert!(NewsRecord::from_item(raw).is_none());
    }

    #[test]
    fn test_column_lookup() {
        let record = NewsRecord::from_item(item("t", "https://a", &kst(2022, 3, 31))).unwrap();
        assert_eq!(record.column("url").as_deref(), Some("https://a"));
        assert_eq!(record.column("date"), Some(kst(2022, 3, 31)));
        assert_eq!(record.column("link"), None);
        assert!(NewsRecord::has_column("source_url"));
        assert!(!NewsRecord::has_column("originallink"));
    }
}
