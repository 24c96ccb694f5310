use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};

/// JIRA REST が返す日時文字列を`DateTime<Utc>`にパース
///
/// `2024-01-01T10:00:00.000+0000` と RFC3339 (`...Z`, `...+09:00`) の両方を受け付ける。
pub fn parse_jira_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// JQL のリテラルとして使う日時表現
///
/// 時刻が 00:00 の場合は日付のみ (`yyyy/MM/dd`)、それ以外は `yyyy/MM/dd HH:mm`。
pub fn format_jql_datetime(value: &NaiveDateTime) -> String {
    if value.hour() == 0 && value.minute() == 0 {
        value.format("%Y/%m/%d").to_string()
    } else {
        value.format("%Y/%m/%d %H:%M").to_string()
    }
}

/// 差分比較に使う短い日付表現 (`d/MMM/yy`)
pub fn format_short_date(value: &NaiveDate) -> String {
    value.format("%-d/%b/%y").to_string()
}

/// `Option<DateTime<Utc>>` 用の serde ヘルパー
pub(crate) mod option_jira_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S%.3f%z").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => super::parse_jira_datetime(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid JIRA datetime: {}", s))),
        }
    }
}
