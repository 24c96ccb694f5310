use serde::{Deserialize, Serialize};

/// 課題検索で取得するフィールド (コメント等の重いフィールドは除く)
pub const DEFAULT_ISSUE_FIELDS: [&str; 7] = [
    "*all",
    "-comment",
    "-attachment",
    "-issuelinks",
    "-subtasks",
    "-watches",
    "-worklog",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueSearchOptions {
    pub jql: String,

    #[serde(rename = "startAt")]
    pub start_at: u32,

    #[serde(rename = "maxResults")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,

    pub fields: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<Vec<String>>,

    #[serde(rename = "validateQuery")]
    pub validate_query: bool,
}

impl IssueSearchOptions {
    pub fn new(jql: impl Into<String>) -> Self {
        Self {
            jql: jql.into(),
            start_at: 0,
            max_results: None,
            fields: DEFAULT_ISSUE_FIELDS.iter().map(|f| f.to_string()).collect(),
            expand: None,
            validate_query: true,
        }
    }

    pub fn start_at(mut self, start_at: u32) -> Self {
        self.start_at = start_at;
        self
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn expand(mut self, expand: Vec<String>) -> Self {
        self.expand = Some(expand);
        self
    }

    pub fn validate_query(mut self, validate: bool) -> Self {
        self.validate_query = validate;
        self
    }
}

/// 検索レスポンスの生データ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "startAt")]
    pub start_at: u32,

    #[serde(rename = "maxResults")]
    pub max_results: u32,

    pub total: u32,

    pub issues: Vec<serde_json::Value>,
}

/// ページングされた結果
#[derive(Debug, Clone, PartialEq)]
pub struct PagedQueryResult<T> {
    pub start_at: u32,
    pub items_per_page: u32,
    pub total_items: u32,
    pub items: Vec<T>,
}

impl<T> PagedQueryResult<T> {
    pub fn new(items: Vec<T>, start_at: u32, items_per_page: u32, total_items: u32) -> Self {
        Self {
            start_at,
            items_per_page,
            total_items,
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<T> IntoIterator for PagedQueryResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
