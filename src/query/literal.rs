use std::fmt;

/// 完全一致 (`=`) を強制する文字列
///
/// `~` で比較されるフィールドでも、この値と比べると `=` が使われる。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiteralMatch(String);

impl LiteralMatch {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LiteralMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// JQL にそのまま渡す日時文字列 (例: `-1d`, `startOfWeek()`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiteralDateTime(String);

impl LiteralDateTime {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LiteralDateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 大小比較できる文字列 (課題キーなど)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComparableString(String);

impl ComparableString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComparableString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl PartialEq<str> for ComparableString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ComparableString {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl fmt::Display for ComparableString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
