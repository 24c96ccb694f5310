/// JQL の演算子とキーワード
pub const EQUALS: &str = "=";
pub const NOT_EQUALS: &str = "!=";
pub const CONTAINS: &str = "~";
pub const NOT_CONTAINS: &str = "!~";
pub const GREATER_THAN: &str = ">";
pub const GREATER_THAN_OR_EQUALS: &str = ">=";
pub const LESS_THAN: &str = "<";
pub const LESS_THAN_OR_EQUALS: &str = "<=";

pub const IS: &str = "is";
pub const IS_NOT: &str = "is not";
pub const AND: &str = "and";
pub const OR: &str = "or";

pub const NULL: &str = "null";
pub const EMPTY: &str = "empty";

pub const ORDER_BY: &str = " order by ";
pub const ASCENDING: &str = "asc";
pub const DESCENDING: &str = "desc";

/// 等価比較の演算子 (`contains` なら `~` / `!~`)
pub fn equality(equal: bool, contains: bool) -> &'static str {
    match (equal, contains) {
        (true, false) => EQUALS,
        (false, false) => NOT_EQUALS,
        (true, true) => CONTAINS,
        (false, true) => NOT_CONTAINS,
    }
}

/// null / empty との比較に使うキーワード
pub fn is(equal: bool) -> &'static str {
    if equal { IS } else { IS_NOT }
}
