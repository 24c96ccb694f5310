pub mod comment;
pub mod datetime;
pub mod field;
pub mod issue;
pub mod issue_type;
pub mod priority;
pub mod project;
pub mod search;
pub mod status;
pub mod transition;
pub mod user;

pub use comment::*;
pub use datetime::{format_jql_datetime, format_short_date, parse_jira_datetime};
pub use field::*;
pub use issue::*;
pub use issue_type::*;
pub use priority::*;
pub use project::*;
pub use search::*;
pub use status::*;
pub use transition::*;
pub use user::User;

/// id と名前で識別されるリモートのエンティティ
pub trait JiraEntity {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}
