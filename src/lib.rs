pub mod cache;
pub mod client;
pub mod entity;
pub mod error;
pub mod field;
pub mod issue;
pub mod models;
pub mod query;
pub mod reference;
pub mod services;

pub use client::{Auth, JiraClient, JiraConfig, JiraRestClientSettings};
pub use error::{Error, Result};
pub use models::*;

// Named entity re-exports
pub use entity::{
    IssuePriority, IssueResolution, IssueStatus, IssueType, NamedConstant, NamedEntity,
};

// Field metadata re-exports
pub use field::{FIELD_DESCRIPTORS, FieldDescriptor, FieldKind, IssueField};

// Issue re-exports
pub use issue::{
    CascadingSelectValue, CustomFieldCodec, CustomFieldSerializer, CustomFieldValue,
    CustomFieldValueCollection, FieldChange, Issue, IssueLabelCollection,
    ProjectComponentCollection, ProjectVersionCollection,
};

// Query re-exports
pub use query::{
    ComparableString, Expr, JiraQueryable, JqlData, JqlExpressionVisitor, JqlTranslator,
    LiteralDateTime, LiteralMatch, Value,
};

// Reference data re-exports
pub use cache::{EntityDictionary, JiraCache};
pub use reference::{EntityKind, ReferenceData, StaticReferenceData};
