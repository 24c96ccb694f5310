/// 課題フィールドの定義表
///
/// JQL 生成と差分計算の両方がこの表を参照する。
/// - `jql_alias`: JQL でのフィールド名 (省略時はプロパティ名)
/// - `contains_equality`: 等価比較を `~` / `!~` で出力する
/// - `remote_name`: 差分計算で比較するスナップショット側のフィールド
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueField {
    Summary,
    Description,
    Environment,
    Assignee,
    Key,
    Priority,
    Project,
    Reporter,
    Resolution,
    Status,
    Type,
    Created,
    DueDate,
    Updated,
    ResolutionDate,
    Votes,
    Components,
    AffectsVersions,
    FixVersions,
    Labels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Entity,
    Date,
    Number,
    Collection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub field: IssueField,
    pub property_name: &'static str,
    pub jql_alias: Option<&'static str>,
    pub contains_equality: bool,
    pub remote_name: Option<&'static str>,
    pub kind: FieldKind,
}

const fn descriptor(
    field: IssueField,
    property_name: &'static str,
    kind: FieldKind,
    remote_name: Option<&'static str>,
) -> FieldDescriptor {
    FieldDescriptor {
        field,
        property_name,
        jql_alias: None,
        contains_equality: false,
        remote_name,
        kind,
    }
}

const fn aliased(mut d: FieldDescriptor, alias: &'static str) -> FieldDescriptor {
    d.jql_alias = Some(alias);
    d
}

const fn contains(mut d: FieldDescriptor) -> FieldDescriptor {
    d.contains_equality = true;
    d
}

use FieldKind::*;

/// 宣言順 (差分の出力順でもある)
pub static FIELD_DESCRIPTORS: [FieldDescriptor; 20] = [
    descriptor(IssueField::Summary, "Summary", Text, Some("summary")),
    contains(descriptor(IssueField::Description, "Description", Text, Some("description"))),
    contains(descriptor(IssueField::Environment, "Environment", Text, Some("environment"))),
    descriptor(IssueField::Assignee, "Assignee", Text, Some("assignee")),
    descriptor(IssueField::Key, "Key", Text, Some("key")),
    descriptor(IssueField::Priority, "Priority", Entity, Some("priority")),
    descriptor(IssueField::Project, "Project", Text, Some("project")),
    descriptor(IssueField::Reporter, "Reporter", Text, Some("reporter")),
    descriptor(IssueField::Resolution, "Resolution", Entity, Some("resolution")),
    descriptor(IssueField::Status, "Status", Entity, Some("status")),
    descriptor(IssueField::Type, "Type", Entity, Some("issuetype")),
    descriptor(IssueField::Created, "Created", Date, Some("created")),
    descriptor(IssueField::DueDate, "DueDate", Date, Some("duedate")),
    descriptor(IssueField::Updated, "Updated", Date, Some("updated")),
    descriptor(IssueField::ResolutionDate, "ResolutionDate", Date, None),
    descriptor(IssueField::Votes, "Votes", Number, None),
    aliased(descriptor(IssueField::Components, "Components", Collection, Some("components")), "component"),
    aliased(
        descriptor(IssueField::AffectsVersions, "AffectsVersions", Collection, Some("versions")),
        "AffectedVersion",
    ),
    aliased(
        descriptor(IssueField::FixVersions, "FixVersions", Collection, Some("fixVersions")),
        "FixVersion",
    ),
    descriptor(IssueField::Labels, "Labels", Collection, Some("labels")),
];

impl IssueField {
    pub fn descriptor(&self) -> &'static FieldDescriptor {
        // 表は列挙の宣言順に並んでいる
        &FIELD_DESCRIPTORS[*self as usize]
    }

    /// JQL でのフィールド名
    pub fn jql_name(&self) -> &'static str {
        let d = self.descriptor();
        d.jql_alias.unwrap_or(d.property_name)
    }

    pub fn property_name(&self) -> &'static str {
        self.descriptor().property_name
    }

    pub fn contains_equality(&self) -> bool {
        self.descriptor().contains_equality
    }
}

impl fmt::Display for IssueField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.property_name())
    }
}
