//! BQL abstract syntax tree.
//!
//! These types represent parsed queries. They are pure data — no behavior
//! beyond the canonical renderer, no service references, no execution logic.
//!
//! `Display` renders a canonical query string: parsing the rendered form
//! yields a structurally identical tree.

use std::fmt;

use crate::model::RelationSet;

/// A complete parsed query.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// MATCH ... [WHERE] [SET] RETURN ... (SET items make it a mutation)
    Read { read: MatchPart, returns: Vec<ReturnItem> },
    /// CREATE ... [RETURN]
    WriteStandalone { create: CreatePart, returns: Vec<ReturnItem> },
    /// MATCH ... CREATE ... [RETURN]
    ReadWrite { read: MatchPart, create: CreatePart, returns: Vec<ReturnItem> },
    /// MERGE ... [ON CREATE SET] [ON MATCH SET] [RETURN]
    Upsert { merge: MergePart, returns: Vec<ReturnItem> },
    /// MATCH ... MERGE ... [RETURN]
    ReadUpsert { read: MatchPart, merge: MergePart, returns: Vec<ReturnItem> },
    /// MATCH ... [DETACH] DELETE ...
    ReadDelete { read: MatchPart, delete: DeletePart },
}

impl Query {
    pub fn read_part(&self) -> Option<&MatchPart> {
        match self {
            Query::Read { read, .. }
            | Query::ReadWrite { read, .. }
            | Query::ReadUpsert { read, .. }
            | Query::ReadDelete { read, .. } => Some(read),
            Query::WriteStandalone { .. } | Query::Upsert { .. } => None,
        }
    }

    pub fn returns(&self) -> &[ReturnItem] {
        match self {
            Query::Read { returns, .. }
            | Query::WriteStandalone { returns, .. }
            | Query::ReadWrite { returns, .. }
            | Query::Upsert { returns, .. }
            | Query::ReadUpsert { returns, .. } => returns,
            Query::ReadDelete { .. } => &[],
        }
    }

    /// Patterns of the write clause (CREATE or MERGE), if any.
    pub fn write_patterns(&self) -> &[Pattern] {
        match self {
            Query::WriteStandalone { create, .. } | Query::ReadWrite { create, .. } => {
                &create.patterns
            }
            Query::Upsert { merge, .. } | Query::ReadUpsert { merge, .. } => &merge.patterns,
            Query::Read { .. } | Query::ReadDelete { .. } => &[],
        }
    }
}

/// MATCH patterns with optional WHERE and SET.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MatchPart {
    pub patterns: Vec<Pattern>,
    pub where_clause: Option<WhereExpr>,
    pub set_items: Vec<SetItem>,
}

/// CREATE patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatePart {
    pub patterns: Vec<Pattern>,
}

/// MERGE patterns with conditional SET clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct MergePart {
    pub patterns: Vec<Pattern>,
    pub on_create: Vec<SetItem>,
    pub on_match: Vec<SetItem>,
}

/// DELETE targets.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletePart {
    pub detach: bool,
    pub variables: Vec<String>,
}

/// A pattern: an alternating node/relationship sequence that begins and
/// ends with a node, structurally guaranteed by the head/tail split.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub head: NodePattern,
    pub tail: Vec<(RelPattern, NodePattern)>,
}

impl Pattern {
    pub fn nodes(&self) -> impl Iterator<Item = &NodePattern> {
        std::iter::once(&self.head).chain(self.tail.iter().map(|(_, n)| n))
    }

    pub fn relationships(&self) -> impl Iterator<Item = &RelPattern> {
        self.tail.iter().map(|(r, _)| r)
    }
}

/// Node pattern: `(var:Type {name: "..."})`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodePattern {
    pub variable: String,
    pub type_label: Option<String>,
    pub name: Option<String>,
}

/// Relationship pattern: `-[r:CHILD|JUMP*1..3]->` or `-->`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelPattern {
    pub variable: Option<String>,
    pub relations: RelationSet,
    pub hops: HopSpec,
}

/// Hop specifier. `max` is `None` for the statically rejected unbounded
/// forms (`*`, `*N..`); the validator refuses those.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HopSpec {
    pub min: u32,
    pub max: Option<u32>,
}

impl HopSpec {
    pub const SINGLE: HopSpec = HopSpec { min: 1, max: Some(1) };
}

/// WHERE expression tree. Precedence, lowest to highest: OR < XOR < AND < NOT.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereExpr {
    Or(Box<WhereExpr>, Box<WhereExpr>),
    Xor(Box<WhereExpr>, Box<WhereExpr>),
    And(Box<WhereExpr>, Box<WhereExpr>),
    Not(Box<WhereExpr>),
    Atom(WhereAtom),
}

impl WhereExpr {
    /// Variables referenced anywhere in the tree, in first-appearance order.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            WhereExpr::Or(a, b) | WhereExpr::Xor(a, b) | WhereExpr::And(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            WhereExpr::Not(inner) => inner.collect_variables(out),
            WhereExpr::Atom(atom) => {
                let var = atom.variable();
                if !out.contains(&var) {
                    out.push(var);
                }
            }
        }
    }
}

/// Leaf predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum WhereAtom {
    NameCompare { variable: String, op: NameOp, value: String },
    IsNull { variable: String, property: String },
    IsNotNull { variable: String, property: String },
}

impl WhereAtom {
    pub fn variable(&self) -> &str {
        match self {
            WhereAtom::NameCompare { variable, .. }
            | WhereAtom::IsNull { variable, .. }
            | WhereAtom::IsNotNull { variable, .. } => variable,
        }
    }
}

/// Name comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameOp {
    Eq,
    Contains,
    StartsWith,
    EndsWith,
    Similar,
}

impl fmt::Display for NameOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NameOp::Eq => "=",
            NameOp::Contains => "CONTAINS",
            NameOp::StartsWith => "STARTS WITH",
            NameOp::EndsWith => "ENDS WITH",
            NameOp::Similar => "=~",
        })
    }
}

/// A single SET item.
#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    /// `SET p.label = "x"` / `SET p.label = NULL`
    Property { variable: String, property: String, value: Option<String> },
    /// `SET p:TypeName`
    TypeLabel { variable: String, label: String },
}

impl SetItem {
    pub fn variable(&self) -> &str {
        match self {
            SetItem::Property { variable, .. } | SetItem::TypeLabel { variable, .. } => variable,
        }
    }
}

/// A single RETURN item: `v`, `v.name`, or `v.id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnItem {
    pub variable: String,
    pub field: Option<ReturnField>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnField {
    Name,
    Id,
}

// ============================================================================
// Canonical renderer
// ============================================================================

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl fmt::Display for NodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}", self.variable)?;
        if let Some(label) = &self.type_label {
            write!(f, ":{label}")?;
        }
        if let Some(name) = &self.name {
            write!(f, " {{name: \"{}\"}}", escape(name))?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for HopSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) if self.min == max => write!(f, "*{}", self.min),
            Some(max) => write!(f, "*{}..{}", self.min, max),
            None => write!(f, "*{}..", self.min),
        }
    }
}

impl fmt::Display for RelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let anonymous = self.variable.is_none()
            && matches!(self.relations, RelationSet::Any)
            && self.hops == HopSpec::SINGLE;
        if anonymous {
            return write!(f, "-->");
        }

        write!(f, "-[")?;
        if let Some(var) = &self.variable {
            write!(f, "{var}")?;
        }
        match &self.relations {
            RelationSet::Single(r) => write!(f, ":{r}")?,
            RelationSet::Union(rs) => {
                let joined: Vec<String> = rs.iter().map(|r| r.to_string()).collect();
                write!(f, ":{}", joined.join("|"))?;
            }
            RelationSet::Any => {}
        }
        if self.hops != HopSpec::SINGLE {
            write!(f, "{}", self.hops)?;
        }
        write!(f, "]->")
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        for (rel, node) in &self.tail {
            write!(f, "{rel}{node}")?;
        }
        Ok(())
    }
}

impl WhereExpr {
    fn precedence(&self) -> u8 {
        match self {
            WhereExpr::Or(..) => 1,
            WhereExpr::Xor(..) => 2,
            WhereExpr::And(..) => 3,
            WhereExpr::Not(..) => 4,
            WhereExpr::Atom(..) => 5,
        }
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereExpr::Or(a, b) => self.render_binary(f, a, b, "OR"),
            WhereExpr::Xor(a, b) => self.render_binary(f, a, b, "XOR"),
            WhereExpr::And(a, b) => self.render_binary(f, a, b, "AND"),
            WhereExpr::Not(inner) => {
                write!(f, "NOT ")?;
                if inner.precedence() < self.precedence() {
                    write!(f, "(")?;
                    inner.render(f)?;
                    write!(f, ")")
                } else {
                    inner.render(f)
                }
            }
            WhereExpr::Atom(atom) => write!(f, "{atom}"),
        }
    }

    fn render_binary(
        &self,
        f: &mut fmt::Formatter<'_>,
        left: &WhereExpr,
        right: &WhereExpr,
        op: &str,
    ) -> fmt::Result {
        // Left-associative: a right-hand child at the same precedence needs
        // parentheses to re-parse into the same shape.
        if left.precedence() < self.precedence() {
            write!(f, "(")?;
            left.render(f)?;
            write!(f, ")")?;
        } else {
            left.render(f)?;
        }
        write!(f, " {op} ")?;
        if right.precedence() <= self.precedence() {
            write!(f, "(")?;
            right.render(f)?;
            write!(f, ")")
        } else {
            right.render(f)
        }
    }
}

impl fmt::Display for WhereExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f)
    }
}

impl fmt::Display for WhereAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereAtom::NameCompare { variable, op, value } => {
                write!(f, "{variable}.name {op} \"{}\"", escape(value))
            }
            WhereAtom::IsNull { variable, property } => {
                write!(f, "{variable}.{property} IS NULL")
            }
            WhereAtom::IsNotNull { variable, property } => {
                write!(f, "{variable}.{property} IS NOT NULL")
            }
        }
    }
}

impl fmt::Display for SetItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetItem::Property { variable, property, value: Some(v) } => {
                write!(f, "{variable}.{property} = \"{}\"", escape(v))
            }
            SetItem::Property { variable, property, value: None } => {
                write!(f, "{variable}.{property} = NULL")
            }
            SetItem::TypeLabel { variable, label } => write!(f, "{variable}:{label}"),
        }
    }
}

impl fmt::Display for ReturnItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(ReturnField::Name) => write!(f, "{}.name", self.variable),
            Some(ReturnField::Id) => write!(f, "{}.id", self.variable),
            None => write!(f, "{}", self.variable),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for MatchPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MATCH ")?;
        write_list(f, &self.patterns)?;
        if let Some(w) = &self.where_clause {
            write!(f, " WHERE {w}")?;
        }
        if !self.set_items.is_empty() {
            write!(f, " SET ")?;
            write_list(f, &self.set_items)?;
        }
        Ok(())
    }
}

impl fmt::Display for CreatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CREATE ")?;
        write_list(f, &self.patterns)
    }
}

impl fmt::Display for MergePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MERGE ")?;
        write_list(f, &self.patterns)?;
        if !self.on_create.is_empty() {
            write!(f, " ON CREATE SET ")?;
            write_list(f, &self.on_create)?;
        }
        if !self.on_match.is_empty() {
            write!(f, " ON MATCH SET ")?;
            write_list(f, &self.on_match)?;
        }
        Ok(())
    }
}

impl fmt::Display for DeletePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detach {
            write!(f, "DETACH ")?;
        }
        write!(f, "DELETE ")?;
        write_list(f, &self.variables)
    }
}

fn write_returns(f: &mut fmt::Formatter<'_>, returns: &[ReturnItem]) -> fmt::Result {
    if !returns.is_empty() {
        write!(f, " RETURN ")?;
        write_list(f, returns)?;
    }
    Ok(())
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Read { read, returns } => {
                write!(f, "{read}")?;
                write_returns(f, returns)
            }
            Query::WriteStandalone { create, returns } => {
                write!(f, "{create}")?;
                write_returns(f, returns)
            }
            Query::ReadWrite { read, create, returns } => {
                write!(f, "{read} {create}")?;
                write_returns(f, returns)
            }
            Query::Upsert { merge, returns } => {
                write!(f, "{merge}")?;
                write_returns(f, returns)
            }
            Query::ReadUpsert { read, merge, returns } => {
                write!(f, "{read} {merge}")?;
                write_returns(f, returns)
            }
            Query::ReadDelete { read, delete } => write!(f, "{read} {delete}"),
        }
    }
}
