//! BQL recursive descent parser.
//!
//! Parses token streams into the sum-typed AST. Structural legality is
//! enforced here: clause ordering, DELETE requiring MATCH, variable
//! redefinition, and the clause combinations the AST cannot represent.

use crate::model::{Relation, RelationSet};
use crate::{Error, Result};

use super::ast::*;
use super::lexer::{Token, TokenKind};

/// Parser state — wraps a token slice with a cursor and the variable scope.
struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    node_vars: Vec<String>,
    rel_vars: Vec<String>,
}

impl<'t> Parser<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0, node_vars: Vec::new(), rel_vars: Vec::new() }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn advance(&mut self) -> &Token {
        let tok = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.expected(&[kind]))
        }
    }

    fn error(&self, message: String) -> Error {
        Error::Parse { position: self.peek().span.start, message }
    }

    /// Build a parse error listing the expected tokens at this position.
    fn expected(&self, kinds: &[TokenKind]) -> Error {
        let expected: Vec<&str> = kinds.iter().map(|k| k.describe()).collect();
        let found = self.peek();
        let found_desc = if found.kind == TokenKind::Eof {
            "end of query".to_string()
        } else {
            format!("'{}'", found.text)
        };
        self.error(format!("expected {}, found {}", expected.join(" or "), found_desc))
    }

    fn declare_node_var(&mut self, node: &NodePattern) -> Result<()> {
        let known = self.node_vars.iter().any(|v| v == &node.variable);
        if known {
            // A bare re-occurrence references the existing binding; carrying
            // new constraints is a redefinition.
            if node.type_label.is_some() || node.name.is_some() {
                return Err(self.error(format!(
                    "variable '{}' is already defined in this query",
                    node.variable
                )));
            }
        } else {
            if self.rel_vars.iter().any(|v| v == &node.variable) {
                return Err(self.error(format!(
                    "variable '{}' is already defined as a relationship variable",
                    node.variable
                )));
            }
            self.node_vars.push(node.variable.clone());
        }
        Ok(())
    }

    fn declare_rel_var(&mut self, variable: &str) -> Result<()> {
        if self.node_vars.iter().any(|v| v == variable)
            || self.rel_vars.iter().any(|v| v == variable)
        {
            return Err(self.error(format!(
                "variable '{variable}' is already defined in this query"
            )));
        }
        self.rel_vars.push(variable.to_string());
        Ok(())
    }
}

/// Parse a token stream into a query AST.
pub fn parse_tokens(tokens: &[Token]) -> Result<Query> {
    let mut p = Parser::new(tokens);

    // match_part? write_part? return_part? delete_part?
    let read = if p.at(TokenKind::Match) {
        Some(parse_match_part(&mut p)?)
    } else {
        None
    };

    let write = match p.peek_kind() {
        TokenKind::Create => {
            p.advance();
            Some(WriteClause::Create(CreatePart { patterns: parse_pattern_list(&mut p)? }))
        }
        TokenKind::Merge => {
            p.advance();
            Some(WriteClause::Merge(parse_merge_part(&mut p)?))
        }
        _ => None,
    };

    let returns = if p.eat(TokenKind::Return) {
        parse_return_items(&mut p)?
    } else {
        Vec::new()
    };

    let delete = if p.at(TokenKind::Detach) || p.at(TokenKind::Delete) {
        if read.is_none() {
            return Err(p.error("DELETE requires a preceding MATCH clause".into()));
        }
        Some(parse_delete_part(&mut p)?)
    } else {
        None
    };

    if !p.at(TokenKind::Eof) {
        return Err(unexpected_clause_error(&p, read.is_none() && write.is_none()));
    }

    classify(read, write, returns, delete)
}

/// The parsed write clause, before classification.
enum WriteClause {
    Create(CreatePart),
    Merge(MergePart),
}

/// Assemble the final sum-typed query, rejecting combinations the AST
/// cannot represent.
fn classify(
    read: Option<MatchPart>,
    write: Option<WriteClause>,
    returns: Vec<ReturnItem>,
    delete: Option<DeletePart>,
) -> Result<Query> {
    if let Some(delete) = delete {
        let Some(read) = read else {
            return Err(Error::Parse {
                position: 0,
                message: "DELETE requires a preceding MATCH clause".into(),
            });
        };
        if write.is_some() {
            return Err(Error::Semantic(
                "CREATE/MERGE cannot be combined with DELETE in one query".into(),
            ));
        }
        if !read.set_items.is_empty() {
            return Err(Error::Semantic(
                "SET and DELETE cannot be combined in one query".into(),
            ));
        }
        if !returns.is_empty() {
            return Err(Error::Semantic(
                "RETURN cannot be combined with DELETE; run the MATCH separately".into(),
            ));
        }
        return Ok(Query::ReadDelete { read, delete });
    }

    match (read, write) {
        (Some(read), Some(WriteClause::Create(create))) => {
            Ok(Query::ReadWrite { read, create, returns })
        }
        (None, Some(WriteClause::Create(create))) => {
            Ok(Query::WriteStandalone { create, returns })
        }
        (Some(read), Some(WriteClause::Merge(merge))) => {
            Ok(Query::ReadUpsert { read, merge, returns })
        }
        (None, Some(WriteClause::Merge(merge))) => Ok(Query::Upsert { merge, returns }),
        (Some(read), None) => {
            if read.set_items.is_empty() && returns.is_empty() {
                return Err(Error::Semantic(
                    "MATCH without SET, RETURN, or DELETE has no effect".into(),
                ));
            }
            Ok(Query::Read { read, returns })
        }
        (None, None) => Err(Error::Parse {
            position: 0,
            message: "query must begin with MATCH, CREATE, or MERGE".into(),
        }),
    }
}

/// Error for a token where a clause keyword was expected, with guidance for
/// recognizable-but-unsupported Cypher.
fn unexpected_clause_error(p: &Parser, at_start: bool) -> Error {
    let tok = p.peek();
    if tok.kind == TokenKind::With {
        return p.error("WITH pipelines are not supported; run separate queries instead".into());
    }
    if tok.kind == TokenKind::Identifier {
        if let Some(hint) = unsupported_hint(&tok.text) {
            return p.error(format!("'{}' is not supported: {hint}", tok.text.to_uppercase()));
        }
    }
    if at_start {
        p.error(format!(
            "expected MATCH, CREATE, or MERGE, found '{}'",
            tok.text
        ))
    } else {
        p.expected(&[TokenKind::Eof])
    }
}

fn unsupported_hint(ident: &str) -> Option<&'static str> {
    match ident.to_uppercase().as_str() {
        "OPTIONAL" => Some("run two separate queries instead of OPTIONAL MATCH"),
        "UNION" => Some("run the queries independently and combine results client-side"),
        "UNWIND" => Some("list expansion is not supported"),
        "ORDER" | "LIMIT" | "SKIP" => Some("result shaping is not supported; trim client-side"),
        "COUNT" | "COLLECT" | "SUM" | "AVG" | "MIN" | "MAX" => {
            Some("aggregation functions are not supported")
        }
        _ => None,
    }
}

// ============================================================================
// Clause parsers
// ============================================================================

fn parse_match_part(p: &mut Parser) -> Result<MatchPart> {
    p.expect(TokenKind::Match)?;
    let patterns = parse_pattern_list(p)?;

    let where_clause = if p.eat(TokenKind::Where) {
        Some(parse_where_expr(p)?)
    } else {
        None
    };

    let set_items = if p.eat(TokenKind::Set) {
        parse_set_items(p)?
    } else {
        Vec::new()
    };

    Ok(MatchPart { patterns, where_clause, set_items })
}

fn parse_merge_part(p: &mut Parser) -> Result<MergePart> {
    let patterns = parse_pattern_list(p)?;
    let mut on_create = Vec::new();
    let mut on_match = Vec::new();

    while p.eat(TokenKind::On) {
        match p.peek_kind() {
            TokenKind::Create => {
                p.advance();
                p.expect(TokenKind::Set)?;
                if !on_create.is_empty() {
                    return Err(p.error("duplicate ON CREATE SET clause".into()));
                }
                on_create = parse_set_items(p)?;
            }
            TokenKind::Match => {
                p.advance();
                p.expect(TokenKind::Set)?;
                if !on_match.is_empty() {
                    return Err(p.error("duplicate ON MATCH SET clause".into()));
                }
                on_match = parse_set_items(p)?;
            }
            _ => return Err(p.expected(&[TokenKind::Create, TokenKind::Match])),
        }
    }

    Ok(MergePart { patterns, on_create, on_match })
}

fn parse_delete_part(p: &mut Parser) -> Result<DeletePart> {
    let detach = p.eat(TokenKind::Detach);
    p.expect(TokenKind::Delete)?;

    let mut variables = Vec::new();
    variables.push(p.expect(TokenKind::Identifier)?.text.clone());
    while p.eat(TokenKind::Comma) {
        variables.push(p.expect(TokenKind::Identifier)?.text.clone());
    }

    Ok(DeletePart { detach, variables })
}

fn parse_return_items(p: &mut Parser) -> Result<Vec<ReturnItem>> {
    let mut items = Vec::new();
    items.push(parse_return_item(p)?);
    while p.eat(TokenKind::Comma) {
        items.push(parse_return_item(p)?);
    }
    Ok(items)
}

fn parse_return_item(p: &mut Parser) -> Result<ReturnItem> {
    let variable = p.expect(TokenKind::Identifier)?.text.clone();
    let field = if p.eat(TokenKind::Dot) {
        let field_tok = p.expect(TokenKind::Identifier)?;
        match field_tok.text.to_lowercase().as_str() {
            "name" => Some(ReturnField::Name),
            "id" => Some(ReturnField::Id),
            other => {
                return Err(Error::Parse {
                    position: field_tok.span.start,
                    message: format!("RETURN supports the name and id fields, not '{other}'"),
                })
            }
        }
    } else {
        None
    };
    Ok(ReturnItem { variable, field })
}

fn parse_set_items(p: &mut Parser) -> Result<Vec<SetItem>> {
    let mut items = Vec::new();
    items.push(parse_set_item(p)?);
    while p.eat(TokenKind::Comma) {
        items.push(parse_set_item(p)?);
    }
    Ok(items)
}

fn parse_set_item(p: &mut Parser) -> Result<SetItem> {
    let variable = p.expect(TokenKind::Identifier)?.text.clone();

    if p.eat(TokenKind::Dot) {
        let property = p.expect(TokenKind::Identifier)?.text.clone();
        p.expect(TokenKind::Eq)?;
        let value = if p.eat(TokenKind::Null) {
            None
        } else {
            Some(p.expect(TokenKind::StringLiteral)?.text.clone())
        };
        Ok(SetItem::Property { variable, property, value })
    } else if p.eat(TokenKind::Colon) {
        let label = p.expect(TokenKind::Identifier)?.text.clone();
        Ok(SetItem::TypeLabel { variable, label })
    } else {
        Err(p.expected(&[TokenKind::Dot, TokenKind::Colon]))
    }
}

// ============================================================================
// Pattern parsing
// ============================================================================

fn parse_pattern_list(p: &mut Parser) -> Result<Vec<Pattern>> {
    let mut patterns = Vec::new();
    patterns.push(parse_pattern(p)?);
    while p.eat(TokenKind::Comma) {
        patterns.push(parse_pattern(p)?);
    }
    Ok(patterns)
}

fn parse_pattern(p: &mut Parser) -> Result<Pattern> {
    let head = parse_node_pattern(p)?;
    let mut tail = Vec::new();

    while p.at(TokenKind::Dash) {
        let rel = parse_rel_pattern(p)?;
        let node = parse_node_pattern(p)?;
        tail.push((rel, node));
    }

    Ok(Pattern { head, tail })
}

fn parse_node_pattern(p: &mut Parser) -> Result<NodePattern> {
    p.expect(TokenKind::LParen)?;

    let variable = p.expect(TokenKind::Identifier)?.text.clone();

    let type_label = if p.eat(TokenKind::Colon) {
        Some(p.expect(TokenKind::Identifier)?.text.clone())
    } else {
        None
    };

    let name = if p.eat(TokenKind::LBrace) {
        let key = p.expect(TokenKind::Identifier)?;
        if !key.text.eq_ignore_ascii_case("name") {
            return Err(Error::Parse {
                position: key.span.start,
                message: format!(
                    "only the name property may constrain a node pattern, not '{}'",
                    key.text
                ),
            });
        }
        p.expect(TokenKind::Colon)?;
        let value = p.expect(TokenKind::StringLiteral)?.text.clone();
        p.expect(TokenKind::RBrace)?;
        Some(value)
    } else {
        None
    };

    p.expect(TokenKind::RParen)?;

    let node = NodePattern { variable, type_label, name };
    p.declare_node_var(&node)?;
    Ok(node)
}

fn parse_rel_pattern(p: &mut Parser) -> Result<RelPattern> {
    p.expect(TokenKind::Dash)?;

    // `-->`: anonymous single-hop wildcard
    if p.eat(TokenKind::Arrow) {
        return Ok(RelPattern {
            variable: None,
            relations: RelationSet::Any,
            hops: HopSpec::SINGLE,
        });
    }

    p.expect(TokenKind::LBracket)?;

    let variable = if p.at(TokenKind::Identifier) {
        let var = p.advance().text.clone();
        p.declare_rel_var(&var)?;
        Some(var)
    } else {
        None
    };

    let relations = if p.eat(TokenKind::Colon) {
        let mut types = vec![parse_relation_type(p)?];
        while p.eat(TokenKind::Pipe) {
            types.push(parse_relation_type(p)?);
        }
        if types.len() == 1 {
            RelationSet::Single(types[0])
        } else {
            RelationSet::Union(types)
        }
    } else {
        RelationSet::Any
    };

    let hops = if p.eat(TokenKind::Star) {
        parse_hop_spec(p)?
    } else {
        HopSpec::SINGLE
    };

    p.expect(TokenKind::RBracket)?;
    p.expect(TokenKind::Arrow)?;

    Ok(RelPattern { variable, relations, hops })
}

fn parse_relation_type(p: &mut Parser) -> Result<Relation> {
    let tok = p.expect(TokenKind::Identifier)?;
    Relation::from_keyword(&tok.text).ok_or_else(|| Error::Parse {
        position: tok.span.start,
        message: format!(
            "expected a relation type (CHILD, PARENT, JUMP, or SIBLING), found '{}'",
            tok.text
        ),
    })
}

fn parse_hop_spec(p: &mut Parser) -> Result<HopSpec> {
    // The star is already consumed. `*` and `*N..` parse to max = None and
    // are refused by the validator with a dedicated message.
    if p.at(TokenKind::Integer) {
        let min = parse_hop_count(p)?;
        if p.eat(TokenKind::DotDot) {
            let max = if p.at(TokenKind::Integer) {
                Some(parse_hop_count(p)?)
            } else {
                None
            };
            Ok(HopSpec { min, max })
        } else {
            Ok(HopSpec { min, max: Some(min) })
        }
    } else if p.at(TokenKind::DotDot) {
        Err(p.error("hop specifier requires a lower bound before '..'".into()))
    } else {
        Ok(HopSpec { min: 1, max: None })
    }
}

fn parse_hop_count(p: &mut Parser) -> Result<u32> {
    let tok = p.expect(TokenKind::Integer)?;
    tok.text.parse::<u32>().map_err(|_| Error::Parse {
        position: tok.span.start,
        message: format!("hop count '{}' is out of range", tok.text),
    })
}

// ============================================================================
// WHERE expression parsing (precedence climbing: OR < XOR < AND < NOT)
// ============================================================================

fn parse_where_expr(p: &mut Parser) -> Result<WhereExpr> {
    parse_or_expr(p)
}

fn parse_or_expr(p: &mut Parser) -> Result<WhereExpr> {
    let mut left = parse_xor_expr(p)?;
    while p.eat(TokenKind::Or) {
        let right = parse_xor_expr(p)?;
        left = WhereExpr::Or(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_xor_expr(p: &mut Parser) -> Result<WhereExpr> {
    let mut left = parse_and_expr(p)?;
    while p.eat(TokenKind::Xor) {
        let right = parse_and_expr(p)?;
        left = WhereExpr::Xor(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_and_expr(p: &mut Parser) -> Result<WhereExpr> {
    let mut left = parse_not_expr(p)?;
    while p.eat(TokenKind::And) {
        let right = parse_not_expr(p)?;
        left = WhereExpr::And(Box::new(left), Box::new(right));
    }
    Ok(left)
}

fn parse_not_expr(p: &mut Parser) -> Result<WhereExpr> {
    if p.eat(TokenKind::Not) {
        let inner = parse_not_expr(p)?;
        Ok(WhereExpr::Not(Box::new(inner)))
    } else {
        parse_where_primary(p)
    }
}

fn parse_where_primary(p: &mut Parser) -> Result<WhereExpr> {
    if p.eat(TokenKind::LParen) {
        let expr = parse_where_expr(p)?;
        p.expect(TokenKind::RParen)?;
        return Ok(expr);
    }
    Ok(WhereExpr::Atom(parse_where_atom(p)?))
}

fn parse_where_atom(p: &mut Parser) -> Result<WhereAtom> {
    let variable = p.expect(TokenKind::Identifier)?.text.clone();
    p.expect(TokenKind::Dot)?;
    let prop_tok = p.expect(TokenKind::Identifier)?;
    let property = prop_tok.text.clone();
    let prop_pos = prop_tok.span.start;

    let name_only = |op: NameOp, property: &str| -> Result<()> {
        if property != "name" {
            return Err(Error::Parse {
                position: prop_pos,
                message: format!(
                    "the {op} operator applies only to the name property, not '{property}'"
                ),
            });
        }
        Ok(())
    };

    match p.peek_kind() {
        TokenKind::Eq => {
            p.advance();
            name_only(NameOp::Eq, &property)?;
            let value = p.expect(TokenKind::StringLiteral)?.text.clone();
            Ok(WhereAtom::NameCompare { variable, op: NameOp::Eq, value })
        }
        TokenKind::Similar => {
            p.advance();
            name_only(NameOp::Similar, &property)?;
            let value = p.expect(TokenKind::StringLiteral)?.text.clone();
            Ok(WhereAtom::NameCompare { variable, op: NameOp::Similar, value })
        }
        TokenKind::Contains => {
            p.advance();
            name_only(NameOp::Contains, &property)?;
            let value = p.expect(TokenKind::StringLiteral)?.text.clone();
            Ok(WhereAtom::NameCompare { variable, op: NameOp::Contains, value })
        }
        TokenKind::Starts => {
            p.advance();
            p.expect(TokenKind::With)?;
            name_only(NameOp::StartsWith, &property)?;
            let value = p.expect(TokenKind::StringLiteral)?.text.clone();
            Ok(WhereAtom::NameCompare { variable, op: NameOp::StartsWith, value })
        }
        TokenKind::Ends => {
            p.advance();
            p.expect(TokenKind::With)?;
            name_only(NameOp::EndsWith, &property)?;
            let value = p.expect(TokenKind::StringLiteral)?.text.clone();
            Ok(WhereAtom::NameCompare { variable, op: NameOp::EndsWith, value })
        }
        TokenKind::Is => {
            p.advance();
            let negated = p.eat(TokenKind::Not);
            p.expect(TokenKind::Null)?;
            if negated {
                Ok(WhereAtom::IsNotNull { variable, property })
            } else {
                Ok(WhereAtom::IsNull { variable, property })
            }
        }
        _ => Err(p.expected(&[
            TokenKind::Eq,
            TokenKind::Similar,
            TokenKind::Contains,
            TokenKind::Starts,
            TokenKind::Ends,
            TokenKind::Is,
        ])),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn simple_match_return() {
        let q = parse("MATCH (n {name: \"Test\"}) RETURN n").unwrap();
        match q {
            Query::Read { read, returns } => {
                assert_eq!(read.patterns.len(), 1);
                assert_eq!(read.patterns[0].head.name.as_deref(), Some("Test"));
                assert_eq!(returns.len(), 1);
                assert_eq!(returns[0].variable, "n");
            }
            other => panic!("expected Read, got {other:?}"),
        }
    }

    #[test]
    fn match_with_where_and_field_return() {
        let q = parse("MATCH (n) WHERE n.name CONTAINS \"mcp\" RETURN n.id").unwrap();
        match q {
            Query::Read { read, returns } => {
                assert!(matches!(
                    read.where_clause,
                    Some(WhereExpr::Atom(WhereAtom::NameCompare { op: NameOp::Contains, .. }))
                ));
                assert_eq!(returns[0].field, Some(ReturnField::Id));
            }
            other => panic!("expected Read, got {other:?}"),
        }
    }

    #[test]
    fn relationship_chain() {
        let q = parse("MATCH (a {name: \"A\"})-[:CHILD]->(b)-[:JUMP]->(c) RETURN c").unwrap();
        let read = q.read_part().unwrap();
        assert_eq!(read.patterns[0].tail.len(), 2);
        let (rel, node) = &read.patterns[0].tail[0];
        assert_eq!(rel.relations, RelationSet::Single(Relation::Child));
        assert_eq!(node.variable, "b");
    }

    #[test]
    fn hop_ranges() {
        let q = parse("MATCH (a {name: \"A\"})-[:CHILD*2..4]->(b) RETURN b").unwrap();
        let read = q.read_part().unwrap();
        assert_eq!(read.patterns[0].tail[0].0.hops, HopSpec { min: 2, max: Some(4) });

        let q = parse("MATCH (a {name: \"A\"})-[:CHILD*3]->(b) RETURN b").unwrap();
        let read = q.read_part().unwrap();
        assert_eq!(read.patterns[0].tail[0].0.hops, HopSpec { min: 3, max: Some(3) });
    }

    #[test]
    fn unbounded_hops_parse_but_carry_no_upper_bound() {
        let q = parse("MATCH (a {name: \"A\"})-[:CHILD*2..]->(b) RETURN b").unwrap();
        let read = q.read_part().unwrap();
        assert_eq!(read.patterns[0].tail[0].0.hops, HopSpec { min: 2, max: None });
    }

    #[test]
    fn union_and_anonymous_relations() {
        let q = parse("MATCH (a {name: \"A\"})-[:CHILD|JUMP]->(b), (a)-->(c) RETURN b, c").unwrap();
        let read = q.read_part().unwrap();
        assert_eq!(
            read.patterns[0].tail[0].0.relations,
            RelationSet::Union(vec![Relation::Child, Relation::Jump])
        );
        assert_eq!(read.patterns[1].tail[0].0.relations, RelationSet::Any);
    }

    #[test]
    fn create_standalone() {
        let q = parse("CREATE (n {name: \"X\"})").unwrap();
        assert!(matches!(q, Query::WriteStandalone { .. }));
    }

    #[test]
    fn match_create() {
        let q = parse(
            "MATCH (n {name: \"A\"}), (m {name: \"B\"}) CREATE (n)-[:JUMP]->(m)",
        )
        .unwrap();
        assert!(matches!(q, Query::ReadWrite { .. }));
    }

    #[test]
    fn merge_with_on_clauses() {
        let q = parse(
            "MERGE (p {name: \"Weekly\"}) ON CREATE SET p.label = \"new\" ON MATCH SET p.label = \"old\" RETURN p.id",
        )
        .unwrap();
        match q {
            Query::Upsert { merge, returns } => {
                assert_eq!(merge.on_create.len(), 1);
                assert_eq!(merge.on_match.len(), 1);
                assert_eq!(returns[0].field, Some(ReturnField::Id));
            }
            other => panic!("expected Upsert, got {other:?}"),
        }
    }

    #[test]
    fn match_set() {
        let q = parse("MATCH (n {name: \"A\"}) SET n.label = \"x\", n:Project").unwrap();
        match q {
            Query::Read { read, .. } => {
                assert_eq!(read.set_items.len(), 2);
                assert!(matches!(read.set_items[1], SetItem::TypeLabel { .. }));
            }
            other => panic!("expected Read, got {other:?}"),
        }
    }

    #[test]
    fn set_null_clears() {
        let q = parse("MATCH (n {name: \"A\"}) SET n.label = NULL").unwrap();
        match q {
            Query::Read { read, .. } => {
                assert_eq!(
                    read.set_items[0],
                    SetItem::Property {
                        variable: "n".into(),
                        property: "label".into(),
                        value: None
                    }
                );
            }
            other => panic!("expected Read, got {other:?}"),
        }
    }

    #[test]
    fn delete_requires_match() {
        let err = parse("DELETE n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn detach_delete() {
        let q = parse("MATCH (n {name: \"Old\"}) DETACH DELETE n").unwrap();
        match q {
            Query::ReadDelete { delete, .. } => {
                assert!(delete.detach);
                assert_eq!(delete.variables, vec!["n"]);
            }
            other => panic!("expected ReadDelete, got {other:?}"),
        }
    }

    #[test]
    fn set_and_delete_cannot_coexist() {
        let err = parse("MATCH (n {name: \"A\"}) SET n.label = \"x\" DELETE n").unwrap_err();
        assert!(matches!(err, Error::Semantic(_)), "got {err:?}");
    }

    #[test]
    fn variable_redefinition_is_a_parse_error() {
        let err = parse("MATCH (n {name: \"A\"}), (n {name: \"B\"}) RETURN n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn bare_reoccurrence_references_the_binding() {
        let q = parse("MATCH (a {name: \"A\"})-[:CHILD]->(b), (b)-[:JUMP]->(c) RETURN c");
        assert!(q.is_ok(), "got {q:?}");
    }

    #[test]
    fn where_precedence() {
        let q = parse(
            "MATCH (n) WHERE n.name = \"a\" OR n.name = \"b\" AND NOT n.name = \"c\" RETURN n",
        )
        .unwrap();
        let read = q.read_part().unwrap();
        // OR binds loosest: Or(=a, And(=b, Not(=c)))
        match read.where_clause.as_ref().unwrap() {
            WhereExpr::Or(_, right) => {
                assert!(matches!(**right, WhereExpr::And(_, _)));
            }
            other => panic!("expected OR at the root, got {other:?}"),
        }
    }

    #[test]
    fn is_null_atoms() {
        let q = parse("MATCH (n {name: \"A\"}) WHERE n.label IS NOT NULL RETURN n").unwrap();
        let read = q.read_part().unwrap();
        assert!(matches!(
            read.where_clause,
            Some(WhereExpr::Atom(WhereAtom::IsNotNull { .. }))
        ));
    }

    #[test]
    fn comparisons_restricted_to_name() {
        let err = parse("MATCH (n) WHERE n.label = \"x\" RETURN n").unwrap_err();
        assert!(matches!(err, Error::Parse { .. }), "got {err:?}");
    }

    #[test]
    fn unsupported_keyword_hint() {
        let err = parse("MATCH (n {name: \"A\"}) RETURN n UNION MATCH (m) RETURN m").unwrap_err();
        match err {
            Error::Parse { message, .. } => assert!(message.contains("UNION"), "{message}"),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn canonical_render_round_trips() {
        let queries = [
            "MATCH (n {name: \"Projects\"})-[:CHILD]->(m) RETURN m.name",
            "MATCH (root {name: \"Company\"})-[r:CHILD*1..3]->(d) WHERE d.name CONTAINS \"Budget\" RETURN d.name",
            "MATCH (n) WHERE n.name = \"a\" OR (n.name = \"b\" XOR NOT n.name = \"c\") RETURN n",
            "CREATE (n:Project {name: \"X\"})",
            "MATCH (a {name: \"A\"}), (b {name: \"B\"}) CREATE (a)-[:JUMP]->(b)",
            "MERGE (p {name: \"Weekly\"}) ON CREATE SET p.label = \"new\" ON MATCH SET p.label = \"old\" RETURN p.id",
            "MATCH (n {name: \"Old\"}) DETACH DELETE n",
            "MATCH (a {name: \"A\"})-->(b) RETURN b",
            "MATCH (n {name: \"q\\\"uote\"}) RETURN n",
        ];
        for q in queries {
            let ast = parse(q).unwrap();
            let rendered = ast.to_string();
            let reparsed = parse(&rendered)
                .unwrap_or_else(|e| panic!("rendered form failed to parse: {rendered}: {e}"));
            assert_eq!(ast, reparsed, "round-trip mismatch for {q} -> {rendered}");
        }
    }
}
