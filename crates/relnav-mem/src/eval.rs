//! Parser and evaluator for the loader's SQL subset.
//!
//! Supported statements are exactly what `relnav-loader` emits: single-table
//! or single-join selects, parent restrictions as predicates or inline views
//! (`values` and `union all` styles), `row_number() over()` in both wrapper
//! shapes, `count(*)`, `distinct`, and a native limit (stripped before
//! parsing). Anything else is a parse error, which the session surfaces the
//! way a real driver would: as a statement failure.

use std::collections::{HashMap, HashSet};

use relnav_core::Value;

use crate::MemTable;
use crate::lexer::{Token, tokenize};

#[derive(Debug)]
pub(crate) struct SelectStmt {
    pub distinct: bool,
    items: Vec<SelectItem>,
    from: Option<FromClause>,
    where_pred: Option<Pred>,
}

#[derive(Debug)]
enum SelectItem {
    Column {
        qualifier: Option<String>,
        name: String,
        alias: Option<String>,
    },
    RowNumber {
        alias: Option<String>,
    },
    CountStar {
        alias: Option<String>,
    },
    Literal {
        value: Value,
        alias: Option<String>,
    },
}

#[derive(Debug)]
enum FromSource {
    Table {
        name: String,
        alias: String,
    },
    Values {
        rows: Vec<Vec<Value>>,
        columns: Vec<String>,
        alias: String,
    },
    /// One or more `union all` branches under one alias.
    Subquery {
        branches: Vec<SelectStmt>,
        alias: String,
    },
}

#[derive(Debug)]
struct FromClause {
    base: FromSource,
    join: Option<(FromSource, Pred)>,
}

#[derive(Debug, Clone)]
enum Pred {
    And(Vec<Pred>),
    Or(Vec<Pred>),
    Cmp { left: Expr, op: CmpOp, right: Expr },
    IsNull(Expr),
}

#[derive(Debug, Clone)]
enum Expr {
    Column {
        qualifier: Option<String>,
        name: String,
    },
    Literal(Value),
    RowNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Which optional constructs a statement used, for capability enforcement.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct FeatureUse {
    pub inline_view: bool,
    pub row_number: bool,
}

impl SelectStmt {
    /// Report every optional construct used anywhere in the statement.
    pub(crate) fn features(&self, out: &mut FeatureUse) {
        for item in &self.items {
            if matches!(item, SelectItem::RowNumber { .. }) {
                out.row_number = true;
            }
        }
        if let Some(from) = &self.from {
            for source in
                std::iter::once(&from.base).chain(from.join.iter().map(|(source, _)| source))
            {
                match source {
                    FromSource::Values { .. } => out.inline_view = true,
                    FromSource::Subquery { branches, .. } => {
                        // A union-all view counts as an inline view; a plain
                        // single-branch wrapper does not.
                        if branches.len() > 1 {
                            out.inline_view = true;
                        }
                        for branch in branches {
                            branch.features(out);
                        }
                    }
                    FromSource::Table { .. } => {}
                }
            }
            if let Some((_, pred)) = &from.join {
                pred_features(pred, out);
            }
        }
        if let Some(pred) = &self.where_pred {
            pred_features(pred, out);
        }
    }
}

fn pred_features(pred: &Pred, out: &mut FeatureUse) {
    match pred {
        Pred::And(parts) | Pred::Or(parts) => {
            for part in parts {
                pred_features(part, out);
            }
        }
        Pred::Cmp { left, right, .. } => {
            if matches!(left, Expr::RowNumber) || matches!(right, Expr::RowNumber) {
                out.row_number = true;
            }
        }
        Pred::IsNull(_) => {}
    }
}

/// Parse a statement (with any native limit already stripped).
pub(crate) fn parse(sql: &str) -> Result<SelectStmt, String> {
    let tokens = tokenize(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let stmt = parser.parse_select()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!(
            "trailing tokens after statement: {:?}",
            &parser.tokens[parser.pos..]
        ));
    }
    Ok(stmt)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_keyword(keyword)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), String> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(format!("expected {keyword:?}, found {:?}", self.peek()))
        }
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Some(Token::Sym(s)) if s == sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_sym(&mut self, sym: &str) -> Result<(), String> {
        if self.eat_sym(sym) {
            Ok(())
        } else {
            Err(format!("expected {sym:?}, found {:?}", self.peek()))
        }
    }

    fn parse_select(&mut self) -> Result<SelectStmt, String> {
        self.expect_keyword("select")?;
        let distinct = self.eat_keyword("distinct");

        let mut items = vec![self.parse_item()?];
        while self.eat_sym(",") {
            items.push(self.parse_item()?);
        }

        let from = if self.eat_keyword("from") {
            let base = self.parse_source()?;
            let join = if self.eat_keyword("join") {
                let source = self.parse_source()?;
                self.expect_keyword("on")?;
                let pred = self.parse_pred()?;
                Some((source, pred))
            } else {
                None
            };
            Some(FromClause { base, join })
        } else {
            None
        };

        let where_pred = if self.eat_keyword("where") {
            Some(self.parse_pred()?)
        } else {
            None
        };

        Ok(SelectStmt {
            distinct,
            items,
            from,
            where_pred,
        })
    }

    fn parse_item(&mut self) -> Result<SelectItem, String> {
        if self.peek().is_some_and(|t| t.is_keyword("count")) {
            self.pos += 1;
            self.expect_sym("(")?;
            self.expect_sym("*")?;
            self.expect_sym(")")?;
            return Ok(SelectItem::CountStar {
                alias: self.maybe_alias(),
            });
        }
        let expr = self.parse_expr()?;
        let alias = self.maybe_alias();
        Ok(match expr {
            Expr::Column { qualifier, name } => SelectItem::Column {
                qualifier,
                name,
                alias,
            },
            Expr::RowNumber => SelectItem::RowNumber { alias },
            Expr::Literal(value) => SelectItem::Literal { value, alias },
        })
    }

    fn maybe_alias(&mut self) -> Option<String> {
        if let Some(Token::Quoted(name)) = self.peek() {
            let name = name.clone();
            self.pos += 1;
            Some(name)
        } else {
            None
        }
    }

    fn parse_source(&mut self) -> Result<FromSource, String> {
        if self.eat_sym("(") {
            if self.eat_keyword("values") {
                let mut rows = vec![self.parse_tuple()?];
                while self.eat_sym(",") {
                    rows.push(self.parse_tuple()?);
                }
                self.expect_sym(")")?;
                let alias = self.parse_alias()?;
                self.expect_sym("(")?;
                let mut columns = vec![self.parse_quoted()?];
                while self.eat_sym(",") {
                    columns.push(self.parse_quoted()?);
                }
                self.expect_sym(")")?;
                return Ok(FromSource::Values {
                    rows,
                    columns,
                    alias,
                });
            }
            let mut branches = vec![self.parse_select()?];
            while self.eat_keyword("union") {
                self.expect_keyword("all")?;
                branches.push(self.parse_select()?);
            }
            self.expect_sym(")")?;
            let alias = self.parse_alias()?;
            return Ok(FromSource::Subquery { branches, alias });
        }
        let name = self.parse_quoted()?;
        let alias = self.parse_alias()?;
        Ok(FromSource::Table { name, alias })
    }

    fn parse_tuple(&mut self) -> Result<Vec<Value>, String> {
        self.expect_sym("(")?;
        let mut values = vec![self.parse_literal()?];
        while self.eat_sym(",") {
            values.push(self.parse_literal()?);
        }
        self.expect_sym(")")?;
        Ok(values)
    }

    fn parse_literal(&mut self) -> Result<Value, String> {
        match self.bump() {
            Some(Token::Int(i)) => Ok(Value::Int(i)),
            Some(Token::Float(f)) => Ok(Value::Double(f)),
            Some(Token::Str(s)) => Ok(Value::Text(s)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("null") => Ok(Value::Null),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            other => Err(format!("expected literal, found {other:?}")),
        }
    }

    fn parse_quoted(&mut self) -> Result<String, String> {
        match self.bump() {
            Some(Token::Quoted(name)) => Ok(name),
            other => Err(format!("expected quoted identifier, found {other:?}")),
        }
    }

    fn parse_alias(&mut self) -> Result<String, String> {
        match self.bump() {
            Some(Token::Word(name)) => Ok(name),
            other => Err(format!("expected alias, found {other:?}")),
        }
    }

    fn parse_pred(&mut self) -> Result<Pred, String> {
        let mut parts = vec![self.parse_and()?];
        while self.eat_keyword("or") {
            parts.push(self.parse_and()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Pred::Or(parts)
        })
    }

    fn parse_and(&mut self) -> Result<Pred, String> {
        let mut parts = vec![self.parse_unit()?];
        while self.eat_keyword("and") {
            parts.push(self.parse_unit()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Pred::And(parts)
        })
    }

    fn parse_unit(&mut self) -> Result<Pred, String> {
        // Expressions in this grammar never start with a parenthesis, so an
        // opening one always begins a nested predicate.
        if self.eat_sym("(") {
            let pred = self.parse_pred()?;
            self.expect_sym(")")?;
            return Ok(pred);
        }
        let left = self.parse_expr()?;
        if self.eat_keyword("is") {
            self.expect_keyword("null")?;
            return Ok(Pred::IsNull(left));
        }
        let op = match self.bump() {
            Some(Token::Sym(s)) => match s.as_str() {
                "=" => CmpOp::Eq,
                "<>" => CmpOp::Ne,
                "<" => CmpOp::Lt,
                "<=" => CmpOp::Le,
                ">" => CmpOp::Gt,
                ">=" => CmpOp::Ge,
                other => return Err(format!("unknown operator {other:?}")),
            },
            other => return Err(format!("expected operator, found {other:?}")),
        };
        let right = self.parse_expr()?;
        Ok(Pred::Cmp { left, op, right })
    }

    fn parse_expr(&mut self) -> Result<Expr, String> {
        match self.bump() {
            Some(Token::Quoted(name)) => Ok(Expr::Column {
                qualifier: None,
                name,
            }),
            Some(Token::Word(word)) => {
                if word.eq_ignore_ascii_case("row_number") {
                    self.expect_sym("(")?;
                    self.expect_sym(")")?;
                    self.expect_keyword("over")?;
                    self.expect_sym("(")?;
                    self.expect_sym(")")?;
                    Ok(Expr::RowNumber)
                } else if word.eq_ignore_ascii_case("null") {
                    Ok(Expr::Literal(Value::Null))
                } else if word.eq_ignore_ascii_case("true") {
                    Ok(Expr::Literal(Value::Bool(true)))
                } else if word.eq_ignore_ascii_case("false") {
                    Ok(Expr::Literal(Value::Bool(false)))
                } else if self.eat_sym(".") {
                    let name = self.parse_quoted()?;
                    Ok(Expr::Column {
                        qualifier: Some(word),
                        name,
                    })
                } else {
                    Err(format!("bare word {word:?} is not an expression"))
                }
            }
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Double(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Text(s))),
            other => Err(format!("expected expression, found {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// A fully materialized result.
#[derive(Debug)]
pub(crate) struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Rows of one FROM source, addressable by index so huge generated tables
/// never materialize wholesale.
struct SourceData<'a> {
    alias: String,
    columns: Vec<String>,
    rows: SourceRows<'a>,
}

enum SourceRows<'a> {
    Table(&'a MemTable),
    Owned(Vec<Vec<Value>>),
}

impl SourceRows<'_> {
    fn len(&self) -> usize {
        match self {
            SourceRows::Table(table) => table.len(),
            SourceRows::Owned(rows) => rows.len(),
        }
    }

    fn get(&self, index: usize) -> Vec<Value> {
        match self {
            SourceRows::Table(table) => table.row(index),
            SourceRows::Owned(rows) => rows[index].clone(),
        }
    }
}

/// Evaluate a parsed statement.
///
/// `limit` is the stripped native limit, if any; `hint` is the session's
/// advisory row cap. Both bound the materialized output.
pub(crate) fn eval(
    stmt: &SelectStmt,
    limit: Option<usize>,
    hint: Option<usize>,
    tables: &HashMap<String, MemTable>,
) -> Result<ResultSet, String> {
    let columns = output_columns(stmt);

    // count(*) aggregates; the loader only ever emits it alone.
    let counting = stmt
        .items
        .iter()
        .any(|item| matches!(item, SelectItem::CountStar { .. }));

    let (where_pred, rn_cap) = split_row_number_cap(stmt.where_pred.as_ref());
    let output_cap = match (limit, hint, counting) {
        (_, _, true) => usize::MAX,
        (l, h, false) => l.unwrap_or(usize::MAX).min(h.unwrap_or(usize::MAX)),
    };

    let mut state = EmitState {
        stmt,
        rn_cap,
        counting,
        output_cap,
        rows: Vec::new(),
        distinct_seen: HashSet::new(),
        matched: 0,
        count: 0,
    };

    match &stmt.from {
        None => {
            // Literal-only select, one row.
            let env = Env { sources: Vec::new() };
            emit(&mut state, &env)?;
        }
        Some(from) => {
            let base = load_source(&from.base, tables)?;
            let join = from
                .join
                .as_ref()
                .map(|(source, pred)| Ok::<_, String>((load_source(source, tables)?, pred)))
                .transpose()?;

            'outer: for i in 0..base.rows.len() {
                let base_row = base.rows.get(i);
                match &join {
                    None => {
                        let env = Env {
                            sources: vec![(
                                base.alias.as_str(),
                                base.columns.as_slice(),
                                base_row.as_slice(),
                            )],
                        };
                        if eval_pred_opt(where_pred.as_ref(), &env)? && !emit(&mut state, &env)? {
                            break 'outer;
                        }
                    }
                    Some((other, on)) => {
                        for j in 0..other.rows.len() {
                            let other_row = other.rows.get(j);
                            let env = Env {
                                sources: vec![
                                    (
                                        base.alias.as_str(),
                                        base.columns.as_slice(),
                                        base_row.as_slice(),
                                    ),
                                    (
                                        other.alias.as_str(),
                                        other.columns.as_slice(),
                                        other_row.as_slice(),
                                    ),
                                ],
                            };
                            if eval_pred(on, &env)?
                                && eval_pred_opt(where_pred.as_ref(), &env)?
                                && !emit(&mut state, &env)?
                            {
                                break 'outer;
                            }
                        }
                    }
                }
            }
        }
    }

    if counting {
        return Ok(ResultSet {
            columns,
            rows: vec![vec![Value::Int(state.count as i64)]],
        });
    }
    Ok(ResultSet {
        columns,
        rows: state.rows,
    })
}

/// Per-statement output accumulation.
struct EmitState<'a> {
    stmt: &'a SelectStmt,
    rn_cap: Option<usize>,
    counting: bool,
    output_cap: usize,
    rows: Vec<Vec<Value>>,
    distinct_seen: HashSet<String>,
    matched: usize,
    count: usize,
}

/// Process one row that passed the predicates. Returns whether the scan
/// should continue.
fn emit(state: &mut EmitState<'_>, env: &Env<'_>) -> Result<bool, String> {
    state.matched += 1;
    if let Some(cap) = state.rn_cap {
        if state.matched > cap {
            return Ok(false);
        }
    }
    if state.counting {
        state.count += 1;
        return Ok(true);
    }
    let mut out = Vec::with_capacity(state.stmt.items.len());
    for item in &state.stmt.items {
        let value = match item {
            SelectItem::Column {
                qualifier, name, ..
            } => env.resolve(qualifier.as_deref(), name)?,
            SelectItem::RowNumber { .. } => Value::Int(state.matched as i64),
            SelectItem::Literal { value, .. } => value.clone(),
            SelectItem::CountStar { .. } => {
                return Err("count(*) cannot mix with columns".to_string());
            }
        };
        out.push(value);
    }
    if state.stmt.distinct {
        let fingerprint = format!("{out:?}");
        if !state.distinct_seen.insert(fingerprint) {
            return Ok(true);
        }
    }
    state.rows.push(out);
    Ok(state.rows.len() < state.output_cap)
}

fn output_columns(stmt: &SelectStmt) -> Vec<String> {
    stmt.items
        .iter()
        .map(|item| match item {
            SelectItem::Column { name, alias, .. } => {
                alias.clone().unwrap_or_else(|| name.clone())
            }
            SelectItem::RowNumber { alias } => {
                alias.clone().unwrap_or_else(|| "rn".to_string())
            }
            SelectItem::CountStar { alias } => alias.clone().unwrap_or_else(|| "c".to_string()),
            SelectItem::Literal { alias, .. } => {
                alias.clone().unwrap_or_else(|| "?column?".to_string())
            }
        })
        .collect()
}

/// Pull `row_number() over() <= n` conjuncts out of the top-level WHERE.
///
/// The loader only ever places the cap as a lone predicate or as a top-level
/// conjunct; a window comparison anywhere deeper is evaluated as-is and
/// fails, as it would on a real backend that cannot window in WHERE.
fn split_row_number_cap(pred: Option<&Pred>) -> (Option<Pred>, Option<usize>) {
    fn as_cap(pred: &Pred) -> Option<usize> {
        if let Pred::Cmp {
            left: Expr::RowNumber,
            op,
            right: Expr::Literal(Value::Int(n)),
        } = pred
        {
            let cap = match op {
                CmpOp::Le => *n,
                CmpOp::Lt => n - 1,
                _ => return None,
            };
            return Some(usize::try_from(cap).unwrap_or(0));
        }
        None
    }

    let Some(pred) = pred else {
        return (None, None);
    };
    if let Some(cap) = as_cap(pred) {
        return (None, Some(cap));
    }
    if let Pred::And(parts) = pred {
        let mut cap = None;
        let mut rest: Vec<Pred> = Vec::with_capacity(parts.len());
        for part in parts {
            match as_cap(part) {
                Some(n) => cap = Some(cap.map_or(n, |c: usize| c.min(n))),
                None => rest.push(part.clone()),
            }
        }
        let remaining = match rest.len() {
            0 => None,
            1 => Some(rest.remove(0)),
            _ => Some(Pred::And(rest)),
        };
        return (remaining, cap);
    }
    (Some(pred.clone()), None)
}

fn load_source<'a>(
    source: &'a FromSource,
    tables: &'a HashMap<String, MemTable>,
) -> Result<SourceData<'a>, String> {
    match source {
        FromSource::Table { name, alias } => {
            let table = tables
                .get(name)
                .ok_or_else(|| format!("unknown table {name:?}"))?;
            Ok(SourceData {
                alias: alias.clone(),
                columns: table.columns().to_vec(),
                rows: SourceRows::Table(table),
            })
        }
        FromSource::Values {
            rows,
            columns,
            alias,
        } => Ok(SourceData {
            alias: alias.clone(),
            columns: columns.clone(),
            rows: SourceRows::Owned(rows.clone()),
        }),
        FromSource::Subquery { branches, alias } => {
            let mut columns: Vec<String> = Vec::new();
            let mut rows: Vec<Vec<Value>> = Vec::new();
            for (i, branch) in branches.iter().enumerate() {
                let result = eval(branch, None, None, tables)?;
                if i == 0 {
                    columns = result.columns;
                }
                rows.extend(result.rows);
            }
            Ok(SourceData {
                alias: alias.clone(),
                columns,
                rows: SourceRows::Owned(rows),
            })
        }
    }
}

struct Env<'a> {
    sources: Vec<(&'a str, &'a [String], &'a [Value])>,
}

impl Env<'_> {
    fn resolve(&self, qualifier: Option<&str>, name: &str) -> Result<Value, String> {
        for (alias, columns, values) in &self.sources {
            if let Some(qualifier) = qualifier {
                if qualifier != *alias {
                    continue;
                }
            }
            if let Some(index) = columns.iter().position(|c| c == name) {
                return Ok(values[index].clone());
            }
            if qualifier.is_some() {
                break;
            }
        }
        Err(format!(
            "unknown column {}{name:?}",
            qualifier.map(|q| format!("{q}.")).unwrap_or_default()
        ))
    }
}

fn eval_pred_opt(pred: Option<&Pred>, env: &Env<'_>) -> Result<bool, String> {
    match pred {
        None => Ok(true),
        Some(pred) => eval_pred(pred, env),
    }
}

fn eval_pred(pred: &Pred, env: &Env<'_>) -> Result<bool, String> {
    match pred {
        Pred::And(parts) => {
            for part in parts {
                if !eval_pred(part, env)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Pred::Or(parts) => {
            for part in parts {
                if eval_pred(part, env)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Pred::IsNull(expr) => Ok(eval_expr(expr, env)?.is_null()),
        Pred::Cmp { left, op, right } => {
            if matches!(left, Expr::RowNumber) || matches!(right, Expr::RowNumber) {
                return Err("window function in a nested predicate".to_string());
            }
            let left = eval_expr(left, env)?;
            let right = eval_expr(right, env)?;
            Ok(match compare(&left, &right) {
                None => false,
                Some(ordering) => match op {
                    CmpOp::Eq => ordering.is_eq(),
                    CmpOp::Ne => ordering.is_ne(),
                    CmpOp::Lt => ordering.is_lt(),
                    CmpOp::Le => ordering.is_le(),
                    CmpOp::Gt => ordering.is_gt(),
                    CmpOp::Ge => ordering.is_ge(),
                },
            })
        }
    }
}

fn eval_expr(expr: &Expr, env: &Env<'_>) -> Result<Value, String> {
    match expr {
        Expr::Column { qualifier, name } => env.resolve(qualifier.as_deref(), name),
        Expr::Literal(value) => Ok(value.clone()),
        Expr::RowNumber => Err("window function outside its cap position".to_string()),
    }
}

/// SQL comparison: NULL compares with nothing, numerics cross-compare.
fn compare(left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Double(b)) => (*a as f64).partial_cmp(b),
        (Value::Double(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemTable;

    fn store() -> HashMap<String, MemTable> {
        let mut customer = MemTable::new("CUSTOMER", &["id", "name"]);
        customer.push_row(vec![Value::Int(1), Value::Text("ada".to_string())]);
        customer.push_row(vec![Value::Int(2), Value::Text("bob".to_string())]);

        let mut orders = MemTable::new("ORDERS", &["id", "customer_id"]);
        orders.push_row(vec![Value::Int(100), Value::Int(1)]);
        orders.push_row(vec![Value::Int(101), Value::Int(1)]);
        orders.push_row(vec![Value::Int(200), Value::Int(2)]);

        let mut tables = HashMap::new();
        tables.insert("CUSTOMER".to_string(), customer);
        tables.insert("ORDERS".to_string(), orders);
        tables
    }

    fn run(sql: &str, limit: Option<usize>) -> ResultSet {
        let stmt = parse(sql).unwrap();
        eval(&stmt, limit, None, &store()).unwrap()
    }

    #[test]
    fn test_plain_select() {
        let result = run("Select A.\"id\", A.\"name\" From \"CUSTOMER\" A", None);
        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_join_with_predicate() {
        let result = run(
            "Select A.\"id\" From \"CUSTOMER\" B join \"ORDERS\" A \
             on A.\"customer_id\"=B.\"id\" Where ((B.\"id\"=1))",
            None,
        );
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_values_inline_view() {
        let result = run(
            "Select A.\"id\" From (values (1), (2)) B(\"id\") join \"ORDERS\" A \
             on A.\"customer_id\"=B.\"id\"",
            None,
        );
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn test_union_all_inline_view() {
        let result = run(
            "Select A.\"id\" From (Select 1 \"id\" Union all Select 2) B join \"ORDERS\" A \
             on A.\"customer_id\"=B.\"id\"",
            None,
        );
        assert_eq!(result.rows.len(), 3);
    }

    #[test]
    fn test_row_number_wrapper() {
        let result = run(
            "Select \"id\" From (Select A.\"id\", row_number() over() \"rn\" \
             From \"ORDERS\" A) RNQ Where \"rn\" <= 2",
            None,
        );
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_row_number_in_where() {
        let result = run(
            "Select A.\"id\" From \"ORDERS\" A Where row_number() over() <= 2",
            None,
        );
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_count_star() {
        let result = run("Select count(*) \"c\" From \"ORDERS\" A", None);
        assert_eq!(result.rows, vec![vec![Value::Int(3)]]);
    }

    #[test]
    fn test_distinct_and_limit() {
        let result = run(
            "Select distinct A.\"customer_id\" From \"ORDERS\" A",
            None,
        );
        assert_eq!(result.rows.len(), 2);

        let result = run("Select A.\"id\" From \"ORDERS\" A", Some(2));
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn test_null_semantics() {
        let mut tables = store();
        tables
            .get_mut("CUSTOMER")
            .unwrap()
            .push_row(vec![Value::Int(3), Value::Null]);
        let stmt = parse("Select A.\"id\" From \"CUSTOMER\" A Where A.\"name\" is null").unwrap();
        let result = eval(&stmt, None, None, &tables).unwrap();
        assert_eq!(result.rows, vec![vec![Value::Int(3)]]);

        // Equality never matches NULL.
        let stmt = parse("Select A.\"id\" From \"CUSTOMER\" A Where A.\"name\"='ada'").unwrap();
        let result = eval(&stmt, None, None, &tables).unwrap();
        assert_eq!(result.rows.len(), 1);
    }

    #[test]
    fn test_unknown_table_and_column_fail() {
        assert!(eval(
            &parse("Select A.\"id\" From \"NOPE\" A").unwrap(),
            None,
            None,
            &store()
        )
        .is_err());
        assert!(eval(
            &parse("Select A.\"nope\" From \"ORDERS\" A").unwrap(),
            None,
            None,
            &store()
        )
        .is_err());
    }

    #[test]
    fn test_feature_detection() {
        let mut features = FeatureUse::default();
        parse("Select A.\"id\" From (values (1)) B(\"id\") join \"ORDERS\" A on A.\"customer_id\"=B.\"id\"")
            .unwrap()
            .features(&mut features);
        assert!(features.inline_view);
        assert!(!features.row_number);

        let mut features = FeatureUse::default();
        parse("Select A.\"id\" From \"ORDERS\" A Where row_number() over() <= 2")
            .unwrap()
            .features(&mut features);
        assert!(features.row_number);
    }
}
