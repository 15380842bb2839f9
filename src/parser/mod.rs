//! # Parser
//!
//! Recursive-descent parser over the lexer's token stream, per `spec.md`
//! §4.2. Each production consumes exactly the tokens it needs and reports
//! `expected X, got Y at L:C` on mismatch.

use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};
use crate::value::Value;

/// Parses a complete rule-file text into a [`Program`].
pub fn parse_program(text: &str) -> Result<Program, ParseError> {
    let tokens = crate::lexer::tokenize(text).map_err(|e| ParseError {
        line: e.line,
        col: e.col,
        message: e.message,
    })?;
    Parser::new(tokens).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }

    fn err(&self, expected: &str) -> ParseError {
        let tok = self.peek();
        ParseError {
            line: tok.line,
            col: tok.col,
            message: format!("expected {expected}, got {:?}", tok.kind),
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<Token, ParseError> {
        if self.peek_kind() == kind {
            Ok(self.advance())
        } else {
            Err(self.err(expected))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Identifier(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.err("identifier")),
        }
    }

    fn expect_variable(&mut self) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Variable(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.err("variable")),
        }
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.err("string literal")),
        }
    }

    // program ::= (rule | suggestion_rule)*
    fn parse_program(&mut self) -> Result<Program, ParseError> {
        let mut program = Program::new();
        while self.peek_kind() != &TokenKind::Eof {
            if self.peek_kind() == &TokenKind::Rule {
                program.suggestion_rules.push(self.parse_suggestion_rule()?);
            } else {
                program.rules.push(self.parse_rule()?);
            }
        }
        Ok(program)
    }

    // rule ::= atom (':-' body)? '.'
    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        let head = self.parse_atom()?;
        let body = if self.peek_kind() == &TokenKind::ColonDash {
            self.advance();
            self.parse_body()?
        } else {
            Vec::new()
        };
        self.expect(&TokenKind::Dot, "'.'")?;
        Ok(Rule { head, body })
    }

    // suggestion_rule ::= 'rule' IDENT '{' 'when' ':' body '.' 'then' ':' suggestion_template '.' '}'
    fn parse_suggestion_rule(&mut self) -> Result<SuggestionRule, ParseError> {
        self.expect(&TokenKind::Rule, "'rule'")?;
        let id = self.expect_identifier()?;
        self.expect(&TokenKind::LBrace, "'{'")?;
        self.expect(&TokenKind::When, "'when'")?;
        self.expect(&TokenKind::Colon, "':'")?;
        let conditions = self.parse_body()?;
        self.expect(&TokenKind::Dot, "'.'")?;
        self.expect(&TokenKind::Then, "'then'")?;
        self.expect(&TokenKind::Colon, "':'")?;
        let template = self.parse_suggestion_template()?;
        self.expect(&TokenKind::Dot, "'.'")?;
        self.expect(&TokenKind::RBrace, "'}'")?;
        Ok(SuggestionRule {
            id,
            conditions,
            template,
        })
    }

    // body ::= clause (',' clause)*
    fn parse_body(&mut self) -> Result<Vec<Clause>, ParseError> {
        let mut clauses = vec![self.parse_clause()?];
        while self.peek_kind() == &TokenKind::Comma {
            self.advance();
            clauses.push(self.parse_clause()?);
        }
        Ok(clauses)
    }

    // clause ::= 'not' atom | aggregation | VAR (assignment|comparison) | atom
    fn parse_clause(&mut self) -> Result<Clause, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Not => {
                self.advance();
                Ok(Clause::Negation(self.parse_atom()?))
            }
            TokenKind::Aggregate => self.parse_aggregation(),
            TokenKind::Variable(name) => {
                self.advance();
                self.parse_var_led_clause(name)
            }
            _ => Ok(Clause::AtomClause(self.parse_atom()?)),
        }
    }

    /// Having consumed a leading `?Var`, decides between Comparison and
    /// Assignment. `?V = <expr>` parses as a Comparison(`=`) when the RHS
    /// is structurally a single bare term, else as an Assignment — the
    /// tie-breaker `spec.md` §4.2/§9 Open Question (a) resolves explicitly.
    fn parse_var_led_clause(&mut self, name: String) -> Result<Clause, ParseError> {
        let op = match self.peek_kind() {
            TokenKind::Eq => Some(CompareOp::Eq),
            TokenKind::Ne => Some(CompareOp::Ne),
            TokenKind::Lt => Some(CompareOp::Lt),
            TokenKind::Le => Some(CompareOp::Le),
            TokenKind::Gt => Some(CompareOp::Gt),
            TokenKind::Ge => Some(CompareOp::Ge),
            _ => None,
        };
        let Some(op) = op else {
            return Err(self.err("comparison or assignment operator"));
        };
        self.advance();

        if op == CompareOp::Eq {
            let expr = self.parse_expression()?;
            return Ok(match expr.as_bare_term() {
                Some(term) => Clause::Comparison {
                    left: Term::var(name),
                    op: CompareOp::Eq,
                    right: term.clone(),
                },
                None => Clause::Assignment { var: name, expr },
            });
        }

        let right = self.parse_term()?;
        Ok(Clause::Comparison {
            left: Term::var(name),
            op,
            right,
        })
    }

    // aggregation ::= 'aggregate' '(' agg_op ('(' VAR ')')? ',' body ',' VAR ')'
    fn parse_aggregation(&mut self) -> Result<Clause, ParseError> {
        self.expect(&TokenKind::Aggregate, "'aggregate'")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let op = match self.peek_kind() {
            TokenKind::Count => AggregateOp::Count,
            TokenKind::Sum => AggregateOp::Sum,
            TokenKind::Max => AggregateOp::Max,
            TokenKind::Min => AggregateOp::Min,
            TokenKind::Avg => AggregateOp::Avg,
            _ => return Err(self.err("aggregate operator")),
        };
        self.advance();
        let var = if self.peek_kind() == &TokenKind::LParen {
            self.advance();
            let v = self.expect_variable()?;
            self.expect(&TokenKind::RParen, "')'")?;
            Some(v)
        } else {
            None
        };
        self.expect(&TokenKind::Comma, "','")?;
        let body = self.parse_body()?;
        self.expect(&TokenKind::Comma, "','")?;
        let into = self.expect_variable()?;
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Clause::Aggregation {
            op,
            var,
            body,
            into,
        })
    }

    // atom ::= IDENT '(' (term (',' term)*)? ')'
    fn parse_atom(&mut self) -> Result<Atom, ParseError> {
        let predicate = self.expect_identifier()?;
        self.expect(&TokenKind::LParen, "'('")?;
        let mut terms = Vec::new();
        if self.peek_kind() != &TokenKind::RParen {
            terms.push(self.parse_term()?);
            while self.peek_kind() == &TokenKind::Comma {
                self.advance();
                terms.push(self.parse_term()?);
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Atom { predicate, terms })
    }

    // term ::= VAR | '_' | STRING | NUMBER | IDENT
    fn parse_term(&mut self) -> Result<Term, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::Variable(v) => {
                self.advance();
                Ok(Term::var(v))
            }
            TokenKind::Wildcard => {
                self.advance();
                Ok(Term::Wildcard)
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Term::Constant(Value::String(s)))
            }
            TokenKind::Int(i) => {
                self.advance();
                Ok(Term::Constant(Value::Int(i)))
            }
            TokenKind::Float(f) => {
                self.advance();
                Ok(Term::Constant(Value::Float(f)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Term::Constant(Value::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Term::Constant(Value::Bool(false)))
            }
            TokenKind::Identifier(s) => {
                self.advance();
                Ok(Term::Constant(Value::String(s)))
            }
            _ => Err(self.err("term")),
        }
    }

    // expression ::= additive
    fn parse_expression(&mut self) -> Result<Expression, ParseError> {
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => ArithOp::Add,
                TokenKind::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expression, ParseError> {
        let mut left = self.parse_primary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => ArithOp::Mul,
                TokenKind::Slash => ArithOp::Div,
                TokenKind::Percent => ArithOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_primary()?;
            left = Expression::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    // primary ::= '(' expression ')' | function_call | term
    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        if self.peek_kind() == &TokenKind::LParen {
            self.advance();
            let expr = self.parse_expression()?;
            self.expect(&TokenKind::RParen, "')'")?;
            return Ok(expr);
        }
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            if self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::LParen) {
                return self.parse_function_call(name);
            }
        }
        Ok(Expression::Term(self.parse_term()?))
    }

    // function_call ::= IDENT '(' (expression (',' expression)*)? ')'
    fn parse_function_call(&mut self, name: String) -> Result<Expression, ParseError> {
        self.advance(); // identifier
        self.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.peek_kind() != &TokenKind::RParen {
            args.push(self.parse_expression()?);
            while self.peek_kind() == &TokenKind::Comma {
                self.advance();
                args.push(self.parse_expression()?);
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(Expression::Call { name, args })
    }

    /// `suggestion(type, impact, title, body[, target[, metrics]])`
    fn parse_suggestion_template(&mut self) -> Result<SuggestionTemplate, ParseError> {
        self.expect(&TokenKind::Suggestion, "'suggestion'")?;
        self.expect(&TokenKind::LParen, "'('")?;
        let suggestion_type = self.expect_identifier()?;
        self.expect(&TokenKind::Comma, "','")?;
        let impact = self.expect_identifier()?;
        self.expect(&TokenKind::Comma, "','")?;
        let title = self.expect_string()?;
        self.expect(&TokenKind::Comma, "','")?;
        let body = self.expect_string()?;

        let mut target = None;
        let mut metrics = Vec::new();
        if self.peek_kind() == &TokenKind::Comma {
            self.advance();
            target = Some(self.parse_target_string_or_var()?);
            if self.peek_kind() == &TokenKind::Comma {
                self.advance();
                metrics = self.parse_metrics_list()?;
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        Ok(SuggestionTemplate {
            suggestion_type,
            impact,
            title,
            body,
            target,
            metrics,
        })
    }

    fn parse_target_string_or_var(&mut self) -> Result<String, ParseError> {
        match self.peek_kind().clone() {
            TokenKind::String(s) => {
                self.advance();
                Ok(s)
            }
            TokenKind::Variable(v) => {
                self.advance();
                Ok(format!("?{v}"))
            }
            _ => Err(self.err("string or variable")),
        }
    }

    fn parse_metrics_list(&mut self) -> Result<Vec<MetricTemplate>, ParseError> {
        self.expect(&TokenKind::LBracket, "'['")?;
        let mut metrics = Vec::new();
        if self.peek_kind() != &TokenKind::RBracket {
            metrics.push(self.parse_metric_pair()?);
            while self.peek_kind() == &TokenKind::Comma {
                self.advance();
                metrics.push(self.parse_metric_pair()?);
            }
        }
        self.expect(&TokenKind::RBracket, "']'")?;
        Ok(metrics)
    }

    fn parse_metric_pair(&mut self) -> Result<MetricTemplate, ParseError> {
        self.expect(&TokenKind::LBracket, "'['")?;
        let label = self.expect_string()?;
        self.expect(&TokenKind::Comma, "','")?;
        let value = self.parse_metric_value()?;
        self.expect(&TokenKind::RBracket, "']'")?;
        Ok(MetricTemplate { label, value })
    }

    fn parse_metric_value(&mut self) -> Result<String, ParseError> {
        if let TokenKind::String(s) = self.peek_kind().clone() {
            self.advance();
            return Ok(s);
        }
        let expr = self.parse_expression()?;
        Ok(expr.to_string())
    }
}
