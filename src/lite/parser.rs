use std::rc::Rc;

use crate::lite::ast::{BinaryOp, Expr, FunctionDef, LogicalOp, ObjectMember, PropertyName, Statement, StatementKind, UnaryOp, VarKind};
use crate::value::format_number;
use crate::lite::stack::StackGuard;
use crate::lite::token::{Token, TokenData, tokenize};
use crate::{Error, raise_syntax_error};

/// Statements and expressions nested deeper than this are rejected.
const MAX_NESTING: usize = 128;

/// Tokenizes and parses a whole script. Nesting is bounded by [`MAX_NESTING`] and by `guard`.
pub fn parse_script(source: &str, guard: StackGuard) -> Result<Vec<Statement>, Error> {
    let tokens = tokenize(source)?;
    let mut parser = Parser::new(tokens, guard);
    let statements = parser.parse_statements()?;
    if let Some(t) = parser.peek_data() {
        return Err(raise_syntax_error!(t.line, format!("Unexpected token {:?}", t.token)));
    }
    Ok(statements)
}

struct Parser {
    tokens: Vec<TokenData>,
    pos: usize,
    depth: usize,
    guard: StackGuard,
}

impl Parser {
    fn new(tokens: Vec<TokenData>, guard: StackGuard) -> Self {
        Parser { tokens, pos: 0, depth: 0, guard }
    }

    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T, Error>) -> Result<T, Error> {
        if self.depth >= MAX_NESTING || self.guard.exceeded() {
            return Err(raise_syntax_error!(self.line(), "Maximum nesting depth exceeded"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn peek_data(&self) -> Option<&TokenData> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn line(&self) -> usize {
        self.peek_data()
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn newline_before(&self) -> bool {
        self.peek_data().is_some_and(|t| t.newline_before)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self) -> Error {
        match self.peek_data() {
            Some(t) => raise_syntax_error!(t.line, format!("Unexpected token {:?}", t.token)),
            None => raise_syntax_error!(self.line(), "Unexpected end of input"),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), Error> {
        if self.eat(token) { Ok(()) } else { Err(self.unexpected()) }
    }

    fn expect_identifier(&mut self) -> Result<String, Error> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    /// Statement terminator: `;`, or an inserted one before `}`, a line break or the end.
    fn consume_semicolon(&mut self) -> Result<(), Error> {
        if self.eat(&Token::Semicolon) || self.peek().is_none() || self.check(&Token::RBrace) || self.newline_before() {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_statements(&mut self) -> Result<Vec<Statement>, Error> {
        let mut statements = Vec::new();
        while self.peek().is_some() && !self.check(&Token::RBrace) {
            let statement = self.parse_statement()?;
            log::trace!("parsed statement at line {}", statement.line);
            statements.push(statement);
        }
        Ok(statements)
    }

    fn parse_statement_block(&mut self) -> Result<Vec<Statement>, Error> {
        self.expect(&Token::LBrace)?;
        let body = self.parse_statements()?;
        self.expect(&Token::RBrace)?;
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Statement, Error> {
        let line = self.line();
        let kind = self.nested(Self::parse_statement_kind)?;
        Ok(Statement { kind, line })
    }

    fn parse_statement_kind(&mut self) -> Result<StatementKind, Error> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected());
        };
        match token {
            Token::Semicolon => {
                self.pos += 1;
                Ok(StatementKind::Empty)
            }
            Token::LBrace => Ok(StatementKind::Block(self.parse_statement_block()?)),
            Token::Var | Token::Let | Token::Const => {
                let kind = self.parse_declaration()?;
                self.consume_semicolon()?;
                Ok(kind)
            }
            Token::Function => {
                self.pos += 1;
                let name = self.expect_identifier()?;
                let def = self.parse_function_rest(Some(name))?;
                Ok(StatementKind::FunctionDeclaration(def))
            }
            Token::Return => {
                self.pos += 1;
                let value = if self.check(&Token::Semicolon) || self.check(&Token::RBrace) || self.peek().is_none() || self.newline_before() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.consume_semicolon()?;
                Ok(StatementKind::Return(value))
            }
            Token::If => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let condition = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch = if self.eat(&Token::Else) {
                    Some(Box::new(self.parse_statement()?))
                } else {
                    None
                };
                Ok(StatementKind::If(condition, then_branch, else_branch))
            }
            Token::While => {
                self.pos += 1;
                self.expect(&Token::LParen)?;
                let condition = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                let body = Box::new(self.parse_statement()?);
                Ok(StatementKind::While(condition, body))
            }
            Token::Do => {
                self.pos += 1;
                let body = Box::new(self.parse_statement()?);
                self.expect(&Token::While)?;
                self.expect(&Token::LParen)?;
                let condition = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                self.eat(&Token::Semicolon);
                Ok(StatementKind::DoWhile(body, condition))
            }
            Token::For => self.parse_for(),
            Token::Break => {
                self.pos += 1;
                self.consume_semicolon()?;
                Ok(StatementKind::Break)
            }
            Token::Continue => {
                self.pos += 1;
                self.consume_semicolon()?;
                Ok(StatementKind::Continue)
            }
            Token::Throw => {
                self.pos += 1;
                if self.newline_before() {
                    return Err(raise_syntax_error!(self.line(), "Illegal newline after throw"));
                }
                let value = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(StatementKind::Throw(value))
            }
            Token::Try => self.parse_try(),
            _ => {
                let expr = self.parse_expression()?;
                self.consume_semicolon()?;
                Ok(StatementKind::Expr(expr))
            }
        }
    }

    fn parse_declaration(&mut self) -> Result<StatementKind, Error> {
        let kind = match self.advance() {
            Some(Token::Var) => VarKind::Var,
            Some(Token::Let) => VarKind::Let,
            _ => VarKind::Const,
        };
        let mut declarations = Vec::new();
        loop {
            let name = self.expect_identifier()?;
            let init = if self.eat(&Token::Assign) { Some(self.parse_assignment()?) } else { None };
            if kind == VarKind::Const && init.is_none() {
                return Err(raise_syntax_error!(self.line(), "Missing initializer in const declaration"));
            }
            declarations.push((name, init));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(StatementKind::Declaration(kind, declarations))
    }

    fn parse_for(&mut self) -> Result<StatementKind, Error> {
        self.pos += 1;
        self.expect(&Token::LParen)?;
        let init = if self.eat(&Token::Semicolon) {
            None
        } else {
            let line = self.line();
            let kind = if matches!(self.peek(), Some(Token::Var | Token::Let | Token::Const)) {
                self.parse_declaration()?
            } else {
                StatementKind::Expr(self.parse_expression()?)
            };
            self.expect(&Token::Semicolon)?;
            Some(Box::new(Statement { kind, line }))
        };
        let test = if self.check(&Token::Semicolon) { None } else { Some(self.parse_expression()?) };
        self.expect(&Token::Semicolon)?;
        let update = if self.check(&Token::RParen) { None } else { Some(self.parse_expression()?) };
        self.expect(&Token::RParen)?;
        let body = Box::new(self.parse_statement()?);
        Ok(StatementKind::For { init, test, update, body })
    }

    fn parse_try(&mut self) -> Result<StatementKind, Error> {
        self.pos += 1;
        let block = self.parse_statement_block()?;
        let mut param = None;
        let handler = if self.eat(&Token::Catch) {
            if self.eat(&Token::LParen) {
                param = Some(self.expect_identifier()?);
                self.expect(&Token::RParen)?;
            }
            Some(self.parse_statement_block()?)
        } else {
            None
        };
        let finalizer = if self.eat(&Token::Finally) { Some(self.parse_statement_block()?) } else { None };
        if handler.is_none() && finalizer.is_none() {
            return Err(raise_syntax_error!(self.line(), "Missing catch or finally after try"));
        }
        Ok(StatementKind::Try {
            block,
            param,
            handler,
            finalizer,
        })
    }

    fn parse_parameters(&mut self) -> Result<Vec<String>, Error> {
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        while !self.check(&Token::RParen) {
            params.push(self.expect_identifier()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(params)
    }

    /// Parameters and body of a function whose `function` keyword and name are consumed.
    fn parse_function_rest(&mut self, name: Option<String>) -> Result<Rc<FunctionDef>, Error> {
        let line = self.line();
        let params = self.parse_parameters()?;
        let body = self.parse_statement_block()?;
        Ok(Rc::new(FunctionDef {
            name,
            params,
            body,
            is_arrow: false,
            line,
        }))
    }

    fn parse_expression(&mut self) -> Result<Expr, Error> {
        let mut expr = self.parse_assignment()?;
        while self.eat(&Token::Comma) {
            let right = self.parse_assignment()?;
            expr = Expr::Comma(Box::new(expr), Box::new(right));
        }
        Ok(expr)
    }

    fn is_arrow_ahead(&self) -> bool {
        match self.peek() {
            Some(Token::Identifier(_)) => self.peek_at(1) == Some(&Token::Arrow),
            Some(Token::LParen) => {
                let mut depth = 0usize;
                let mut offset = 0;
                while let Some(token) = self.peek_at(offset) {
                    match token {
                        Token::LParen => depth += 1,
                        Token::RParen => {
                            depth -= 1;
                            if depth == 0 {
                                return self.peek_at(offset + 1) == Some(&Token::Arrow);
                            }
                        }
                        _ => {}
                    }
                    offset += 1;
                }
                false
            }
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> Result<Expr, Error> {
        let line = self.line();
        let params = if self.check(&Token::LParen) {
            self.parse_parameters()?
        } else {
            vec![self.expect_identifier()?]
        };
        self.expect(&Token::Arrow)?;
        let body = if self.check(&Token::LBrace) {
            self.parse_statement_block()?
        } else {
            let body_line = self.line();
            let value = self.parse_assignment()?;
            vec![Statement {
                kind: StatementKind::Return(Some(value)),
                line: body_line,
            }]
        };
        Ok(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
            is_arrow: true,
            line,
        })))
    }

    fn parse_assignment(&mut self) -> Result<Expr, Error> {
        self.nested(Self::parse_assignment_inner)
    }

    fn parse_assignment_inner(&mut self) -> Result<Expr, Error> {
        if self.is_arrow_ahead() {
            return self.parse_arrow_function();
        }
        let left = self.parse_conditional()?;
        let op = match self.peek() {
            Some(Token::Assign) => None,
            Some(Token::AddAssign) => Some(BinaryOp::Add),
            Some(Token::SubAssign) => Some(BinaryOp::Sub),
            Some(Token::MulAssign) => Some(BinaryOp::Mul),
            Some(Token::DivAssign) => Some(BinaryOp::Div),
            Some(Token::ModAssign) => Some(BinaryOp::Mod),
            _ => return Ok(left),
        };
        if !left.is_assignment_target() {
            return Err(raise_syntax_error!(self.line(), "Invalid left-hand side in assignment"));
        }
        self.pos += 1;
        let right = self.parse_assignment()?;
        Ok(match op {
            None => Expr::Assign(Box::new(left), Box::new(right)),
            Some(op) => Expr::CompoundAssign(op, Box::new(left), Box::new(right)),
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr, Error> {
        let condition = self.parse_nullish()?;
        if !self.eat(&Token::QuestionMark) {
            return Ok(condition);
        }
        let true_expr = self.parse_assignment()?;
        self.expect(&Token::Colon)?;
        let false_expr = self.parse_assignment()?;
        Ok(Expr::Conditional(Box::new(condition), Box::new(true_expr), Box::new(false_expr)))
    }

    fn parse_nullish(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_logical_or()?;
        while self.eat(&Token::NullishCoalescing) {
            let right = self.parse_logical_or()?;
            left = Expr::Logical(LogicalOp::Nullish, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_logical_and()?;
        while self.eat(&Token::LogicalOr) {
            let right = self.parse_logical_and()?;
            left = Expr::Logical(LogicalOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::LogicalAnd) {
            let right = self.parse_equality()?;
            left = Expr::Logical(LogicalOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Equal) => BinaryOp::Equal,
                Some(Token::NotEqual) => BinaryOp::NotEqual,
                Some(Token::StrictEqual) => BinaryOp::StrictEqual,
                Some(Token::StrictNotEqual) => BinaryOp::StrictNotEqual,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::LessThan) => BinaryOp::LessThan,
                Some(Token::GreaterThan) => BinaryOp::GreaterThan,
                Some(Token::LessEqual) => BinaryOp::LessEqual,
                Some(Token::GreaterEqual) => BinaryOp::GreaterEqual,
                Some(Token::InstanceOf) => BinaryOp::InstanceOf,
                Some(Token::In) => BinaryOp::In,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_additive(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_exponentiation()?;
        loop {
            let op = match self.peek() {
                Some(Token::Multiply) => BinaryOp::Mul,
                Some(Token::Divide) => BinaryOp::Div,
                Some(Token::Mod) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.parse_exponentiation()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_exponentiation(&mut self) -> Result<Expr, Error> {
        let left = self.parse_unary()?;
        if self.eat(&Token::Exponent) {
            // Right associative.
            let right = self.parse_exponentiation()?;
            return Ok(Expr::Binary(BinaryOp::Exp, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Error> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::LogicalNot) => UnaryOp::Not,
            Some(Token::TypeOf) => UnaryOp::TypeOf,
            Some(Token::Void) => UnaryOp::Void,
            Some(Token::Delete) => UnaryOp::Delete,
            Some(Token::Increment | Token::Decrement) => {
                let increment = self.check(&Token::Increment);
                self.pos += 1;
                let target = self.nested(Self::parse_unary)?;
                if !target.is_assignment_target() {
                    return Err(raise_syntax_error!(self.line(), "Invalid left-hand side expression in prefix operation"));
                }
                return Ok(Expr::Update {
                    increment,
                    prefix: true,
                    target: Box::new(target),
                });
            }
            _ => return self.parse_postfix(),
        };
        self.pos += 1;
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, Error> {
        let expr = self.parse_call_member()?;
        if matches!(self.peek(), Some(Token::Increment | Token::Decrement)) && !self.newline_before() {
            if !expr.is_assignment_target() {
                return Err(raise_syntax_error!(self.line(), "Invalid left-hand side expression in postfix operation"));
            }
            let increment = self.check(&Token::Increment);
            self.pos += 1;
            return Ok(Expr::Update {
                increment,
                prefix: false,
                target: Box::new(expr),
            });
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, Error> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        while !self.check(&Token::RParen) {
            args.push(self.parse_assignment()?);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen)?;
        Ok(args)
    }

    fn parse_property_suffix(&mut self, object: Expr) -> Result<Expr, Error> {
        let name = self.advance().and_then(|t| t.as_identifier_string());
        match name {
            Some(name) => Ok(Expr::Property(Box::new(object), name)),
            None => Err(raise_syntax_error!(self.line(), "Unexpected token after '.'")),
        }
    }

    fn parse_call_member(&mut self) -> Result<Expr, Error> {
        let mut expr = if self.check(&Token::New) { self.parse_new()? } else { self.parse_primary()? };
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    expr = self.parse_property_suffix(expr)?;
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expression()?;
                    self.expect(&Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                Some(Token::LParen) => {
                    let args = self.parse_arguments()?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_new(&mut self) -> Result<Expr, Error> {
        self.expect(&Token::New)?;
        let mut callee = if self.check(&Token::New) { self.parse_new()? } else { self.parse_primary()? };
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    callee = self.parse_property_suffix(callee)?;
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expression()?;
                    self.expect(&Token::RBracket)?;
                    callee = Expr::Index(Box::new(callee), Box::new(index));
                }
                _ => break,
            }
        }
        let args = if self.check(&Token::LParen) { self.parse_arguments()? } else { Vec::new() };
        Ok(Expr::New(Box::new(callee), args))
    }

    fn parse_primary(&mut self) -> Result<Expr, Error> {
        let line = self.line();
        let Some(token) = self.advance() else {
            return Err(raise_syntax_error!(line, "Unexpected end of input"));
        };
        match token {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::StringLit(s) => Ok(Expr::StringLit(Rc::from(s.as_str()))),
            Token::True => Ok(Expr::Boolean(true)),
            Token::False => Ok(Expr::Boolean(false)),
            Token::Null => Ok(Expr::Null),
            Token::This => Ok(Expr::This),
            Token::Identifier(name) => Ok(Expr::Var(name)),
            Token::LParen => {
                let expr = self.parse_expression()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::Function => {
                let name = match self.peek() {
                    Some(Token::Identifier(_)) => Some(self.expect_identifier()?),
                    _ => None,
                };
                Ok(Expr::Function(self.parse_function_rest(name)?))
            }
            Token::LBracket => {
                let mut elements = Vec::new();
                loop {
                    if self.eat(&Token::RBracket) {
                        break;
                    }
                    if self.eat(&Token::Comma) {
                        elements.push(Expr::Undefined);
                        continue;
                    }
                    elements.push(self.parse_assignment()?);
                    if !self.eat(&Token::Comma) {
                        self.expect(&Token::RBracket)?;
                        break;
                    }
                }
                Ok(Expr::Array(elements))
            }
            Token::LBrace => self.parse_object_literal(),
            other => Err(raise_syntax_error!(line, format!("Unexpected token {other:?}"))),
        }
    }

    fn parse_property_name(&mut self) -> Result<PropertyName, Error> {
        let Some(token) = self.advance() else {
            return Err(self.unexpected());
        };
        match token {
            Token::StringLit(s) => Ok(PropertyName::Static(s)),
            Token::Number(n) => Ok(PropertyName::Static(format_number(n))),
            Token::LBracket => {
                let key = self.parse_assignment()?;
                self.expect(&Token::RBracket)?;
                Ok(PropertyName::Computed(key))
            }
            other => match other.as_identifier_string() {
                Some(name) => Ok(PropertyName::Static(name)),
                None => Err(raise_syntax_error!(self.line(), format!("Unexpected token {other:?} in object literal"))),
            },
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, Error> {
        let mut members = Vec::new();
        while !self.eat(&Token::RBrace) {
            let accessor = match self.peek() {
                Some(Token::Identifier(word)) if word == "get" || word == "set" => {
                    let is_name_next = !matches!(self.peek_at(1), Some(Token::Colon | Token::LParen | Token::Comma | Token::RBrace) | None);
                    is_name_next.then(|| word == "get")
                }
                _ => None,
            };
            if let Some(is_getter) = accessor {
                self.pos += 1;
                let name = self.parse_property_name()?;
                let def = self.parse_function_rest(None)?;
                members.push(if is_getter {
                    ObjectMember::Getter(name, def)
                } else {
                    ObjectMember::Setter(name, def)
                });
            } else {
                let shorthand = match self.peek() {
                    Some(Token::Identifier(name)) => Some(name.clone()),
                    _ => None,
                };
                let name = self.parse_property_name()?;
                if self.eat(&Token::Colon) {
                    members.push(ObjectMember::Value(name, self.parse_assignment()?));
                } else if self.check(&Token::LParen) {
                    let function_name = match &name {
                        PropertyName::Static(s) => Some(s.clone()),
                        PropertyName::Computed(_) => None,
                    };
                    let def = self.parse_function_rest(function_name)?;
                    members.push(ObjectMember::Value(name, Expr::Function(def)));
                } else if let Some(var) = shorthand {
                    members.push(ObjectMember::Value(name, Expr::Var(var)));
                } else {
                    return Err(self.unexpected());
                }
            }
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                break;
            }
        }
        Ok(Expr::Object(members))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Vec<Statement>, Error> {
        parse_script(source, StackGuard::here(1024 * 1024))
    }

    fn single_expr(source: &str) -> Expr {
        let mut statements = parse(source).unwrap();
        assert_eq!(statements.len(), 1);
        match statements.remove(0).kind {
            StatementKind::Expr(expr) => expr,
            other => panic!("expected an expression statement, got {other:?}"),
        }
    }

    #[test]
    fn precedence_of_binary_operators() {
        let expr = single_expr("1 + 2 * 3 ** 2");
        let Expr::Binary(BinaryOp::Add, _, right) = expr else {
            panic!("addition should be the root");
        };
        let Expr::Binary(BinaryOp::Mul, _, power) = *right else {
            panic!("multiplication binds tighter than addition");
        };
        assert!(matches!(*power, Expr::Binary(BinaryOp::Exp, ..)));
    }

    #[test]
    fn semicolons_are_inserted_at_line_breaks() {
        let statements = parse("let a = 1\nlet b = a\nb++\n").unwrap();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[2].line, 3);
    }

    #[test]
    fn return_followed_by_newline_returns_undefined() {
        let statements = parse("function f() {\n  return\n  42\n}").unwrap();
        let StatementKind::FunctionDeclaration(def) = &statements[0].kind else {
            panic!("expected a function declaration");
        };
        assert!(matches!(def.body[0].kind, StatementKind::Return(None)));
        assert_eq!(def.body.len(), 2);
    }

    #[test]
    fn arrow_functions_and_object_literals() {
        let expr = single_expr("f = (a, b) => ({ a, [b]: 1, get c() { return 2 }, m() {} })");
        let Expr::Assign(_, value) = expr else {
            panic!("expected assignment");
        };
        let Expr::Function(def) = *value else {
            panic!("expected arrow function");
        };
        assert!(def.is_arrow);
        assert_eq!(def.params, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn syntax_errors_carry_the_line() {
        let err = parse("let a = 1;\nlet = ;").unwrap_err();
        assert!(matches!(err, Error::SyntaxError { line: 2, .. }));
        assert!(parse("1 = 2").is_err());
        assert!(parse("{bad").is_err());
    }

    #[test]
    fn nesting_is_bounded() {
        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert!(parse(&shallow).is_ok());
        let deep = format!("{}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        let err = parse(&deep).unwrap_err();
        assert!(matches!(err, Error::SyntaxError { line: 1, .. }), "{err}");
        assert!(parse(&format!("{}x", "!".repeat(1000))).is_err());
        assert!(parse(&format!("{}{}", "{".repeat(1000), "}".repeat(1000))).is_err());
    }
}
