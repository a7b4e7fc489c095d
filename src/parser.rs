use std::rc::Rc;

use crate::ast::{Expr, Fun, LiteralValue, Stmt};
use crate::error::GlitterError;
use crate::token::{Token, TokenKind};

const MAX_PARAMS: usize = 32;
const MAX_ARGS: usize = 32;

type ParseResult<T> = Result<T, GlitterError>;

/// Recursive-descent parser with one-token lookahead. Errors inside a
/// declaration are recorded, the stream is synchronized to the next
/// statement boundary, and parsing resumes so one run can surface several
/// errors.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<GlitterError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Parser {
        Parser {
            tokens,
            current: 0,
            errors: Vec::new(),
        }
    }

    /// Parse the whole token stream into top-level statements.
    pub fn parse(mut self) -> (Vec<Stmt>, Vec<GlitterError>) {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        (statements, self.errors)
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind() == TokenKind::EndOfFile
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        assert!(self.current > 0);
        &self.tokens[self.current - 1]
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind() == kind
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<&Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_at(self.peek(), message))
        }
    }

    fn error_at(&self, token: &Token, message: &str) -> GlitterError {
        let location = if token.kind() == TokenKind::EndOfFile {
            String::from(" at end")
        } else {
            format!(" at '{}'", token.lexeme())
        };
        GlitterError::Parse {
            message: String::from(message),
            location,
            path: Rc::clone(token.path()),
            span: token.span(),
        }
    }

    // ---- declarations ----------------------------------------------------

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.matches(&[TokenKind::Var, TokenKind::Let]) {
            self.var_declaration()
        } else if self.matches(&[TokenKind::Function]) {
            self.function_declaration()
        } else {
            self.statement()
        }
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self
            .consume(TokenKind::Identifier, "Expect variable name")?
            .clone();
        let initializer = if self.matches(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn function_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self
            .consume(TokenKind::Identifier, "Expect function name")?
            .clone();
        self.consume(TokenKind::LeftParen, "Expect '(' after function name")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_PARAMS {
                    let err = self.error_at(self.peek(), "Can't have more than 32 parameters");
                    self.errors.push(err);
                }
                let param = self
                    .consume(TokenKind::Identifier, "Expect parameter name")?
                    .clone();
                params.push(param);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters")?;

        self.consume(TokenKind::LeftBrace, "Expect '{' before function body")?;
        let body = self.block_statements()?;
        Ok(Stmt::Function(Fun { name, params, body }))
    }

    // ---- statements ------------------------------------------------------

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.matches(&[TokenKind::If]) {
            self.if_statement()
        } else if self.matches(&[TokenKind::While]) {
            self.while_statement()
        } else if self.matches(&[TokenKind::For]) {
            self.for_statement()
        } else if self.matches(&[TokenKind::Return]) {
            self.return_statement()
        } else if self.matches(&[TokenKind::Print]) {
            self.print_statement()
        } else if self.matches(&[TokenKind::LeftBrace]) {
            Ok(Stmt::Block {
                statements: self.block_statements()?,
            })
        } else {
            self.expression_statement()
        }
    }

    fn block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(err) => {
                    self.errors.push(err);
                    self.synchronize();
                }
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block")?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after while condition")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    /// `for (init; cond; inc) body` lowers to
    /// `{ init; while (cond) { body; inc; } }`.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'")?;

        let initializer = if self.matches(&[TokenKind::Semicolon]) {
            None
        } else if self.matches(&[TokenKind::Var, TokenKind::Let]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenKind::Semicolon) {
            Expr::Literal(LiteralValue::True)
        } else {
            self.expression()?
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition")?;

        let increment = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses")?;

        let body = self.statement()?;

        let mut loop_body = vec![body];
        if let Some(increment) = increment {
            loop_body.push(Stmt::Expression {
                expression: increment,
            });
        }
        let while_stmt = Stmt::While {
            condition,
            body: Box::new(Stmt::Block {
                statements: loop_body,
            }),
        };

        let mut statements = Vec::new();
        if let Some(initializer) = initializer {
            statements.push(initializer);
        }
        statements.push(while_stmt);
        Ok(Stmt::Block { statements })
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let expression = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value")?;
        Ok(Stmt::Print { expression })
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expression = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression")?;
        Ok(Stmt::Expression { expression })
    }

    // ---- expressions -----------------------------------------------------

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.logic_or()?;

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            if let Expr::Variable { name, .. } = expr {
                return Ok(Expr::Assignment {
                    name,
                    value: Box::new(value),
                    distance: None,
                });
            }
            let err = self.error_at(&equals, "Invalid assignment target");
            self.errors.push(err);
        }
        Ok(expr)
    }

    fn logic_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.logic_and()?;

        while self.matches(&[TokenKind::Or]) {
            let right = self.logic_and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator: TokenKind::Or,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.matches(&[TokenKind::And]) {
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator: TokenKind::And,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.matches(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let operator = self.previous().kind();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        use TokenKind::*;

        let mut expr = self.addition()?;
        while self.matches(&[Greater, GreaterEqual, Less, LessEqual]) {
            let operator = self.previous().kind();
            let right = self.addition()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn addition(&mut self) -> ParseResult<Expr> {
        let mut expr = self.multiplication()?;

        while self.matches(&[TokenKind::Minus, TokenKind::Plus]) {
            let operator = self.previous().kind();
            let right = self.multiplication()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn multiplication(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.matches(&[TokenKind::Slash, TokenKind::Star]) {
            let operator = self.previous().kind();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous().kind();
            let right = self.unary()?;
            Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            })
        } else {
            self.call()
        }
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;

        while self.matches(&[TokenKind::LeftParen]) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGS {
                    let err = self.error_at(self.peek(), "Can't have more than 32 arguments");
                    self.errors.push(err);
                }
                arguments.push(self.expression()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after arguments")?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            arguments,
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let expr = match self.peek().kind() {
            TokenKind::False => Expr::Literal(LiteralValue::False),
            TokenKind::True => Expr::Literal(LiteralValue::True),
            TokenKind::Undefined => Expr::Literal(LiteralValue::Undefined),
            TokenKind::Number => Expr::Literal(LiteralValue::Number(self.peek().number())),
            TokenKind::String => {
                Expr::Literal(LiteralValue::String(String::from(self.peek().text())))
            }
            TokenKind::Identifier => Expr::Variable {
                name: self.peek().clone(),
                distance: None,
            },
            TokenKind::LeftParen => {
                self.advance();
                let expression = self.expression()?;
                self.consume(TokenKind::RightParen, "Expect ')' after expression")?;
                return Ok(Expr::Grouping {
                    expression: Box::new(expression),
                });
            }
            _ => return Err(self.error_at(self.peek(), "Expect expression")),
        };
        self.advance();
        Ok(expr)
    }

    /// Discard tokens until a likely statement boundary so one parse can
    /// report several independent errors.
    fn synchronize(&mut self) {
        use TokenKind::*;
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind() == Semicolon {
                return;
            }
            match self.peek().kind() {
                Class | Function | Var | For | If | While | Print | Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::Scanner;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<GlitterError>) {
        let (tokens, scan_errors) = Scanner::new(source, "test").scan();
        assert!(scan_errors.is_empty(), "scan errors: {:?}", scan_errors);
        Parser::new(tokens).parse()
    }

    fn parse_ok(source: &str) -> Vec<Stmt> {
        let (statements, errors) = parse(source);
        assert!(errors.is_empty(), "parse errors: {:?}", errors);
        statements
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let statements = parse_ok("1 + 2 * 3;");
        let Stmt::Expression { expression } = &statements[0] else {
            panic!("expected expression statement");
        };
        let Expr::Binary {
            operator, right, ..
        } = expression
        else {
            panic!("expected binary expression");
        };
        assert_eq!(*operator, TokenKind::Plus);
        assert!(matches!(
            **right,
            Expr::Binary {
                operator: TokenKind::Star,
                ..
            }
        ));
    }

    #[test]
    fn addition_is_left_associative() {
        let statements = parse_ok("1 - 2 - 3;");
        let Stmt::Expression { expression } = &statements[0] else {
            panic!("expected expression statement");
        };
        let Expr::Binary { left, operator, .. } = expression else {
            panic!("expected binary expression");
        };
        assert_eq!(*operator, TokenKind::Minus);
        assert!(matches!(
            **left,
            Expr::Binary {
                operator: TokenKind::Minus,
                ..
            }
        ));
    }

    #[test]
    fn assignment_is_right_associative() {
        let statements = parse_ok("a = b = 1;");
        let Stmt::Expression { expression } = &statements[0] else {
            panic!("expected expression statement");
        };
        let Expr::Assignment { name, value, .. } = expression else {
            panic!("expected assignment");
        };
        assert_eq!(name.lexeme(), "a");
        assert!(matches!(**value, Expr::Assignment { .. }));
    }

    #[test]
    fn for_loop_desugars_to_block_and_while() {
        let statements = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");
        let Stmt::Block { statements } = &statements[0] else {
            panic!("expected outer block");
        };
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[0], Stmt::Var { .. }));
        let Stmt::While { body, .. } = &statements[1] else {
            panic!("expected while loop");
        };
        let Stmt::Block { statements } = &**body else {
            panic!("expected loop body block");
        };
        assert_eq!(statements.len(), 2);
        assert!(matches!(statements[1], Stmt::Expression { .. }));
    }

    #[test]
    fn for_loop_with_empty_clauses() {
        let statements = parse_ok("for (;;) print 1;");
        let Stmt::Block { statements } = &statements[0] else {
            panic!("expected outer block");
        };
        assert_eq!(statements.len(), 1);
        let Stmt::While {
            condition, body, ..
        } = &statements[0]
        else {
            panic!("expected while loop");
        };
        assert!(matches!(condition, Expr::Literal(LiteralValue::True)));
        let Stmt::Block { statements } = &**body else {
            panic!("expected loop body block");
        };
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn invalid_assignment_target_is_reported_not_fatal() {
        let (statements, errors) = parse("1 = 2;");
        assert_eq!(statements.len(), 1);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Invalid assignment target"));
    }

    #[test]
    fn parser_synchronizes_and_collects_multiple_errors() {
        let (statements, errors) = parse("var 1; print 2; for print 3;");
        assert_eq!(errors.len(), 2);
        assert_eq!(statements.len(), 1);
        assert!(matches!(statements[0], Stmt::Print { .. }));
    }

    #[test]
    fn reserved_keywords_are_rejected() {
        let (_, errors) = parse("class Foo {}");
        assert!(!errors.is_empty());
    }

    #[test]
    fn too_many_parameters_is_reported() {
        let params: Vec<String> = (0..33).map(|i| format!("p{}", i)).collect();
        let source = format!("function f({}) {{ return; }}", params.join(", "));
        let (_, errors) = parse(&source);
        assert_eq!(errors.len(), 1);
        assert!(errors[0]
            .to_string()
            .contains("Can't have more than 32 parameters"));
    }

    #[test]
    fn calls_chain_and_carry_arguments() {
        let statements = parse_ok("f(1)(2, 3);");
        let Stmt::Expression { expression } = &statements[0] else {
            panic!("expected expression statement");
        };
        let Expr::Call { callee, arguments } = expression else {
            panic!("expected call");
        };
        assert_eq!(arguments.len(), 2);
        assert!(matches!(**callee, Expr::Call { .. }));
    }

    #[test]
    fn parsing_is_deterministic() {
        let source = "function f(n) { for (var i = 0; i < n; i = i + 1) print i or n; }";
        let first = format!("{:?}", parse_ok(source));
        let second = format!("{:?}", parse_ok(source));
        assert_eq!(first, second);
    }

    #[test]
    fn return_value_is_optional() {
        let statements = parse_ok("function f() { return; }");
        let Stmt::Function(fun) = &statements[0] else {
            panic!("expected function declaration");
        };
        assert!(matches!(fun.body[0], Stmt::Return { value: None, .. }));
    }
}
