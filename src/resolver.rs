use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::{Expr, Fun, Stmt};
use crate::error::GlitterError;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Binding {
    Declared,
    Defined,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionKind {
    Function,
}

/// Static pre-pass: walks the AST once, annotates every variable reference
/// and assignment with its scope distance, and reports binding errors. The
/// stack always holds the global scope at the bottom; a name that only
/// matches there (or nowhere) resolves to the root environment at runtime.
pub struct Resolver {
    scopes: Vec<HashMap<String, Binding>>,
    current_function: Option<FunctionKind>,
    errors: Vec<GlitterError>,
}

impl Resolver {
    pub fn new() -> Resolver {
        Resolver {
            scopes: vec![HashMap::new()],
            current_function: None,
            errors: Vec::new(),
        }
    }

    /// Resolve a whole program, returning the collected static errors.
    pub fn resolve(mut self, statements: &mut [Stmt]) -> Vec<GlitterError> {
        self.resolve_stmts(statements);
        self.errors
    }

    fn resolve_stmts(&mut self, statements: &mut [Stmt]) {
        statements
            .iter_mut()
            .for_each(|stmt| self.resolve_stmt(stmt));
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(initializer) = initializer {
                    self.resolve_expr(initializer);
                }
                self.define(name);
            }
            Stmt::Function(fun) => {
                self.declare(&fun.name);
                self.define(&fun.name);
                self.resolve_function(fun);
            }
            Stmt::Block { statements } => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::Expression { expression } => self.resolve_expr(expression),
            Stmt::Print { expression } => self.resolve_expr(expression),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function.is_none() {
                    self.error(keyword, "Return statement allowed only inside a function");
                }
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
        }
    }

    fn resolve_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Variable { name, distance } => {
                if self.innermost_state(name) == Some(Binding::Declared) {
                    self.error(name, "self-reference in initializer");
                }
                *distance = self.resolve_local_distance(name);
            }
            Expr::Assignment {
                name,
                value,
                distance,
            } => {
                self.resolve_expr(value);
                *distance = self.resolve_local_distance(name);
            }
            Expr::Literal(_) => {}
            Expr::Grouping { expression } => self.resolve_expr(expression),
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Binary { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Call { callee, arguments } => {
                self.resolve_expr(callee);
                arguments
                    .iter_mut()
                    .for_each(|argument| self.resolve_expr(argument));
            }
        }
    }

    fn resolve_function(&mut self, fun: &mut Fun) {
        let enclosing = self.current_function.replace(FunctionKind::Function);

        self.begin_scope();
        // Parameters live in the same scope as the body, so a duplicate
        // parameter name trips the same-scope redeclaration check.
        for param in &fun.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&mut fun.body);
        self.end_scope();

        self.current_function = enclosing;
    }

    /// Distance from the innermost scope to the closest *local* scope
    /// binding this name. A match only in the global frame resolves to
    /// `None`, which the evaluator routes to the root environment.
    fn resolve_local_distance(&self, name: &Token) -> Option<usize> {
        let depth = self.scopes.len() - 1;
        for (index, scope) in self.scopes.iter().enumerate().skip(1).rev() {
            if scope.contains_key(name.lexeme()) {
                return Some(depth - index);
            }
        }
        None
    }

    fn innermost_state(&self, name: &Token) -> Option<Binding> {
        self.scopes
            .last()
            .and_then(|scope| scope.get(name.lexeme()))
            .copied()
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let global = self.scopes.len() == 1;
        let already_bound = self
            .scopes
            .last()
            .map_or(false, |scope| scope.contains_key(name.lexeme()));

        if already_bound {
            if !global {
                self.error(name, "Already a variable with this name in this scope");
            }
            // Global redeclaration keeps the old binding Defined so the
            // initializer may read the previous value.
            return;
        }
        self.scopes
            .last_mut()
            .expect("scope stack holds at least the global scope")
            .insert(String::from(name.lexeme()), Binding::Declared);
    }

    fn define(&mut self, name: &Token) {
        self.scopes
            .last_mut()
            .expect("scope stack holds at least the global scope")
            .insert(String::from(name.lexeme()), Binding::Defined);
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(GlitterError::Resolve {
            message: String::from(message),
            lexeme: String::from(token.lexeme()),
            path: Rc::clone(token.path()),
            span: token.span(),
        });
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    fn resolve(source: &str) -> (Vec<Stmt>, Vec<GlitterError>) {
        let (tokens, scan_errors) = Scanner::new(source, "test").scan();
        assert!(scan_errors.is_empty(), "scan errors: {:?}", scan_errors);
        let (mut statements, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "parse errors: {:?}", parse_errors);
        let errors = Resolver::new().resolve(&mut statements);
        (statements, errors)
    }

    fn resolve_ok(source: &str) -> Vec<Stmt> {
        let (statements, errors) = resolve(source);
        assert!(errors.is_empty(), "resolve errors: {:?}", errors);
        statements
    }

    /// Pull the distance annotation off the sole expression in `print x;`
    /// somewhere inside the program.
    fn variable_distance(expr: &Expr) -> Option<usize> {
        match expr {
            Expr::Variable { distance, .. } => *distance,
            other => panic!("expected variable, got {:?}", other),
        }
    }

    #[test]
    fn global_references_resolve_to_root() {
        let statements = resolve_ok("var a = 1; print a;");
        let Stmt::Print { expression } = &statements[1] else {
            panic!("expected print");
        };
        assert_eq!(variable_distance(expression), None);
    }

    #[test]
    fn local_reference_in_same_scope_has_distance_zero() {
        let statements = resolve_ok("{ var a = 1; print a; }");
        let Stmt::Block { statements } = &statements[0] else {
            panic!("expected block");
        };
        let Stmt::Print { expression } = &statements[1] else {
            panic!("expected print");
        };
        assert_eq!(variable_distance(expression), Some(0));
    }

    #[test]
    fn closure_reference_counts_intervening_frames() {
        let statements = resolve_ok(
            "function make() { var c = 0; function inc() { c = c + 1; } return inc; }",
        );
        let Stmt::Function(make) = &statements[0] else {
            panic!("expected function");
        };
        let Stmt::Function(inc) = &make.body[1] else {
            panic!("expected nested function");
        };
        let Stmt::Expression { expression } = &inc.body[0] else {
            panic!("expected assignment statement");
        };
        let Expr::Assignment { distance, .. } = expression else {
            panic!("expected assignment");
        };
        assert_eq!(*distance, Some(1));
    }

    #[test]
    fn recursive_function_resolves_itself_globally() {
        let statements = resolve_ok("function f(n) { return f(n); }");
        let Stmt::Function(fun) = &statements[0] else {
            panic!("expected function");
        };
        let Stmt::Return {
            value: Some(Expr::Call { callee, .. }),
            ..
        } = &fun.body[0]
        else {
            panic!("expected return of call");
        };
        assert_eq!(variable_distance(&**callee), None);
    }

    #[test]
    fn self_reference_in_initializer_is_an_error() {
        let (_, errors) = resolve("{ var a = a; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("self-reference"));
    }

    #[test]
    fn fresh_global_self_reference_is_an_error_too() {
        let (_, errors) = resolve("var a = a;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("self-reference"));
    }

    #[test]
    fn global_redeclaration_may_read_the_old_binding() {
        let (_, errors) = resolve("var a = 1; var a = a + 1;");
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn local_redeclaration_is_an_error() {
        let (_, errors) = resolve("{ var a = 1; var a = 2; }");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("Already a variable"));
    }

    #[test]
    fn duplicate_parameter_names_are_an_error() {
        let (_, errors) = resolve("function f(a, a) { return a; }");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn return_outside_function_is_an_error() {
        let (_, errors) = resolve("return 1;");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("inside a function"));
    }

    #[test]
    fn resolving_twice_is_idempotent() {
        let source = "function make() { var c = 0; function inc() { c = c + 1; } return inc; }";
        let (tokens, _) = Scanner::new(source, "test").scan();
        let (mut first, _) = Parser::new(tokens).parse();
        Resolver::new().resolve(&mut first);
        let snapshot = format!("{:?}", first);
        let errors = Resolver::new().resolve(&mut first);
        assert!(errors.is_empty());
        assert_eq!(snapshot, format!("{:?}", first));
    }
}
