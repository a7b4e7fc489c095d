use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use log::debug;

pub mod environment;
pub mod function;
pub mod native;
pub mod runtime_error;
pub mod value;

use self::environment::Environment;
use self::function::Function;
use self::native::NativeFunction;
use self::runtime_error::{EvalResult, RuntimeError, RuntimeResult, Unwind};
use self::value::Value;
use crate::ast::{Expr, Stmt};
use crate::token::{Token, TokenKind};

/// Tree-walking evaluator. `environment` tracks the frame of the block or
/// call being executed; `globals` is the root frame shared across runs.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    output: Rc<RefCell<dyn Write>>,
    input: Rc<RefCell<dyn BufRead>>,
}

impl Interpreter {
    pub fn new(
        input: Rc<RefCell<dyn BufRead>>,
        output: Rc<RefCell<dyn Write>>,
    ) -> Interpreter {
        let mut root = Environment::new();
        native::install_defaults(&mut root);
        let globals = Rc::new(RefCell::new(root));
        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            output,
            input,
        }
    }

    pub fn globals(&self) -> &Rc<RefCell<Environment>> {
        &self.globals
    }

    /// Output sink `print` writes to; native functions may use it too.
    pub fn output(&self) -> &Rc<RefCell<dyn Write>> {
        &self.output
    }

    /// Input stream handed to the session; available to native functions.
    pub fn input(&self) -> &Rc<RefCell<dyn BufRead>> {
        &self.input
    }

    pub fn register_native<F>(&mut self, name: &str, arity: usize, handler: F)
    where
        F: Fn(&mut Interpreter, Vec<Value>) -> RuntimeResult + 'static,
    {
        self.globals.borrow_mut().define(
            name,
            Value::Callable(Rc::new(NativeFunction::new(name, arity, handler))),
        );
    }

    /// Execute a resolved program. A runtime error aborts the run; the
    /// root environment keeps whatever state was established before it.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        for statement in statements {
            if let Err(unwind) = self.execute(statement) {
                return Err(match unwind {
                    Unwind::Error(err) => err,
                    // The resolver rejects top-level returns; keep the
                    // failure observable if one slips through anyway.
                    Unwind::Return(_) => {
                        RuntimeError::with_message("return outside a function")
                    }
                });
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> EvalResult<()> {
        match stmt {
            Stmt::Expression { expression } => {
                self.evaluate(expression)?;
                Ok(())
            }
            Stmt::Print { expression } => {
                let value = self.evaluate(expression)?;
                let mut out = self.output.borrow_mut();
                writeln!(out, "{}", value).map_err(|err| {
                    RuntimeError::with_message(&format!("failed to write output: {}", err))
                })?;
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Undefined,
                };
                self.environment.borrow_mut().define(name.lexeme(), value);
                Ok(())
            }
            Stmt::Function(fun) => {
                let function = Function::new(fun, Rc::clone(&self.environment));
                self.environment
                    .borrow_mut()
                    .define(fun.name.lexeme(), Value::Callable(Rc::new(function)));
                Ok(())
            }
            Stmt::Block { statements } => self.execute_block(
                statements,
                Environment::with_enclosing(Rc::clone(&self.environment)),
            ),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expression) => self.evaluate(expression)?,
                    None => Value::Undefined,
                };
                Err(Unwind::Return(value))
            }
        }
    }

    /// Run `statements` inside `environment`, restoring the previous frame
    /// on every exit path, including unwinds.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Environment,
    ) -> EvalResult<()> {
        let previous =
            std::mem::replace(&mut self.environment, Rc::new(RefCell::new(environment)));
        let result = statements
            .iter()
            .try_for_each(|statement| self.execute(statement));
        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> EvalResult {
        match expr {
            Expr::Literal(literal) => Ok(literal.clone().into()),
            Expr::Grouping { expression } => self.evaluate(expression),
            Expr::Variable { name, distance } => {
                self.look_up(name, *distance).map_err(Unwind::from)
            }
            Expr::Assignment {
                name,
                value,
                distance,
            } => {
                let value = self.evaluate(value)?;
                match distance {
                    Some(distance) => {
                        Environment::assign_at(&self.environment, name, value, *distance)
                            .map_err(Unwind::from)
                    }
                    None => self
                        .globals
                        .borrow_mut()
                        .assign(name, value)
                        .map_err(Unwind::from),
                }
            }
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator {
                    TokenKind::Minus => (-right).map_err(Unwind::from),
                    TokenKind::Bang => Ok(!right),
                    _ => Err(RuntimeError::with_message("unsupported unary operator").into()),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Self::binary(left, *operator, right).map_err(Unwind::from)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let take_left = if *operator == TokenKind::Or {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };
                // The deciding operand is returned verbatim, not coerced.
                if take_left {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expr::Call { callee, arguments } => {
                let callee = self.evaluate(callee)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate(argument)?);
                }

                let Value::Callable(callable) = callee else {
                    debug!("attempted to call a non-callable value");
                    return Err(RuntimeError::with_message("Can only call functions").into());
                };
                if args.len() != callable.arity() {
                    return Err(RuntimeError::with_message(&format!(
                        "Expected {} arguments but got {}",
                        callable.arity(),
                        args.len()
                    ))
                    .into());
                }
                callable.call(self, args)
            }
        }
    }

    fn binary(left: Value, operator: TokenKind, right: Value) -> RuntimeResult {
        match operator {
            TokenKind::Plus => left + right,
            TokenKind::Minus => left - right,
            TokenKind::Star => left * right,
            TokenKind::Slash => left / right,
            TokenKind::EqualEqual => Ok(Value::Boolean(left == right)),
            TokenKind::BangEqual => Ok(Value::Boolean(left != right)),
            TokenKind::Greater
            | TokenKind::GreaterEqual
            | TokenKind::Less
            | TokenKind::LessEqual => {
                let (Value::Number(lhs), Value::Number(rhs)) = (&left, &right) else {
                    return Err(RuntimeError::with_message("LHS and RHS must be a number"));
                };
                Ok(Value::Boolean(match operator {
                    TokenKind::Greater => lhs > rhs,
                    TokenKind::GreaterEqual => lhs >= rhs,
                    TokenKind::Less => lhs < rhs,
                    _ => lhs <= rhs,
                }))
            }
            _ => Err(RuntimeError::with_message("unsupported binary operator")),
        }
    }

    /// All variable reads go through the resolver's annotation: a distance
    /// walks the chain, no distance reads the root frame directly.
    fn look_up(&self, name: &Token, distance: Option<usize>) -> RuntimeResult {
        match distance {
            Some(distance) => Environment::get_at(&self.environment, name, distance),
            None => self.globals.borrow().get(name),
        }
    }
}
