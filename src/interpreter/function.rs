use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::environment::Environment;
use super::runtime_error::{EvalResult, Unwind};
use super::value::{Callable, Value};
use super::Interpreter;
use crate::ast::Fun;

/// A user-defined function: its declaration plus the environment captured
/// at the point of definition (the closure).
pub struct Function {
    declaration: Rc<Fun>,
    closure: Rc<RefCell<Environment>>,
}

impl Function {
    pub fn new(declaration: &Fun, closure: Rc<RefCell<Environment>>) -> Function {
        Function {
            declaration: Rc::new(declaration.clone()),
            closure,
        }
    }
}

impl Callable for Function {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> EvalResult {
        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.define(param.lexeme(), argument);
        }

        match interpreter.execute_block(&self.declaration.body, environment) {
            Err(Unwind::Return(value)) => Ok(value),
            Err(err) => Err(err),
            // Control flowed off the end of the body.
            Ok(()) => Ok(Value::Undefined),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.declaration.name.lexeme())
    }
}

// The closure link makes the full structure cyclic, so Debug shows the name
// only.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.declaration.name.lexeme())
    }
}
