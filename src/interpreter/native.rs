use std::fmt;
use std::rc::Rc;
use std::time::SystemTime;

use super::environment::Environment;
use super::runtime_error::{EvalResult, RuntimeError, RuntimeResult, Unwind};
use super::value::{Callable, Value};
use super::Interpreter;

/// A callable backed by a host routine instead of Glitter source.
pub struct NativeFunction {
    name: String,
    arity: usize,
    handler: Rc<dyn Fn(&mut Interpreter, Vec<Value>) -> RuntimeResult>,
}

impl NativeFunction {
    pub fn new<F>(name: &str, arity: usize, handler: F) -> NativeFunction
    where
        F: Fn(&mut Interpreter, Vec<Value>) -> RuntimeResult + 'static,
    {
        NativeFunction {
            name: String::from(name),
            arity,
            handler: Rc::new(handler),
        }
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> EvalResult {
        (self.handler)(interpreter, arguments).map_err(Unwind::from)
    }
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction({})", self.name)
    }
}

/// Seconds since the Unix epoch.
pub fn clock(_interpreter: &mut Interpreter, _arguments: Vec<Value>) -> RuntimeResult {
    match SystemTime::now().duration_since(SystemTime::UNIX_EPOCH) {
        Ok(elapsed) => Ok(Value::Number(elapsed.as_secs_f64())),
        Err(err) => Err(RuntimeError::with_message(&format!("{:?}", err))),
    }
}

/// Install the built-in natives in a root environment.
pub fn install_defaults(globals: &mut Environment) {
    globals.define(
        "clock",
        Value::Callable(Rc::new(NativeFunction::new("clock", 0, clock))),
    );
}
