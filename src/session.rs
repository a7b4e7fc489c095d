use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use log::debug;

use crate::error::GlitterError;
use crate::interpreter::runtime_error::RuntimeResult;
use crate::interpreter::value::Value;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::scanner::Scanner;

pub type SharedInput = Rc<RefCell<dyn BufRead>>;
pub type SharedOutput = Rc<RefCell<dyn Write>>;

/// One embedding of the interpreter: the pipeline wiring plus a root
/// environment that persists across `run` calls, so an interactive shell
/// can build state line by line.
pub struct Session {
    interpreter: Interpreter,
}

impl Session {
    pub fn new(input: SharedInput, output: SharedOutput) -> Session {
        Session {
            interpreter: Interpreter::new(input, output),
        }
    }

    /// Install a host function in the root environment under `name`.
    /// Registration should happen before the first `run`, but later
    /// registration simply defines over any existing binding.
    pub fn register_native<F>(&mut self, name: &str, arity: usize, handler: F)
    where
        F: Fn(&mut Interpreter, Vec<Value>) -> RuntimeResult + 'static,
    {
        self.interpreter.register_native(name, arity, handler);
    }

    /// Run one source text through scanner, parser, resolver, and
    /// evaluator. Every static error is delivered to `sink` and suppresses
    /// evaluation entirely; a runtime error is delivered after aborting
    /// the run. Root-environment state survives either way.
    pub fn run(&mut self, source: &str, path: &str, sink: &mut dyn FnMut(&GlitterError)) {
        let (tokens, mut errors) = Scanner::new(source, path).scan();
        debug!("scanned {} tokens from {}", tokens.len(), path);

        let (mut statements, parse_errors) = Parser::new(tokens).parse();
        errors.extend(parse_errors);

        // The resolver assumes a well-formed tree; skip it when the parse
        // already failed.
        if errors.is_empty() {
            errors.extend(Resolver::new().resolve(&mut statements));
        }

        if !errors.is_empty() {
            debug!("{} static errors, evaluation skipped", errors.len());
            for error in &errors {
                sink(error);
            }
            return;
        }

        debug!("executing {} statements", statements.len());
        if let Err(err) = self.interpreter.interpret(&statements) {
            debug!("run aborted: {}", err);
            let error = GlitterError::from(err);
            sink(&error);
        }
    }
}
