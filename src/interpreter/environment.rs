use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::runtime_error::{RuntimeError, RuntimeResult};
use super::value::Value;
use crate::token::Token;

/// One lexical frame: a name→value map plus a link to the enclosing frame.
/// Frames are shared (`Rc<RefCell<…>>`) because closures keep their
/// defining frame alive after the block that created it has exited; the
/// resulting reference cycles are accepted and bounded by session
/// lifetime.
#[derive(Debug)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Environment {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    /// Frame nested inside `outer_scope`.
    pub fn with_enclosing(outer_scope: Rc<RefCell<Environment>>) -> Environment {
        Environment {
            values: HashMap::new(),
            enclosing: Some(outer_scope),
        }
    }

    /// Bind unconditionally in this frame; rebinding an existing name is
    /// allowed.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(String::from(name), value);
    }

    /// Look up in this frame only. Used for globals, where the resolver
    /// routes every unscoped name.
    pub fn get(&self, name: &Token) -> RuntimeResult {
        match self.values.get(name.lexeme()) {
            Some(value) => Ok(value.clone()),
            None => Err(RuntimeError::new(
                name,
                &format!("Undefined variable \"{}\"", name.lexeme()),
            )),
        }
    }

    /// Assign in this frame only; the name must already be bound.
    pub fn assign(&mut self, name: &Token, value: Value) -> RuntimeResult {
        if self.values.contains_key(name.lexeme()) {
            self.values
                .insert(String::from(name.lexeme()), value.clone());
            Ok(value)
        } else {
            Err(RuntimeError::new(
                name,
                &format!("Undefined variable \"{}\"", name.lexeme()),
            ))
        }
    }

    /// Read `name` from the frame exactly `distance` parent links up from
    /// `this`.
    pub fn get_at(
        this: &Rc<RefCell<Environment>>,
        name: &Token,
        distance: usize,
    ) -> RuntimeResult {
        let frame = Self::ancestor(this, distance).ok_or_else(|| {
            RuntimeError::new(
                name,
                &format!("Undefined variable \"{}\"", name.lexeme()),
            )
        })?;
        let frame = frame.borrow();
        frame.get(name)
    }

    /// Assign `name` in the frame exactly `distance` parent links up from
    /// `this`. The name must already exist in that frame.
    pub fn assign_at(
        this: &Rc<RefCell<Environment>>,
        name: &Token,
        value: Value,
        distance: usize,
    ) -> RuntimeResult {
        let frame = Self::ancestor(this, distance).ok_or_else(|| {
            RuntimeError::new(
                name,
                &format!("Undefined variable \"{}\"", name.lexeme()),
            )
        })?;
        let mut frame = frame.borrow_mut();
        frame.assign(name, value)
    }

    fn ancestor(
        this: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut frame = Rc::clone(this);
        for _ in 0..distance {
            let enclosing = frame.borrow().enclosing.as_ref().map(Rc::clone);
            frame = enclosing?;
        }
        Some(frame)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}
