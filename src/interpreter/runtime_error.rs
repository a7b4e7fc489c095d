use std::rc::Rc;

use thiserror::Error;

use super::value::Value;
use crate::error::GlitterError;
use crate::token::Token;

/// Evaluation failure. The token is present when the failing operation has
/// a source anchor (variable lookups and assignments); operator type errors
/// carry only the message.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RuntimeError {
    pub token: Option<Token>,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: &str) -> RuntimeError {
        RuntimeError {
            token: Some(token.clone()),
            message: String::from(message),
        }
    }

    pub fn with_message(message: &str) -> RuntimeError {
        RuntimeError {
            token: None,
            message: String::from(message),
        }
    }
}

impl From<RuntimeError> for GlitterError {
    fn from(err: RuntimeError) -> GlitterError {
        let (path, span) = match &err.token {
            Some(token) => (Some(Rc::clone(token.path())), Some(token.span())),
            None => (None, None),
        };
        GlitterError::Runtime {
            message: err.message,
            path,
            span,
        }
    }
}

/// Control channel threaded through every evaluator result: either a real
/// failure, or a `return` unwinding to the nearest enclosing function call,
/// which consumes it as the call's value.
#[derive(Debug, Clone)]
pub enum Unwind {
    Return(Value),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Unwind {
        Unwind::Error(err)
    }
}

pub type RuntimeResult<T = Value> = Result<T, RuntimeError>;
pub type EvalResult<T = Value> = Result<T, Unwind>;
