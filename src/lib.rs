//! Tree-walking interpreter for the Glitter scripting language.
//!
//! The pipeline runs source text through the [`scanner::Scanner`],
//! [`parser::Parser`], [`resolver::Resolver`], and
//! [`interpreter::Interpreter`] in that order; [`Session`] wires the four
//! stages together behind abstract input/output streams and keeps the root
//! environment alive between runs.
//!
//! # Examples
//!
//! ```
//! use std::cell::RefCell;
//! use std::io;
//! use std::rc::Rc;
//!
//! use glitter::session::{SharedInput, SharedOutput};
//! use glitter::Session;
//!
//! let input: SharedInput = Rc::new(RefCell::new(io::Cursor::new(Vec::new())));
//! let buffer = Rc::new(RefCell::new(Vec::new()));
//! let output: SharedOutput = buffer.clone();
//!
//! let mut session = Session::new(input, output);
//! session.run("print 1 + 2;", "<example>", &mut |err| panic!("{}", err));
//! assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), "3\n");
//! ```

#![warn(rust_2018_idioms)]

pub mod ast;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod session;
pub mod token;

pub use error::{GlitterError, Span};
pub use session::Session;
