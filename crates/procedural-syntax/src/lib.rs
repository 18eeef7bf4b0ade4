pub mod ast;
pub mod error;

pub use ast::{Expr, Function, Item, Param, Program, Stmt, Type};
pub use error::*;
