//! SQL statement tree and its printer

pub mod ast;
pub mod printer;

pub use ast::Statement;
pub use printer::{quote_identifier, render, render_all};
