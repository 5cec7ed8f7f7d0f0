//! Core domain types and logic.

pub mod bar;
pub mod series;
pub mod value;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod context;
pub mod eval;
pub mod program;
pub mod indicator;
pub mod screener;
pub mod cache;
pub mod market_cap;
pub mod pipeline;
pub mod error;
