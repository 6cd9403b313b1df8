pub mod codegen;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod lookahead;
pub mod parser;
pub mod symtab;
pub mod token;

use error::Error;
use lexer::Lexer;
use parser::Parser;
use std::io::Write;

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Write a trace line for every token into the listing.
    pub trace_tokens: bool,
}

/// Translate `src` and write the instruction listing to `out`.
///
/// On error, `out` keeps everything emitted up to the failing token.
pub fn compile<W: Write>(src: &str, out: W, options: &Options) -> Result<(), Error> {
    let lexer = Lexer::new(src).with_trace(options.trace_tokens);
    Parser::new(lexer, out).parse()
}
