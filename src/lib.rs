//! Momo is a small dynamically-typed scripting language. Source text is
//! lexed and parsed into an AST, compiled to a compact bytecode (a byte
//! stream of opcodes with big-endian operands plus a constant pool), and
//! executed by a stack-based virtual machine with call frames, closures,
//! arrays, hashes and a fixed registry of builtin functions.

use std::fmt;

pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod frame;
pub mod lexer;
pub mod opcode;
pub mod parser;
pub mod repl;
pub mod symbol;
pub mod trace;
pub mod value;
pub mod vm;

pub use compiler::{Bytecode, Compiler};
pub use value::{CompileError, RuntimeError, Value};
pub use vm::Vm;

/// Any failure along the source → result path.
#[derive(Debug, Clone, PartialEq)]
pub enum MomoError {
    Compile(CompileError),
    Runtime(RuntimeError),
}

impl fmt::Display for MomoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MomoError::Compile(err) => err.fmt(f),
            MomoError::Runtime(err) => err.fmt(f),
        }
    }
}

impl From<CompileError> for MomoError {
    fn from(err: CompileError) -> Self {
        MomoError::Compile(err)
    }
}

impl From<RuntimeError> for MomoError {
    fn from(err: RuntimeError) -> Self {
        MomoError::Runtime(err)
    }
}

/// Compile and run `source` in a fresh VM, returning the value of the last
/// expression statement.
pub fn eval(source: &str, file: &str) -> Result<Value, MomoError> {
    let tokens = lexer::Lexer::new(source, file).tokenize()?;
    let program = parser::Parser::new(tokens, file).parse_program()?;
    let mut compiler = Compiler::new(file);
    compiler.compile(&program)?;
    let mut vm = Vm::new(compiler.bytecode());
    vm.run()?;
    Ok(vm.last_popped().clone())
}
