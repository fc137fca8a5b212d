use std::cell::RefCell;
use std::rc::Rc;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::builtins::BUILTINS;
use crate::compiler::Compiler;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::symbol::SymbolTable;
use crate::value::Value;
use crate::vm::{Vm, GLOBALS_SIZE};

const FILE: &str = "<repl>";

/// Check if the input has unbalanced brackets, suggesting more input is
/// needed before parsing.
fn is_incomplete(input: &str) -> bool {
    let mut depth_brace = 0i32;
    let mut depth_paren = 0i32;
    let mut depth_bracket = 0i32;
    let mut in_string = false;
    let mut prev = '\0';

    for ch in input.chars() {
        if in_string {
            if ch == '"' && prev != '\\' {
                in_string = false;
            }
            prev = ch;
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth_brace += 1,
            '}' => depth_brace -= 1,
            '(' => depth_paren += 1,
            ')' => depth_paren -= 1,
            '[' => depth_bracket += 1,
            ']' => depth_bracket -= 1,
            _ => {}
        }
        prev = ch;
    }

    depth_brace > 0 || depth_paren > 0 || depth_bracket > 0
}

pub fn run_repl() {
    let mut rl = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("Failed to initialize line editor: {}", err);
            std::process::exit(1);
        }
    };

    let history_path = history_path();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    // Compilation and execution state threaded across inputs, so bindings
    // and constants survive from line to line.
    let mut table = SymbolTable::new();
    for (i, builtin) in BUILTINS.iter().enumerate() {
        table.define_builtin(i, builtin.name);
    }
    let symbol_table = Rc::new(RefCell::new(table));
    let constants = Rc::new(RefCell::new(Vec::new()));
    let mut globals = vec![Value::Nil; GLOBALS_SIZE];

    let mut accumulated = String::new();

    loop {
        let prompt = if accumulated.is_empty() { ">> " } else { " * " };

        match rl.readline(prompt) {
            Ok(line) => {
                if accumulated.is_empty() {
                    accumulated = line;
                } else {
                    accumulated.push('\n');
                    accumulated.push_str(&line);
                }

                if is_incomplete(&accumulated) {
                    continue;
                }

                let _ = rl.add_history_entry(&accumulated);
                globals = run_line(&accumulated, &symbol_table, &constants, globals);
                accumulated.clear();
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C: cancel current input
                accumulated.clear();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D: exit
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }
}

fn run_line(
    input: &str,
    symbol_table: &Rc<RefCell<SymbolTable>>,
    constants: &Rc<RefCell<Vec<Value>>>,
    globals: Vec<Value>,
) -> Vec<Value> {
    let tokens = match Lexer::new(input, FILE).tokenize() {
        Ok(tokens) => tokens,
        Err(err) => {
            eprintln!("parser errors:\n\t{}", err);
            return globals;
        }
    };

    let program = match Parser::new(tokens, FILE).parse_program() {
        Ok(program) => program,
        Err(err) => {
            eprintln!("parser errors:\n\t{}", err);
            return globals;
        }
    };

    let mut compiler = Compiler::with_state(FILE, Rc::clone(symbol_table), Rc::clone(constants));
    if let Err(err) = compiler.compile(&program) {
        eprintln!("compilation failed:\n\t{}", err);
        return globals;
    }

    let mut vm = Vm::with_globals(compiler.bytecode(), globals);
    match vm.run() {
        Ok(()) => {
            println!("{}", vm.last_popped().inspect());
        }
        Err(err) => {
            eprintln!("executing bytecode failed:\n\t{}", err);
        }
    }
    vm.into_globals()
}

fn history_path() -> Option<std::path::PathBuf> {
    let home = std::env::var("HOME").ok()?;
    let dir = std::path::PathBuf::from(home).join(".momo");
    let _ = std::fs::create_dir_all(&dir);
    Some(dir.join("history"))
}
