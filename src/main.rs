use std::env;
use std::fs;
use std::process;

use momo::compiler::Compiler;
use momo::lexer::Lexer;
use momo::parser::Parser;
use momo::repl;
use momo::vm::Vm;

const USAGE: &str = "\
usage: momo [path-to-script]

With no arguments momo starts a REPL; with a path it compiles and runs
the file. Pass -help or help to print this message.";

fn main() {
    let args: Vec<String> = env::args().collect();
    match args.len() {
        1 => repl::run_repl(),
        2 => {
            if args[1] == "-help" || args[1] == "help" {
                println!("{}", USAGE);
                return;
            }
            run_file(&args[1]);
        }
        _ => {
            eprintln!("{}", USAGE);
            process::exit(1);
        }
    }
}

fn run_file(path: &str) {
    let source = fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("momo: can't open file '{}': {}", path, err);
        process::exit(1);
    });

    let tokens = Lexer::new(&source, path).tokenize().unwrap_or_else(|err| {
        eprintln!("parser errors:\n\t{}", err);
        process::exit(1);
    });

    let program = Parser::new(tokens, path).parse_program().unwrap_or_else(|err| {
        eprintln!("parser errors:\n\t{}", err);
        process::exit(1);
    });

    let mut compiler = Compiler::new(path);
    if let Err(err) = compiler.compile(&program) {
        eprintln!("compilation failed:\n\t{}", err);
        process::exit(1);
    }

    let mut vm = Vm::new(compiler.bytecode());
    if let Err(err) = vm.run() {
        eprintln!("executing bytecode failed:\n\t{}", err);
        process::exit(1);
    }

    println!("{}", vm.last_popped().inspect());
}
