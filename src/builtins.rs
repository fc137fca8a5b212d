use std::cell::RefCell;
use std::fmt;
use std::io::{BufRead, Write};
use std::rc::Rc;

use crate::value::{HashKey, HashPair, RuntimeError, Value, ARRAY_TYPE, HASH_TYPE};

pub type BuiltinFunction = fn(&[Value]) -> Result<Value, RuntimeError>;

/// A host function callable from scripts. The VM reaches builtins through
/// `GetBuiltin i`, which indexes [`BUILTINS`]; the compiler registers the
/// same list, in the same order, in its symbol table.
pub struct Builtin {
    pub name: &'static str,
    pub func: BuiltinFunction,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// The fixed builtin registry. Order is part of the bytecode contract: the
/// `GetBuiltin` operand is an index into this slice.
pub static BUILTINS: &[Builtin] = &[
    Builtin {
        name: "len",
        func: builtin_len,
    },
    Builtin {
        name: "print",
        func: builtin_print,
    },
    Builtin {
        name: "puts",
        func: builtin_puts,
    },
    Builtin {
        name: "type",
        func: builtin_type,
    },
    Builtin {
        name: "first",
        func: builtin_first,
    },
    Builtin {
        name: "last",
        func: builtin_last,
    },
    Builtin {
        name: "tail",
        func: builtin_tail,
    },
    Builtin {
        name: "push",
        func: builtin_push,
    },
    Builtin {
        name: "pop",
        func: builtin_pop,
    },
    Builtin {
        name: "shift",
        func: builtin_shift,
    },
    Builtin {
        name: "sort",
        func: builtin_sort,
    },
    Builtin {
        name: "keys",
        func: builtin_keys,
    },
    Builtin {
        name: "values",
        func: builtin_values,
    },
    Builtin {
        name: "update",
        func: builtin_update,
    },
    Builtin {
        name: "clear",
        func: builtin_clear,
    },
    Builtin {
        name: "empty",
        func: builtin_empty,
    },
    Builtin {
        name: "remove",
        func: builtin_remove,
    },
    Builtin {
        name: "input",
        func: builtin_input,
    },
];

pub fn lookup(name: &str) -> Option<&'static Builtin> {
    BUILTINS.iter().find(|b| b.name == name)
}

// ── Argument checking helpers ────────────────────────────────────────

fn expect_arity(name: &str, args: &[Value], want: usize) -> Result<(), RuntimeError> {
    if args.len() != want {
        return Err(RuntimeError::new(format!(
            "wrong number of arguments for '{}'. got={}, want={}",
            name,
            args.len(),
            want
        )));
    }
    Ok(())
}

fn expect_array<'a>(
    name: &str,
    value: &'a Value,
) -> Result<&'a Rc<RefCell<Vec<Value>>>, RuntimeError> {
    match value {
        Value::Array(elements) => Ok(elements),
        other => Err(RuntimeError::new(format!(
            "argument to '{}' must be {}, got {}",
            name,
            ARRAY_TYPE,
            other.type_name()
        ))),
    }
}

fn expect_hash<'a>(
    name: &str,
    value: &'a Value,
) -> Result<&'a Rc<RefCell<std::collections::HashMap<HashKey, HashPair>>>, RuntimeError> {
    match value {
        Value::Hash(pairs) => Ok(pairs),
        other => Err(RuntimeError::new(format!(
            "argument to '{}' must be {}, got {}",
            name,
            HASH_TYPE,
            other.type_name()
        ))),
    }
}

// ── Builtin implementations ──────────────────────────────────────────

fn builtin_len(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("len", args, 1)?;
    match &args[0] {
        Value::Str(s) => Ok(Value::Int(s.len() as i64)),
        Value::Array(elements) => Ok(Value::Int(elements.borrow().len() as i64)),
        Value::Hash(pairs) => Ok(Value::Int(pairs.borrow().len() as i64)),
        other => Err(RuntimeError::new(format!(
            "argument to 'len' not supported, got={}",
            other.type_name()
        ))),
    }
}

fn builtin_print(args: &[Value]) -> Result<Value, RuntimeError> {
    let mut stdout = std::io::stdout();
    for arg in args {
        let _ = write!(stdout, "{}", arg.inspect());
    }
    let _ = stdout.flush();
    Ok(Value::Nil)
}

fn builtin_puts(args: &[Value]) -> Result<Value, RuntimeError> {
    for arg in args {
        println!("{}", arg.inspect());
    }
    Ok(Value::Nil)
}

fn builtin_type(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("type", args, 1)?;
    Ok(Value::Str(args[0].type_name().to_string()))
}

fn builtin_first(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("first", args, 1)?;
    let elements = expect_array("first", &args[0])?;
    let elements = elements.borrow();
    Ok(elements.first().cloned().unwrap_or(Value::Nil))
}

fn builtin_last(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("last", args, 1)?;
    let elements = expect_array("last", &args[0])?;
    let elements = elements.borrow();
    Ok(elements.last().cloned().unwrap_or(Value::Nil))
}

/// Everything but the first element, as a fresh array.
fn builtin_tail(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("tail", args, 1)?;
    let elements = expect_array("tail", &args[0])?;
    let elements = elements.borrow();
    if elements.is_empty() {
        return Ok(Value::Nil);
    }
    Ok(Value::array(elements[1..].to_vec()))
}

fn builtin_push(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("push", args, 2)?;
    let elements = expect_array("push", &args[0])?;
    elements.borrow_mut().push(args[1].clone());
    Ok(Value::Nil)
}

fn builtin_pop(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("pop", args, 1)?;
    let elements = expect_array("pop", &args[0])?;
    let mut elements = elements.borrow_mut();
    Ok(elements.pop().unwrap_or(Value::Nil))
}

fn builtin_shift(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("shift", args, 1)?;
    let elements = expect_array("shift", &args[0])?;
    let mut elements = elements.borrow_mut();
    if elements.is_empty() {
        return Ok(Value::Nil);
    }
    Ok(elements.remove(0))
}

/// In-place ascending sort of an integer array.
fn builtin_sort(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("sort", args, 1)?;
    let elements = expect_array("sort", &args[0])?;
    let mut elements = elements.borrow_mut();

    let mut ints = Vec::with_capacity(elements.len());
    for element in elements.iter() {
        match element {
            Value::Int(i) => ints.push(*i),
            other => {
                return Err(RuntimeError::new(format!(
                    "ARRAY values must be INTEGER, got {}",
                    other.type_name()
                )))
            }
        }
    }
    ints.sort_unstable();

    for (slot, i) in elements.iter_mut().zip(ints) {
        *slot = Value::Int(i);
    }
    Ok(Value::Nil)
}

fn builtin_keys(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("keys", args, 1)?;
    let pairs = expect_hash("keys", &args[0])?;
    let pairs = pairs.borrow();
    if pairs.is_empty() {
        return Ok(Value::Nil);
    }
    let keys: Vec<Value> = pairs
        .values()
        .map(|pair| Value::Str(pair.key.inspect()))
        .collect();
    Ok(Value::array(keys))
}

fn builtin_values(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("values", args, 1)?;
    let pairs = expect_hash("values", &args[0])?;
    let pairs = pairs.borrow();
    if pairs.is_empty() {
        return Ok(Value::Nil);
    }
    let values: Vec<Value> = pairs
        .values()
        .map(|pair| Value::Str(pair.value.inspect()))
        .collect();
    Ok(Value::array(values))
}

/// Merge the second hash's pairs into the first, overwriting on key clash.
fn builtin_update(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("update", args, 2)?;
    let target = expect_hash("update", &args[0])?;
    let source = expect_hash("update", &args[1])?;
    if Rc::ptr_eq(target, source) {
        return Ok(Value::Nil);
    }
    let mut target = target.borrow_mut();
    for (key, pair) in source.borrow().iter() {
        target.insert(*key, pair.clone());
    }
    Ok(Value::Nil)
}

fn builtin_clear(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("clear", args, 1)?;
    match &args[0] {
        Value::Array(elements) => {
            elements.borrow_mut().clear();
            Ok(Value::Nil)
        }
        Value::Hash(pairs) => {
            pairs.borrow_mut().clear();
            Ok(Value::Nil)
        }
        other => Err(RuntimeError::new(format!(
            "argument to 'clear' must be ARRAY or HASH, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_empty(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("empty", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(Value::Bool(elements.borrow().is_empty())),
        Value::Hash(pairs) => Ok(Value::Bool(pairs.borrow().is_empty())),
        Value::Str(s) => Ok(Value::Bool(s.is_empty())),
        other => Err(RuntimeError::new(format!(
            "argument to 'empty' must be ARRAY, HASH or STRING, got {}",
            other.type_name()
        ))),
    }
}

/// Remove the first element (array) or the pair (hash) whose rendering
/// matches the second argument's rendering.
fn builtin_remove(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("remove", args, 2)?;
    let target = args[1].inspect();
    match &args[0] {
        Value::Array(elements) => {
            let mut elements = elements.borrow_mut();
            if let Some(idx) = elements.iter().position(|e| e.inspect() == target) {
                elements.remove(idx);
            }
            Ok(Value::Nil)
        }
        Value::Hash(pairs) => {
            let mut pairs = pairs.borrow_mut();
            let found = pairs
                .iter()
                .find(|(_, pair)| pair.key.inspect() == target)
                .map(|(key, _)| *key);
            if let Some(key) = found {
                pairs.remove(&key);
            }
            Ok(Value::Nil)
        }
        other => Err(RuntimeError::new(format!(
            "argument to 'remove' must be ARRAY or HASH, got {}",
            other.type_name()
        ))),
    }
}

/// Read one line from stdin, optionally printing a string prompt first. The
/// returned string keeps its trailing newline.
fn builtin_input(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.len() > 1 {
        return Err(RuntimeError::new(format!(
            "wrong number of arguments for 'input'. got={}, want=0 or 1",
            args.len()
        )));
    }
    if let Some(prompt) = args.first() {
        match prompt {
            Value::Str(s) => {
                let mut stdout = std::io::stdout();
                let _ = write!(stdout, "{}", s);
                let _ = stdout.flush();
            }
            other => {
                return Err(RuntimeError::new(format!(
                    "argument to 'input' must be STRING, got {}",
                    other.type_name()
                )))
            }
        }
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|err| RuntimeError::new(format!("error reading standard input: {}", err)))?;
    Ok(Value::Str(line))
}
