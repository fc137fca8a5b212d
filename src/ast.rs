use std::fmt;

use crate::lexer::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Minus,
    Bang,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrefixOp::Minus => "-",
            PrefixOp::Bang => "!",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    NotEq,
    And,
    Or,
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InfixOp::Add => "+",
            InfixOp::Sub => "-",
            InfixOp::Mul => "*",
            InfixOp::Div => "/",
            InfixOp::Mod => "%",
            InfixOp::Lt => "<",
            InfixOp::Gt => ">",
            InfixOp::Le => "<=",
            InfixOp::Ge => ">=",
            InfixOp::Eq => "==",
            InfixOp::NotEq => "!=",
            InfixOp::And => "&&",
            InfixOp::Or => "||",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Var {
        name: String,
        value: Expr,
        pos: Pos,
    },
    Return {
        value: Expr,
        pos: Pos,
    },
    Expr {
        value: Expr,
    },
    Break {
        pos: Pos,
    },
    Continue {
        pos: Pos,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer {
        value: i64,
        pos: Pos,
    },
    Float {
        value: f64,
        pos: Pos,
    },
    Str {
        value: String,
        pos: Pos,
    },
    Boolean {
        value: bool,
        pos: Pos,
    },
    Null {
        pos: Pos,
    },
    Ident {
        name: String,
        pos: Pos,
    },
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
        pos: Pos,
    },
    Infix {
        op: InfixOp,
        left: Box<Expr>,
        right: Box<Expr>,
        pos: Pos,
    },
    If {
        condition: Box<Expr>,
        consequence: Vec<Stmt>,
        alternative: Option<Vec<Stmt>>,
        pos: Pos,
    },
    /// `for (var i = …; cond; step) { … }`. The step expression's value is
    /// stored back into the loop variable after every iteration.
    For {
        init: Box<Stmt>,
        condition: Box<Expr>,
        step: Box<Expr>,
        body: Vec<Stmt>,
        pos: Pos,
    },
    Loop {
        body: Vec<Stmt>,
        pos: Pos,
    },
    /// `name` is filled in when the literal is the direct value of a `var`
    /// binding or an `fn name() {}` statement, enabling self-reference.
    Function {
        name: Option<String>,
        parameters: Vec<String>,
        body: Vec<Stmt>,
        pos: Pos,
    },
    Call {
        function: Box<Expr>,
        arguments: Vec<Expr>,
        pos: Pos,
    },
    Array {
        elements: Vec<Expr>,
        pos: Pos,
    },
    HashLiteral {
        pairs: Vec<(Expr, Expr)>,
        pos: Pos,
    },
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    Assign {
        name: String,
        value: Box<Expr>,
        pos: Pos,
    },
    CompoundAssign {
        op: InfixOp,
        name: String,
        value: Box<Expr>,
        pos: Pos,
    },
    AssignIndex {
        left: Box<Expr>,
        index: Box<Expr>,
        value: Box<Expr>,
        pos: Pos,
    },
    IncDec {
        name: String,
        increment: bool,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Integer { pos, .. }
            | Expr::Float { pos, .. }
            | Expr::Str { pos, .. }
            | Expr::Boolean { pos, .. }
            | Expr::Null { pos }
            | Expr::Ident { pos, .. }
            | Expr::Prefix { pos, .. }
            | Expr::Infix { pos, .. }
            | Expr::If { pos, .. }
            | Expr::For { pos, .. }
            | Expr::Loop { pos, .. }
            | Expr::Function { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Array { pos, .. }
            | Expr::HashLiteral { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Assign { pos, .. }
            | Expr::CompoundAssign { pos, .. }
            | Expr::AssignIndex { pos, .. }
            | Expr::IncDec { pos, .. } => *pos,
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, stmts: &[Stmt]) -> fmt::Result {
    for stmt in stmts {
        write!(f, "{}", stmt)?;
    }
    Ok(())
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Var { name, value, .. } => write!(f, "var {} = {};", name, value),
            Stmt::Return { value, .. } => write!(f, "return {};", value),
            Stmt::Expr { value } => write!(f, "{}", value),
            Stmt::Break { .. } => f.write_str("break;"),
            Stmt::Continue { .. } => f.write_str("continue;"),
        }
    }
}

impl fmt::Display for Expr {
    /// Textual rendering used for diagnostics and for the deterministic
    /// hash-literal key ordering in the compiler.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Integer { value, .. } => write!(f, "{}", value),
            Expr::Float { value, .. } => write!(f, "{:?}", value),
            Expr::Str { value, .. } => f.write_str(value),
            Expr::Boolean { value, .. } => write!(f, "{}", value),
            Expr::Null { .. } => f.write_str("null"),
            Expr::Ident { name, .. } => f.write_str(name),
            Expr::Prefix { op, right, .. } => write!(f, "({}{})", op, right),
            Expr::Infix {
                op, left, right, ..
            } => write!(f, "({} {} {})", left, op, right),
            Expr::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                write!(f, "if{} ", condition)?;
                write_block(f, consequence)?;
                if let Some(alternative) = alternative {
                    f.write_str(" else ")?;
                    write_block(f, alternative)?;
                }
                Ok(())
            }
            Expr::For {
                init,
                condition,
                step,
                body,
                ..
            } => {
                write!(f, "for ({} {}; {}) ", init, condition, step)?;
                write_block(f, body)
            }
            Expr::Loop { body, .. } => {
                f.write_str("loop ")?;
                write_block(f, body)
            }
            Expr::Function {
                name, parameters, ..
            } => {
                if let Some(name) = name {
                    write!(f, "fn {}({})", name, parameters.join(", "))
                } else {
                    write!(f, "fn({})", parameters.join(", "))
                }
            }
            Expr::Call {
                function,
                arguments,
                ..
            } => {
                let args: Vec<String> = arguments.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function, args.join(", "))
            }
            Expr::Array { elements, .. } => {
                let elems: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
                write!(f, "[{}]", elems.join(", "))
            }
            Expr::HashLiteral { pairs, .. } => {
                let rendered: Vec<String> =
                    pairs.iter().map(|(k, v)| format!("{}:{}", k, v)).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Expr::Index { left, index, .. } => write!(f, "({}[{}])", left, index),
            Expr::Assign { name, value, .. } => write!(f, "({} = {})", name, value),
            Expr::CompoundAssign {
                op, name, value, ..
            } => write!(f, "({} {}= {})", name, op, value),
            Expr::AssignIndex {
                left, index, value, ..
            } => write!(f, "({}[{}] = {})", left, index, value),
            Expr::IncDec {
                name, increment, ..
            } => {
                if *increment {
                    write!(f, "({}++)", name)
                } else {
                    write!(f, "({}--)", name)
                }
            }
        }
    }
}
