use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::{Expr, InfixOp, PrefixOp, Stmt};
use crate::builtins::BUILTINS;
use crate::lexer::Pos;
use crate::opcode::{make, Instructions, Op};
use crate::symbol::{Symbol, SymbolScope, SymbolTable};
use crate::trace::trace_log;
use crate::value::{CompileError, CompiledFunction, Value};

/// The compiler's output: top-level instructions plus the constant pool they
/// reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Value>,
}

#[derive(Debug, Clone, Copy)]
struct EmittedInstruction {
    opcode: Op,
    position: usize,
}

/// Back-patch bookkeeping for one enclosing `for`/`loop` expression.
#[derive(Debug, Default)]
struct LoopContext {
    break_jumps: Vec<usize>,
    continue_jumps: Vec<usize>,
}

/// Per-function emission state. The top-level program compiles into scope 0;
/// every function literal pushes a fresh scope for its body.
struct CompilationScope {
    instructions: Instructions,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
    loops: Vec<LoopContext>,
}

impl CompilationScope {
    fn new() -> Self {
        Self {
            instructions: Instructions::new(),
            last_instruction: None,
            previous_instruction: None,
            loops: Vec::new(),
        }
    }
}

pub struct Compiler {
    file: String,
    constants: Rc<RefCell<Vec<Value>>>,
    symbol_table: Rc<RefCell<SymbolTable>>,
    scopes: Vec<CompilationScope>,
}

impl Compiler {
    pub fn new(file: &str) -> Self {
        let mut table = SymbolTable::new();
        for (i, builtin) in BUILTINS.iter().enumerate() {
            table.define_builtin(i, builtin.name);
        }
        Self::with_state(
            file,
            Rc::new(RefCell::new(table)),
            Rc::new(RefCell::new(Vec::new())),
        )
    }

    /// Reuse an existing symbol table and constant pool, so a REPL can keep
    /// bindings across inputs. The table must already contain the builtins.
    pub fn with_state(
        file: &str,
        symbol_table: Rc<RefCell<SymbolTable>>,
        constants: Rc<RefCell<Vec<Value>>>,
    ) -> Self {
        Self {
            file: file.to_string(),
            constants,
            symbol_table,
            scopes: vec![CompilationScope::new()],
        }
    }

    pub fn symbol_table(&self) -> Rc<RefCell<SymbolTable>> {
        Rc::clone(&self.symbol_table)
    }

    pub fn constants(&self) -> Rc<RefCell<Vec<Value>>> {
        Rc::clone(&self.constants)
    }

    pub fn compile(&mut self, program: &[Stmt]) -> Result<(), CompileError> {
        for stmt in program {
            self.compile_stmt(stmt)?;
        }
        trace_log!(
            "compile",
            "{} constants, disassembly:\n{}",
            self.constants.borrow().len(),
            self.current_instructions()
        );
        Ok(())
    }

    pub fn bytecode(&self) -> Bytecode {
        Bytecode {
            instructions: self.scopes[0].instructions.clone(),
            constants: self.constants.borrow().clone(),
        }
    }

    // ── Emission helpers ─────────────────────────────────────────────

    fn scope(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("compilation scope stack empty")
    }

    fn current_instructions(&self) -> &Instructions {
        &self.scopes.last().expect("compilation scope stack empty").instructions
    }

    fn current_position(&self) -> usize {
        self.current_instructions().len()
    }

    fn emit(&mut self, op: Op, operands: &[usize]) -> usize {
        let instruction = make(op, operands);
        let position = self.current_position();
        self.scope().instructions.0.extend(instruction);

        let scope = self.scope();
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction {
            opcode: op,
            position,
        });

        position
    }

    fn last_instruction_is(&self, op: Op) -> bool {
        self.scopes
            .last()
            .and_then(|s| s.last_instruction)
            .map_or(false, |last| last.opcode == op)
    }

    fn remove_last_pop(&mut self) {
        let scope = self.scope();
        if let Some(last) = scope.last_instruction {
            scope.instructions.0.truncate(last.position);
            scope.last_instruction = scope.previous_instruction;
            scope.previous_instruction = None;
        }
    }

    fn replace_instruction(&mut self, position: usize, new_instruction: &[u8]) {
        let ins = &mut self.scope().instructions.0;
        ins[position..position + new_instruction.len()].copy_from_slice(new_instruction);
    }

    /// Rewrite the operand of the jump emitted at `op_position`.
    fn change_operand(&mut self, op_position: usize, operand: usize) {
        let op = Op::from_byte(self.current_instructions().0[op_position])
            .expect("patching an unknown opcode");
        self.replace_instruction(op_position, &make(op, &[operand]));
    }

    fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.scope().last_instruction {
            self.replace_instruction(last.position, &make(Op::ReturnValue, &[]));
            if let Some(last) = &mut self.scope().last_instruction {
                last.opcode = Op::ReturnValue;
            }
        }
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::new());
        let enclosed = SymbolTable::new_enclosed(Rc::clone(&self.symbol_table));
        self.symbol_table = Rc::new(RefCell::new(enclosed));
    }

    fn leave_scope(&mut self) -> Instructions {
        let scope = self.scopes.pop().expect("leaving the top-level scope");
        let outer = self
            .symbol_table
            .borrow()
            .outer()
            .expect("function symbol table has no outer table");
        self.symbol_table = outer;
        scope.instructions
    }

    fn add_constant(&mut self, value: Value, pos: Pos) -> Result<usize, CompileError> {
        let mut constants = self.constants.borrow_mut();
        let index = constants.len();
        if index > u16::MAX as usize {
            return Err(self.error(pos, "too many constants (65536 max)"));
        }
        constants.push(value);
        Ok(index)
    }

    fn error(&self, pos: Pos, message: impl Into<String>) -> CompileError {
        CompileError::new(message, &self.file, pos.line, pos.column)
    }

    // ── Statements ───────────────────────────────────────────────────

    fn compile_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Expr { value } => {
                self.compile_expr(value)?;
                self.emit(Op::Pop, &[]);
            }
            Stmt::Var { name, value, pos } => {
                self.compile_expr(value)?;
                let symbol = self.symbol_table.borrow_mut().define(name);
                self.store_symbol(&symbol, *pos)?;
            }
            Stmt::Return { value, pos } => {
                if self.scopes.len() == 1 {
                    return Err(self.error(*pos, "return outside of a function"));
                }
                self.compile_expr(value)?;
                self.emit(Op::ReturnValue, &[]);
            }
            Stmt::Break { pos } => {
                if self.scope().loops.is_empty() {
                    return Err(self.error(*pos, "break outside of a loop"));
                }
                let position = self.emit(Op::Jump, &[9999]);
                if let Some(ctx) = self.scope().loops.last_mut() {
                    ctx.break_jumps.push(position);
                }
            }
            Stmt::Continue { pos } => {
                if self.scope().loops.is_empty() {
                    return Err(self.error(*pos, "continue outside of a loop"));
                }
                let position = self.emit(Op::Jump, &[9999]);
                if let Some(ctx) = self.scope().loops.last_mut() {
                    ctx.continue_jumps.push(position);
                }
            }
        }
        Ok(())
    }

    fn compile_block(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        for stmt in stmts {
            self.compile_stmt(stmt)?;
        }
        Ok(())
    }

    /// Compile a block in value position: its last expression statement's
    /// value is left on the stack. A block that produces no value (empty, or
    /// ending in a binding) contributes Null instead.
    fn compile_value_block(&mut self, stmts: &[Stmt]) -> Result<(), CompileError> {
        self.compile_block(stmts)?;
        if self.last_instruction_is(Op::Pop) {
            self.remove_last_pop();
        } else {
            self.emit(Op::Null, &[]);
        }
        Ok(())
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn compile_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Integer { value, pos } => {
                let idx = self.add_constant(Value::Int(*value), *pos)?;
                self.emit(Op::Constant, &[idx]);
            }
            Expr::Float { value, pos } => {
                let idx = self.add_constant(Value::Float(*value), *pos)?;
                self.emit(Op::Constant, &[idx]);
            }
            Expr::Str { value, pos } => {
                let idx = self.add_constant(Value::Str(value.clone()), *pos)?;
                self.emit(Op::Constant, &[idx]);
            }
            Expr::Boolean { value, .. } => {
                if *value {
                    self.emit(Op::True, &[]);
                } else {
                    self.emit(Op::False, &[]);
                }
            }
            Expr::Null { .. } => {
                self.emit(Op::Null, &[]);
            }
            Expr::Ident { name, pos } => {
                let symbol = SymbolTable::resolve(&self.symbol_table, name)
                    .ok_or_else(|| self.error(*pos, format!("undefined variable {}", name)))?;
                self.load_symbol(&symbol);
            }
            Expr::Prefix { op, right, .. } => {
                self.compile_expr(right)?;
                match op {
                    PrefixOp::Minus => self.emit(Op::Minus, &[]),
                    PrefixOp::Bang => self.emit(Op::Bang, &[]),
                };
            }
            Expr::Infix {
                op, left, right, ..
            } => self.compile_infix(*op, left, right)?,
            Expr::If {
                condition,
                consequence,
                alternative,
                ..
            } => {
                self.compile_expr(condition)?;
                let jump_not_truthy = self.emit(Op::JumpNotTruthy, &[9999]);

                self.compile_value_block(consequence)?;
                let jump_over_alternative = self.emit(Op::Jump, &[9999]);

                let after_consequence = self.current_position();
                self.change_operand(jump_not_truthy, after_consequence);

                match alternative {
                    Some(alternative) => self.compile_value_block(alternative)?,
                    None => {
                        self.emit(Op::Null, &[]);
                    }
                }

                let after_alternative = self.current_position();
                self.change_operand(jump_over_alternative, after_alternative);
            }
            Expr::For {
                init,
                condition,
                step,
                body,
                pos,
            } => {
                self.compile_stmt(init)?;

                let loop_start = self.current_position();
                self.compile_expr(condition)?;
                let exit_jump = self.emit(Op::JumpNotTruthy, &[9999]);

                self.scope().loops.push(LoopContext::default());
                self.compile_block(body)?;
                let ctx = self.scope().loops.pop().expect("loop context pushed above");

                // The step expression's value is stored back into the loop
                // variable; `continue` re-enters here.
                let step_position = self.current_position();
                for jump in ctx.continue_jumps {
                    self.change_operand(jump, step_position);
                }
                self.compile_expr(step)?;
                let name = match init.as_ref() {
                    Stmt::Var { name, .. } => name.clone(),
                    _ => unreachable!("for initializer is a var statement"),
                };
                let symbol = SymbolTable::resolve(&self.symbol_table, &name)
                    .ok_or_else(|| self.error(*pos, format!("undefined variable {}", name)))?;
                self.store_symbol(&symbol, *pos)?;

                self.emit(Op::Jump, &[loop_start]);

                let loop_end = self.current_position();
                self.change_operand(exit_jump, loop_end);
                for jump in ctx.break_jumps {
                    self.change_operand(jump, loop_end);
                }
                // A loop expression evaluates to null.
                self.emit(Op::Null, &[]);
            }
            Expr::Loop { body, .. } => {
                let loop_start = self.current_position();

                self.scope().loops.push(LoopContext::default());
                self.compile_block(body)?;
                let ctx = self.scope().loops.pop().expect("loop context pushed above");

                for jump in ctx.continue_jumps {
                    self.change_operand(jump, loop_start);
                }
                self.emit(Op::Jump, &[loop_start]);

                let loop_end = self.current_position();
                for jump in ctx.break_jumps {
                    self.change_operand(jump, loop_end);
                }
                self.emit(Op::Null, &[]);
            }
            Expr::Function {
                name,
                parameters,
                body,
                pos,
            } => self.compile_function_literal(name.as_deref(), parameters, body, *pos)?,
            Expr::Call {
                function,
                arguments,
                pos,
            } => {
                self.compile_expr(function)?;
                if arguments.len() > u8::MAX as usize {
                    return Err(self.error(*pos, "too many call arguments (255 max)"));
                }
                for argument in arguments {
                    self.compile_expr(argument)?;
                }
                self.emit(Op::Call, &[arguments.len()]);
            }
            Expr::Array { elements, pos } => {
                if elements.len() > u16::MAX as usize {
                    return Err(self.error(*pos, "array literal too large (65535 max)"));
                }
                for element in elements {
                    self.compile_expr(element)?;
                }
                self.emit(Op::Array, &[elements.len()]);
            }
            Expr::HashLiteral { pairs, pos } => {
                if pairs.len() * 2 > u16::MAX as usize {
                    return Err(self.error(*pos, "hash literal too large"));
                }
                // Deterministic emission: keys sorted by their textual
                // rendering.
                let mut sorted: Vec<&(Expr, Expr)> = pairs.iter().collect();
                sorted.sort_by_key(|(key, _)| key.to_string());
                for (key, value) in sorted {
                    self.compile_expr(key)?;
                    self.compile_expr(value)?;
                }
                self.emit(Op::Hash, &[pairs.len() * 2]);
            }
            Expr::Index { left, index, .. } => {
                self.compile_expr(left)?;
                self.compile_expr(index)?;
                self.emit(Op::Index, &[]);
            }
            Expr::Assign { name, value, pos } => {
                let symbol = self.resolve_assignable(name, *pos)?;
                self.compile_expr(value)?;
                self.store_symbol(&symbol, *pos)?;
                self.load_symbol(&symbol);
            }
            Expr::CompoundAssign {
                op,
                name,
                value,
                pos,
            } => {
                let symbol = self.resolve_assignable(name, *pos)?;
                self.load_symbol(&symbol);
                self.compile_expr(value)?;
                self.emit_infix_op(*op);
                self.store_symbol(&symbol, *pos)?;
                self.load_symbol(&symbol);
            }
            Expr::IncDec {
                name,
                increment,
                pos,
            } => {
                let symbol = self.resolve_assignable(name, *pos)?;
                self.load_symbol(&symbol);
                let one = self.add_constant(Value::Int(1), *pos)?;
                self.emit(Op::Constant, &[one]);
                self.emit(if *increment { Op::Add } else { Op::Sub }, &[]);
                self.store_symbol(&symbol, *pos)?;
                self.load_symbol(&symbol);
            }
            Expr::AssignIndex {
                left, index, value, ..
            } => {
                self.compile_expr(left)?;
                self.compile_expr(index)?;
                self.compile_expr(value)?;
                self.emit(Op::SetIndex, &[]);
            }
        }
        Ok(())
    }

    fn compile_infix(
        &mut self,
        op: InfixOp,
        left: &Expr,
        right: &Expr,
    ) -> Result<(), CompileError> {
        match op {
            // `<` and `>=` compile with swapped operands; there is no
            // dedicated less-than opcode.
            InfixOp::Lt => {
                self.compile_expr(right)?;
                self.compile_expr(left)?;
                self.emit(Op::GreaterThan, &[]);
            }
            InfixOp::Ge => {
                self.compile_expr(right)?;
                self.compile_expr(left)?;
                self.emit(Op::GreaterThan, &[]);
                self.emit(Op::Bang, &[]);
            }
            InfixOp::Le => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit(Op::GreaterThan, &[]);
                self.emit(Op::Bang, &[]);
            }
            _ => {
                self.compile_expr(left)?;
                self.compile_expr(right)?;
                self.emit_infix_op(op);
            }
        }
        Ok(())
    }

    fn emit_infix_op(&mut self, op: InfixOp) {
        match op {
            InfixOp::Add => self.emit(Op::Add, &[]),
            InfixOp::Sub => self.emit(Op::Sub, &[]),
            InfixOp::Mul => self.emit(Op::Mul, &[]),
            InfixOp::Div => self.emit(Op::Div, &[]),
            InfixOp::Mod => self.emit(Op::Mod, &[]),
            InfixOp::Gt => self.emit(Op::GreaterThan, &[]),
            InfixOp::Eq => self.emit(Op::Equal, &[]),
            InfixOp::NotEq => self.emit(Op::NotEqual, &[]),
            InfixOp::And => self.emit(Op::And, &[]),
            InfixOp::Or => self.emit(Op::Or, &[]),
            InfixOp::Lt | InfixOp::Le | InfixOp::Ge => {
                unreachable!("comparison {} lowers through compile_infix", op)
            }
        };
    }

    fn compile_function_literal(
        &mut self,
        name: Option<&str>,
        parameters: &[String],
        body: &[Stmt],
        pos: Pos,
    ) -> Result<(), CompileError> {
        if parameters.len() > u8::MAX as usize {
            return Err(self.error(pos, "too many parameters (255 max)"));
        }

        self.enter_scope();

        if let Some(name) = name {
            self.symbol_table.borrow_mut().define_function_name(name);
        }
        for parameter in parameters {
            self.symbol_table.borrow_mut().define(parameter);
        }

        self.compile_block(body)?;

        // The body's value is its return value; a body without one returns
        // null.
        if self.last_instruction_is(Op::Pop) {
            self.replace_last_pop_with_return();
        }
        if !self.last_instruction_is(Op::ReturnValue) {
            self.emit(Op::Return, &[]);
        }

        let free_symbols = self.symbol_table.borrow().free_symbols.clone();
        let num_locals = self.symbol_table.borrow().num_definitions;
        let instructions = self.leave_scope();

        if free_symbols.len() > u8::MAX as usize {
            return Err(self.error(pos, "too many captured variables (255 max)"));
        }
        if num_locals > u8::MAX as usize + 1 {
            return Err(self.error(pos, "too many locals in function (256 max)"));
        }

        // Load every captured binding so the Closure instruction can
        // snapshot them off the stack.
        for free in &free_symbols {
            self.load_symbol(free);
        }

        let function = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        };
        let idx = self.add_constant(Value::Function(Rc::new(function)), pos)?;
        self.emit(Op::Closure, &[idx, free_symbols.len()]);
        Ok(())
    }

    // ── Symbols ──────────────────────────────────────────────────────

    fn load_symbol(&mut self, symbol: &Symbol) {
        match symbol.scope {
            SymbolScope::Global => self.emit(Op::GetGlobal, &[symbol.index]),
            SymbolScope::Local => self.emit(Op::GetLocal, &[symbol.index]),
            SymbolScope::Builtin => self.emit(Op::GetBuiltin, &[symbol.index]),
            SymbolScope::Free => self.emit(Op::GetFree, &[symbol.index]),
            SymbolScope::Function => self.emit(Op::CurrentClosure, &[]),
        };
    }

    fn store_symbol(&mut self, symbol: &Symbol, pos: Pos) -> Result<(), CompileError> {
        match symbol.scope {
            SymbolScope::Global => {
                if symbol.index > u16::MAX as usize {
                    return Err(self.error(pos, "too many global variables (65536 max)"));
                }
                self.emit(Op::SetGlobal, &[symbol.index]);
            }
            SymbolScope::Local => {
                if symbol.index > u8::MAX as usize {
                    return Err(self.error(pos, "too many local variables (256 max)"));
                }
                self.emit(Op::SetLocal, &[symbol.index]);
            }
            _ => {
                return Err(self.error(
                    pos,
                    format!("cannot assign to {}", symbol.name),
                ))
            }
        }
        Ok(())
    }

    fn resolve_assignable(&mut self, name: &str, pos: Pos) -> Result<Symbol, CompileError> {
        let symbol = SymbolTable::resolve(&self.symbol_table, name)
            .ok_or_else(|| self.error(pos, format!("undefined variable {}", name)))?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Local => Ok(symbol),
            SymbolScope::Free => Err(self.error(
                pos,
                format!("cannot assign to captured variable {}", name),
            )),
            SymbolScope::Builtin | SymbolScope::Function => {
                Err(self.error(pos, format!("cannot assign to {}", name)))
            }
        }
    }
}
