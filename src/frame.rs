use std::rc::Rc;

use crate::opcode::Instructions;
use crate::value::Closure;

/// One in-progress call: the closure being executed, the offset of the next
/// instruction to fetch, and the stack index where the frame's locals begin.
#[derive(Debug)]
pub struct Frame {
    pub closure: Rc<Closure>,
    pub ip: usize,
    pub base_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
        Self {
            closure,
            ip: 0,
            base_pointer,
        }
    }

    pub fn instructions(&self) -> &Instructions {
        &self.closure.func.instructions
    }
}
