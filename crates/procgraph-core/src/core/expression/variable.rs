use super::value::ExpressionValue;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A named scalar that expressions can refer to.
///
/// Variables are shared through `Rc` between the node that owns them and every
/// expression compiled against them, so updating the value is seen by the next
/// evaluation of those expressions.
#[derive(Debug)]
pub struct ExpressionVariable {
    name: RefCell<String>,
    value: Cell<ExpressionValue>,
}

impl ExpressionVariable {
    pub fn new(name: &str, value: ExpressionValue) -> Rc<Self> {
        Rc::new(Self {
            name: RefCell::new(name.to_string()),
            value: Cell::new(value),
        })
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.borrow().eq_ignore_ascii_case(name)
    }

    pub fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_string();
    }

    pub fn value(&self) -> ExpressionValue {
        self.value.get()
    }

    pub fn set_value(&self, value: impl Into<ExpressionValue>) {
        self.value.set(value.into());
    }
}

/// Finds a variable by name (ignoring case) in a parameter list.
pub fn find_variable(
    params: &[Rc<ExpressionVariable>],
    name: &str,
) -> Option<Rc<ExpressionVariable>> {
    params.iter().find(|p| p.has_name(name)).cloned()
}
