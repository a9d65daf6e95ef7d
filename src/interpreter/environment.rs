use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::object::Object;

/// A scope of name bindings chained to its enclosing scope. Shared through `Rc` so closures
/// keep their defining scope alive after the call that created it returns
#[derive(Default)]
pub struct Environment {
    values: RefCell<HashMap<String, Object>>,
    enclosing: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new_global() -> Rc<Environment> {
        Rc::new(Environment::default())
    }

    pub fn open_scope(self: &Rc<Self>) -> Rc<Environment> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: Some(self.clone()),
        })
    }

    // Always binds in this scope, shadowing any outer binding of the same name
    pub fn bind(&self, name: &str, value: Object) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Object> {
        if let Some(value) = self.values.borrow().get(name) {
            return Some(value.clone());
        }
        self.enclosing
            .as_ref()
            .and_then(|enclosing| enclosing.lookup(name))
    }
}
