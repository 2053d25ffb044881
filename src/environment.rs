//! Lexically scoped variable bindings.
//!
//! Every scope holds its own bindings plus a shared link to the scope that was
//! active when it was created. Child scopes are dropped when the block that
//! opened them exits; the parent stays alive as long as anything links to it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::{RuntimeError, RuntimeErrorKind};
use crate::scanner::Token;
use crate::value::Value;

#[derive(Debug, Default)]
struct Scope {
    values: HashMap<String, Value>,
    enclosing: Option<Environment>,
}

/// Handle to one scope in the chain. Cloning shares the scope.
#[derive(Debug, Clone, Default)]
pub struct Environment(Rc<RefCell<Scope>>);

impl Environment {
    /// Create a top-level scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope nested inside `enclosing`.
    pub fn with_enclosing(enclosing: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Scope {
            values: HashMap::new(),
            enclosing: Some(enclosing.clone()),
        })))
    }

    #[cfg(test)]
    fn enclosing(&self) -> Option<Environment> {
        self.0.borrow().enclosing.clone()
    }

    /// Bind `name` in this scope, replacing any previous binding here.
    pub fn define(&self, name: &str, value: Value) {
        tracing::trace!(name, %value, "define");
        self.0.borrow_mut().values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        let scope = self.0.borrow();
        if let Some(value) = scope.values.get(&name.lexeme) {
            return Ok(value.clone());
        }
        match &scope.enclosing {
            Some(enclosing) => enclosing.get(name),
            None => Err(undefined(name)),
        }
    }

    /// Overwrite the nearest existing binding of `name`. Never creates one.
    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        let mut scope = self.0.borrow_mut();
        if let Some(slot) = scope.values.get_mut(&name.lexeme) {
            *slot = value;
            return Ok(());
        }
        match &scope.enclosing {
            Some(enclosing) => enclosing.assign(name, value),
            None => Err(undefined(name)),
        }
    }
}

fn undefined(name: &Token) -> RuntimeError {
    RuntimeError::new(name, RuntimeErrorKind::UndefinedVariable(name.lexeme.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::Identifier, name, None, 1, 1)
    }

    #[test]
    fn define_then_get() {
        let env = Environment::new();
        env.define("x", Value::Number(42.0));
        assert_eq!(env.get(&ident("x")), Ok(Value::Number(42.0)));
    }

    #[test]
    fn redefinition_overwrites() {
        let env = Environment::new();
        env.define("x", Value::Number(1.0));
        env.define("x", Value::from("two"));
        assert_eq!(env.get(&ident("x")), Ok(Value::from("two")));
    }

    #[test]
    fn lookup_walks_the_chain() {
        let global = Environment::new();
        global.define("x", Value::Number(1.0));
        let inner = Environment::with_enclosing(&Environment::with_enclosing(&global));
        assert_eq!(inner.get(&ident("x")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let global = Environment::new();
        global.define("x", Value::Number(1.0));
        let inner = Environment::with_enclosing(&global);
        inner.define("x", Value::Number(2.0));
        assert_eq!(inner.get(&ident("x")), Ok(Value::Number(2.0)));
        assert_eq!(global.get(&ident("x")), Ok(Value::Number(1.0)));
    }

    #[test]
    fn assign_writes_to_defining_scope() {
        let global = Environment::new();
        global.define("x", Value::Number(1.0));
        let inner = Environment::with_enclosing(&global);
        inner.assign(&ident("x"), Value::Number(5.0)).unwrap();
        assert_eq!(global.get(&ident("x")), Ok(Value::Number(5.0)));
    }

    #[test]
    fn missing_name_is_undefined() {
        let inner = Environment::with_enclosing(&Environment::new());
        let err = inner.get(&ident("nope")).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::UndefinedVariable("nope".to_string()));
        assert_eq!(err.to_string(), "Undefined variable 'nope'.");
    }

    #[test]
    fn assign_never_creates_a_binding() {
        let env = Environment::new();
        assert!(env.assign(&ident("y"), Value::Nil).is_err());
        assert!(env.get(&ident("y")).is_err());
    }

    #[test]
    fn enclosing_link() {
        let global = Environment::new();
        assert!(global.enclosing().is_none());
        let inner = Environment::with_enclosing(&global);
        assert!(inner.enclosing().is_some());
    }
}
