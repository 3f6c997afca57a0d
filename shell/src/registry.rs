use crate::builtin::{self, BuiltinCommand, Cat, Cd, Echo, Grep, Kill, Ps, Pwd, Wc};
use crate::command::Handler;
use crate::error::ShellError;
use crate::executable::{Executable, InternalCommand};
use crate::external::ExternalCommand;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

/// Mapping from command name to built-in handler.
///
/// A registry is assembled once at startup and then handed to the
/// [`Interpreter`](crate::Interpreter), which only ever reads it.
#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Handler>,
}

impl Registry {
    /// An empty registry: every command resolves to an external program.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shell's own built-ins: `cd`, `pwd`, `echo`, `kill`, `cat`, `wc`, `grep` and `ps`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register_builtin::<Cd>()
            .register_builtin::<Pwd>()
            .register_builtin::<Echo>()
            .register_builtin::<Kill>()
            .register_builtin::<Cat>()
            .register_builtin::<Wc>()
            .register_builtin::<Grep>()
            .register_builtin::<Ps>();
        registry
    }

    /// Add (or replace) a built-in under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&[String], &mut dyn Read, &mut dyn Write) -> Result<(), ShellError>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    fn register_builtin<T: BuiltinCommand + 'static>(&mut self) -> &mut Self {
        self.register(T::name(), builtin::invoke::<T>)
    }

    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Turn a command name into an executable unit.
    ///
    /// Built-ins always win over programs of the same name. Resolution never
    /// fails: an unknown external name only fails when it is run.
    pub fn resolve(&self, name: &str, args: Vec<String>) -> Executable {
        match self.get(name) {
            Some(handler) => Executable::Internal(InternalCommand::new(name, Arc::clone(handler), args)),
            None => Executable::External(ExternalCommand::new(name, args)),
        }
    }
}
