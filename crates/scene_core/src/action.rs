//! Named, parameterized commands executable on an entity.
//!
//! Actions let higher-level logic be built in a data-driven fashion:
//! scripts and components register handlers on an action by name, and any
//! collaborator can trigger it locally and/or signal it for remote
//! execution.

/// Where an action executes. Values OR together: `LOCAL | PEERS` runs the
/// local handlers and asks the sync layer to forward to all other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExecScope(pub u8);

impl ExecScope {
    /// Run handlers in this process.
    pub const LOCAL: ExecScope = ExecScope(1);
    /// Forward to the server.
    pub const SERVER: ExecScope = ExecScope(2);
    /// Forward to all peer clients.
    pub const PEERS: ExecScope = ExecScope(4);

    #[must_use]
    pub const fn contains(self, other: ExecScope) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when the action must be forwarded beyond this process.
    #[must_use]
    pub const fn is_remote(self) -> bool {
        self.0 & (Self::SERVER.0 | Self::PEERS.0) != 0
    }
}

impl std::ops::BitOr for ExecScope {
    type Output = ExecScope;

    fn bitor(self, rhs: ExecScope) -> ExecScope {
        ExecScope(self.0 | rhs.0)
    }
}

/// Handler invoked with the action's parameter list.
pub type ActionHandler = Box<dyn FnMut(&[String])>;

/// An executable command on an entity, identified by case-insensitive name.
pub struct EntityAction {
    name: String,
    handlers: Vec<ActionHandler>,
}

impl EntityAction {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            handlers: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a local handler.
    pub fn connect(&mut self, handler: impl FnMut(&[String]) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    pub(crate) fn trigger(&mut self, params: &[String]) {
        for handler in &mut self.handlers {
            handler(params);
        }
    }
}

impl std::fmt::Debug for EntityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityAction")
            .field("name", &self.name)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_scope_combination() {
        let scope = ExecScope::LOCAL | ExecScope::PEERS;
        assert!(scope.contains(ExecScope::LOCAL));
        assert!(scope.contains(ExecScope::PEERS));
        assert!(!scope.contains(ExecScope::SERVER));
        assert!(scope.is_remote());
        assert!(!ExecScope::LOCAL.is_remote());
    }

    #[test]
    fn test_handlers_invoked_with_params() {
        let seen = Rc::new(Cell::new(0usize));
        let seen2 = seen.clone();
        let mut action = EntityAction::new("Jump");
        action.connect(move |params| seen2.set(params.len()));
        action.trigger(&["high".to_string(), "fast".to_string()]);
        assert_eq!(seen.get(), 2);
    }
}
