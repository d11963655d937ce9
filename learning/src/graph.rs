//! Construction graphs.
//!
//! Every `Variable` registers itself with the graph active on the current thread when it is
//! created. Outside of any scope that is the thread's default graph, which lives as long as
//! the thread does. A `GraphScope` pushes a fresh graph on enter and discards it on drop, so
//! the variables created while it is active never reach the default graph.

use std::{cell::RefCell, marker::PhantomData};

use log::debug;

use crate::Variable;

#[derive(Default)]
struct Graph {
    variables: Vec<Variable>,
}

thread_local! {
    static DEFAULT_GRAPH: RefCell<Graph> = RefCell::new(Graph::default());
    static SCOPES: RefCell<Vec<Graph>> = const { RefCell::new(Vec::new()) };
}

pub(crate) fn register(var: &Variable) {
    let scoped = SCOPES.with_borrow_mut(|scopes| match scopes.last_mut() {
        Some(graph) => {
            graph.variables.push(var.clone());
            true
        }
        None => false,
    });

    if !scoped {
        DEFAULT_GRAPH.with_borrow_mut(|graph| graph.variables.push(var.clone()));
    }
}

/// Returns the amount of variables held by this thread's default graph.
pub fn default_graph_variable_count() -> usize {
    DEFAULT_GRAPH.with_borrow(|graph| graph.variables.len())
}

/// Returns the names of the variables held by this thread's default graph.
pub fn default_graph_variable_names() -> Vec<String> {
    DEFAULT_GRAPH.with_borrow(|graph| {
        graph
            .variables
            .iter()
            .map(|var| var.name().to_string())
            .collect()
    })
}

/// Drops every variable held by this thread's default graph.
pub fn reset_default_graph() {
    let graph = DEFAULT_GRAPH.take();
    debug!(variables = graph.variables.len(); "reset default graph");
}

/// Returns how many scopes are active on this thread.
pub fn scope_depth() -> usize {
    SCOPES.with_borrow(Vec::len)
}

/// A disposable construction graph.
///
/// While the guard is alive new variables register with its graph. Dropping the guard,
/// also while unwinding, discards that graph and restores the previous one.
pub struct GraphScope {
    depth: usize,
    // Scopes are thread-local, the guard must stay on the thread that created it.
    _not_send: PhantomData<*const ()>,
}

impl GraphScope {
    /// Enters a new construction scope on the current thread.
    pub fn enter() -> Self {
        let depth = SCOPES.with_borrow_mut(|scopes| {
            scopes.push(Graph::default());
            scopes.len()
        });

        debug!(depth = depth; "entered construction scope");
        Self {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Returns the amount of variables created inside this scope so far.
    pub fn variable_count(&self) -> usize {
        SCOPES.with_borrow(|scopes| {
            scopes
                .get(self.depth - 1)
                .map_or(0, |graph| graph.variables.len())
        })
    }
}

impl Drop for GraphScope {
    fn drop(&mut self) {
        let discarded: Vec<Graph> = SCOPES.with_borrow_mut(|scopes| {
            let keep = (self.depth - 1).min(scopes.len());
            scopes.split_off(keep)
        });

        let variables: usize = discarded.iter().map(|g| g.variables.len()).sum();
        debug!(depth = self.depth, variables = variables; "left construction scope");
    }
}

/// Runs `f` inside a fresh construction scope.
pub fn scoped<T>(f: impl FnOnce() -> T) -> T {
    let _scope = GraphScope::enter();
    f()
}
