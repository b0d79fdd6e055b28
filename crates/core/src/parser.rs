//! Result-parser registry.
//!
//! Test definitions record which parser turns their raw captured output into
//! named metrics. The registry maps that string id to a constructor; it is
//! populated at startup, replacing load-a-class-by-name reflection with a
//! static lookup.

use std::collections::HashMap;

/// Turns raw captured stdout/stderr into named metrics. Implementations are
/// pure, stateless text transforms.
pub trait ResultParser: Send + Sync {
    fn parse(&self, stdout: &str, stderr: &str) -> HashMap<String, f64>;
}

type ParserCtor = fn() -> Box<dyn ResultParser>;

#[derive(Default)]
pub struct ParserRegistry {
    ctors: HashMap<String, ParserCtor>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, ctor: ParserCtor) {
        self.ctors.insert(id.into(), ctor);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ctors.contains_key(id)
    }

    pub fn create(&self, id: &str) -> Option<Box<dyn ResultParser>> {
        self.ctors.get(id).map(|ctor| ctor())
    }
}
