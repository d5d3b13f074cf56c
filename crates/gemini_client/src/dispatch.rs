use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

use crate::error::Result;
use crate::gemtext::{self, Node, NodeType};

/// Line kinds a rewriter can be registered against. Only `Plain` and `Link`
/// are ever actually routed to today (§4.7's reserved prefixes all surface
/// as `Text` nodes, which fall to `Plain`); the rest reserve their slot in
/// the registration API for a future lexer that tokenizes them distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineKind {
    Plain,
    Link,
    Heading,
    List,
    Block,
    Prefmt,
}

impl LineKind {
    fn for_node(node: &Node) -> LineKind {
        match node.node_type() {
            NodeType::Link => LineKind::Link,
            NodeType::Text | NodeType::List => LineKind::Plain,
        }
    }
}

type RewriteFn = dyn Fn(&Node) -> String + Send + Sync;

struct RewriteChannel {
    tx: SyncSender<Node>,
    rx: Arc<Mutex<Receiver<Node>>>,
    f: Arc<RewriteFn>,
}

/// Walks a parsed Gemtext tree, dispatching each node to the rewriter
/// registered for its line kind and collecting the results.
///
/// Each dispatched node is handed to a fresh one-shot worker thread that
/// reads exactly one value from the line kind's shared channel, applies the
/// rewriter, and forwards the string to an accumulator thread — a direct
/// transliteration of the source's `spawn`/`errgroup` pair. Completion order
/// across workers is unspecified; callers who need ordering consult
/// `Node::pos()` themselves.
pub struct Dispatcher {
    rules: RwLock<HashMap<LineKind, RewriteChannel>>,
    closed: AtomicBool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// A dispatcher pre-registered with the reference rewriters: `Plain`
    /// lines prefixed with a newline, `Link` lines rendered as `[+] ...`.
    pub fn with_default_rewriters() -> Self {
        let d = Self::new();
        d.attach(LineKind::Plain, |n| format!("\n{n}"));
        d.attach(LineKind::Link, |n| format!("\n[+] {n}"));
        d
    }

    /// Registers or replaces the rewriter for a line kind, with a fresh
    /// rendezvous channel. Replacing an existing registration drops its old
    /// channel, which unblocks any worker still parked on it.
    pub fn attach(&self, kind: LineKind, f: impl Fn(&Node) -> String + Send + Sync + 'static) {
        let mut rules = self.rules.write().expect("dispatch rules lock poisoned");
        let (tx, rx) = mpsc::sync_channel(0);
        rules.insert(
            kind,
            RewriteChannel {
                tx,
                rx: Arc::new(Mutex::new(rx)),
                f: Arc::new(f),
            },
        );
    }

    /// Reads the full body, parses it as Gemtext, and returns the
    /// concatenation of each dispatched node's rewritten form.
    pub fn retrieve(&self, body: String) -> Result<String> {
        let root = gemtext::parse(body)?;
        let rules = self.rules.write().expect("dispatch rules lock poisoned");

        let (acc_tx, acc_rx) = mpsc::channel::<String>();
        let accumulator = thread::spawn(move || {
            let mut out = String::new();
            for chunk in acc_rx {
                out.push_str(&chunk);
            }
            out
        });

        let mut workers = Vec::new();
        for node in root.nodes {
            let kind = LineKind::for_node(&node);
            let Some(channel) = rules.get(&kind) else {
                continue;
            };

            let rx = Arc::clone(&channel.rx);
            let f = Arc::clone(&channel.f);
            let acc_tx = acc_tx.clone();
            workers.push(thread::spawn(move || {
                if let Ok(n) = rx.lock().expect("rewrite channel lock poisoned").recv() {
                    let _ = acc_tx.send(f(&n));
                }
            }));

            let _ = channel.tx.send(node);
        }

        for w in workers {
            let _ = w.join();
        }
        drop(acc_tx);

        Ok(accumulator.join().expect("accumulator thread panicked"))
    }

    /// Idempotent: the first call drops every rewriter channel (unblocking
    /// any parked worker); later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.rules.write().expect("dispatch rules lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn dispatch_routing_multiset_equality() {
        let d = Dispatcher::new();
        d.attach(LineKind::Plain, |n| format!("T:{n}"));
        d.attach(LineKind::Link, |n| format!("L:{}", n.to_string().split(' ').next().unwrap_or("")));

        let out = d.retrieve("hello\n=> g://x/ h\n".to_string()).unwrap();
        // Order is unspecified; compare as a multiset of the two expected
        // fragments rather than a fixed concatenation.
        let expected: HashSet<&str> = ["T:hello", "L:g://x/"].into_iter().collect();
        let mut found: HashSet<String> = HashSet::new();
        if out.contains("T:hello") {
            found.insert("T:hello".to_string());
        }
        if out.contains("L:g://x/") {
            found.insert("L:g://x/".to_string());
        }
        assert_eq!(found.len(), expected.len());
        assert_eq!(out.len(), "T:hello".len() + "L:g://x/".len());
    }

    #[test]
    fn empty_document_produces_empty_output() {
        let d = Dispatcher::with_default_rewriters();
        let out = d.retrieve(String::new()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn reserved_prefix_lines_route_to_plain() {
        let d = Dispatcher::new();
        d.attach(LineKind::Plain, |_| "P".to_string());
        let out = d.retrieve("# not a distinct heading token yet\n".to_string()).unwrap();
        assert_eq!(out, "P");
    }

    #[test]
    fn close_is_idempotent() {
        let d = Dispatcher::with_default_rewriters();
        d.close();
        d.close();
    }

    #[test]
    fn unregistered_kind_is_silently_skipped() {
        let d = Dispatcher::new();
        d.attach(LineKind::Plain, |_| "P".to_string());
        let out = d.retrieve("hello\n=> g://x/\n".to_string()).unwrap();
        assert_eq!(out, "P");
    }
}
