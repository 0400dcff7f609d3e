//! Quick benchmark of extraction, reference resolution and dispatch

use dataevents::{Document, Engine, MemoryDocument, NodeId};
use std::time::Instant;

const LIGHT: &str = r#"{"events": "activate", "handler": {"on": "green", "off": "red"}}"#;

/// One direct binding followed by `len - 1` nodes, each referencing the previous one
fn chain(len: usize) -> (MemoryDocument, NodeId) {
    let doc = MemoryDocument::new();
    let root = doc.with_attribute(doc.create_node("svg"), "data-at", "");
    for i in 0..len {
        let node = doc.append_child(root, "rect");
        doc.set_attribute(node, "data-id@", &format!("n{}", i));
        if i == 0 {
            doc.set_attribute(node, "data-@fill", LIGHT);
        } else {
            doc.set_attribute(node, "data-@fill", &format!("n{}@@fill", i - 1));
        }
    }
    (doc, root)
}

/// `len` independent nodes, all pointing at one shared binding
fn fan_out(len: usize) -> (MemoryDocument, NodeId) {
    let doc = MemoryDocument::new();
    let root = doc.with_attribute(doc.create_node("svg"), "data-at", "");
    let hub = doc.append_child(root, "rect");
    doc.set_attribute(hub, "data-id@", "hub");
    doc.set_attribute(hub, "data-@fill", LIGHT);
    for _ in 0..len {
        let node = doc.append_child(root, "circle");
        doc.set_attribute(node, "data-@fill", "hub@@fill");
    }
    (doc, root)
}

fn main() {
    let engine = Engine::default();

    println!("Binding Resolution Performance Test");
    println!("===================================\n");

    // chains stay under the default depth limit
    for (name, (doc, root)) in [
        ("chain x 16", chain(16)),
        ("chain x 60", chain(60)),
        ("fan-out x 100", fan_out(100)),
        ("fan-out x 1000", fan_out(1000)),
    ] {
        let iterations = 1_000;

        // Warm up
        let _ = engine.resolve(&doc, root);

        let start = Instant::now();
        for _ in 0..iterations {
            let _ = engine.resolve(&doc, root);
        }
        let resolve_elapsed = start.elapsed();

        let start = Instant::now();
        for _ in 0..iterations {
            let _ = engine.advance_cycle(&doc, root, "activate");
        }
        let dispatch_elapsed = start.elapsed();

        println!("Document: {} ({} nodes)", name, doc.subtree(root).len());
        println!("  Resolve per operation:  {:?}", resolve_elapsed / iterations);
        println!("  Dispatch per operation: {:?}\n", dispatch_elapsed / iterations);
    }
}
