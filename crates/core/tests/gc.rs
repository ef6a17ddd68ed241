use joy_core::{Context, JoyConfig, Payload, Tag, NULL};

fn small_context() -> Context {
    // Node = Tag + Payload + Index; `size_of` varies, so pick a memory
    // size that buys a handful of nodes and force growth quickly.
    let node_size = std::mem::size_of::<joy_core::Node>();
    Context::new(JoyConfig {
        initial_memory_size: node_size * 8,
        max_memory_size: node_size * 8,
        ..JoyConfig::default()
    })
}

#[test]
fn definition_immunity_nodes_below_mem_low_survive_sweep() {
    let mut ctx = small_context();
    let tenured = ctx.new_node(Tag::Integer, Payload::Int(42), NULL).unwrap();
    ctx.heap.advance_mem_low();

    // Allocate and abandon a pile of ephemeral garbage, forcing a GC.
    for _ in 0..20 {
        let _ = ctx.new_node(Tag::Integer, Payload::Int(0), NULL);
    }

    assert_eq!(ctx.heap.node(tenured).tag, Tag::Integer);
    match ctx.heap.node(tenured).payload {
        Payload::Int(v) => assert_eq!(v, 42),
        _ => panic!("tenured node payload was overwritten"),
    }
}

#[test]
fn gc_reclaims_unreachable_ephemeral_nodes_when_heap_fills() {
    let mut ctx = small_context();
    // Build and drop a value with nothing rooting it.
    let _ = ctx.new_node(Tag::Integer, Payload::Int(1), NULL).unwrap();
    let before = ctx.heap.stats().collections;

    // Push far more nodes than the tiny heap's initial budget without
    // rooting the intermediate ones; this should trigger at least one
    // collection rather than unconditionally growing.
    for i in 0..100 {
        let _ = ctx.new_node(Tag::Integer, Payload::Int(i), NULL).unwrap();
    }

    assert!(ctx.heap.stats().collections > before);
}

#[test]
fn reachable_chain_survives_gc() {
    let mut ctx = small_context();
    ctx.push(Tag::Integer, Payload::Int(1)).unwrap();
    ctx.push(Tag::Integer, Payload::Int(2)).unwrap();
    ctx.push(Tag::Integer, Payload::Int(3)).unwrap();

    for i in 0..50 {
        let _ = ctx.new_node(Tag::Integer, Payload::Int(i), NULL);
    }

    assert_eq!(ctx.stack_depth(), 3);
    let top = ctx.pop().unwrap();
    match top.payload {
        Payload::Int(v) => assert_eq!(v, 3),
        _ => panic!("expected integer"),
    }
}

#[test]
fn next_chain_termination() {
    let mut ctx = small_context();
    for i in 0..5 {
        ctx.push(Tag::Integer, Payload::Int(i)).unwrap();
    }
    let mut cur = ctx.stack;
    let mut steps = 0;
    while cur != NULL {
        cur = ctx.heap.node(cur).next;
        steps += 1;
        assert!(steps < 1000, "next-chain failed to terminate");
    }
    assert_eq!(steps, 5);
}
