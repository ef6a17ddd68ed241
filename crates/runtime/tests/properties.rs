//! End-to-end property tests driven through the embedding API
//! (`joy_runtime::Interpreter`), the same surface `joy-embed` and
//! `joy-repl` sit on.

use joy_core::{JoyConfig, Payload, Tag, NULL};
use joy_runtime::{read_program, Interpreter, PrimTable};

fn interp(config: JoyConfig) -> Interpreter {
    Interpreter::new(config)
}

fn top_int(interp: &Interpreter) -> i64 {
    match interp.context().heap.node(interp.context().stack).payload {
        Payload::Int(v) => v,
        _ => panic!("expected integer on top of stack"),
    }
}

#[test]
fn quotation_does_not_observe_values_below_its_declared_inputs() {
    let mut it = interp(JoyConfig { autoput: 0, ..JoyConfig::default() });
    // 1 sits below the quotation's input the whole time; [dup] only
    // ever sees the 2.
    it.eval_string("1 2 [dup] dip .").unwrap();
    assert_eq!(it.stack_depth(), 3);
    let top = it.context().heap.node(it.context().stack);
    match top.payload {
        Payload::Int(v) => assert_eq!(v, 2),
        _ => panic!("expected integer"),
    }
    let mid = it.context().heap.node(top.next);
    match mid.payload {
        Payload::Int(v) => assert_eq!(v, 1),
        _ => panic!("expected integer"),
    }
    let bottom = it.context().heap.node(mid.next);
    match bottom.payload {
        Payload::Int(v) => assert_eq!(v, 1),
        _ => panic!("expected the value below dip's frame to survive untouched"),
    }
}

#[test]
fn gc_invariance_same_program_same_result_regardless_of_collection_count() {
    let node_size = std::mem::size_of::<joy_core::Node>();
    // Loop enough times that a tiny heap must collect repeatedly, while
    // a heap sized for the whole run never collects at all.
    let program = "20000 [1 2 + pop] times 42 .";

    let mut tiny = interp(JoyConfig {
        autoput: 0,
        initial_memory_size: node_size * 16,
        max_memory_size: node_size * 256,
        ..JoyConfig::default()
    });
    tiny.eval_string(program).unwrap();

    let mut roomy = interp(JoyConfig {
        autoput: 0,
        initial_memory_size: node_size * 200_000,
        max_memory_size: node_size * 200_000,
        ..JoyConfig::default()
    });
    roomy.eval_string(program).unwrap();

    assert_eq!(top_int(&tiny), 42);
    assert_eq!(top_int(&roomy), 42);
    assert!(
        tiny.memory_stats().collections > roomy.memory_stats().collections,
        "expected the tiny heap to collect more often than the roomy one"
    );
}

#[test]
fn round_trip_write_then_read_preserves_serializable_values() {
    let cases = ["3", "-7", "3.5", "true", "false", "'x", "\"hello\"", "{1 2 3}", "[1 2 3]"];
    for source in cases {
        let mut ctx = joy_core::Context::new(JoyConfig::default());
        let prims = PrimTable::new(&mut ctx.symtab);
        let program = read_program(&mut ctx, &prims, source).unwrap();
        joy_runtime::exec_term(&mut ctx, None, &prims, program).unwrap();
        let first = joy_runtime::format_value(&ctx, ctx.stack);

        let mut ctx2 = joy_core::Context::new(JoyConfig::default());
        let prims2 = PrimTable::new(&mut ctx2.symtab);
        let reparsed = read_program(&mut ctx2, &prims2, &first).unwrap();
        joy_runtime::exec_term(&mut ctx2, None, &prims2, reparsed).unwrap();
        let second = joy_runtime::format_value(&ctx2, ctx2.stack);

        assert_eq!(first, second, "round trip mismatch for {source:?}");
    }
}

#[test]
fn idempotent_clear_matches_clearing_once() {
    let mut once = interp(JoyConfig { autoput: 0, ..JoyConfig::default() });
    once.eval_string("1 2 3 .").unwrap();
    once.stack_clear();
    assert!(once.stack_empty());

    let mut twice = interp(JoyConfig { autoput: 0, ..JoyConfig::default() });
    twice.eval_string("1 2 3 .").unwrap();
    twice.stack_clear();
    twice.stack_clear();
    assert!(twice.stack_empty());
}

#[test]
fn parallel_map_agrees_with_sequential_map() {
    let mut it = interp(JoyConfig { autoput: 0, ..JoyConfig::default() });
    it.eval_string("[1 2 3 4 5 6 7 8 9 10] [dup *] map .").unwrap();
    let sequential = joy_runtime::format_value(it.context(), it.context().stack);
    it.stack_clear();

    it.eval_string("[1 2 3 4 5 6 7 8 9 10] [dup *] pmap .").unwrap();
    let parallel = joy_runtime::format_value(it.context(), it.context().stack);

    assert_eq!(sequential, parallel);
}

#[test]
fn parallel_reduce_agrees_with_sequential_fold_for_an_associative_reducer() {
    let mut it = interp(JoyConfig { autoput: 0, ..JoyConfig::default() });
    it.eval_string("0 [1 2 3 4 5 6 7 8 9 10] [+] fold .").unwrap();
    let folded = top_int(&it);
    it.stack_clear();

    it.eval_string("[1 2 3 4 5 6 7 8 9 10] [+] preduce .").unwrap();
    let reduced = top_int(&it);

    assert_eq!(folded, reduced);
}

#[test]
fn next_chain_from_a_literal_list_terminates() {
    let mut it = interp(JoyConfig { autoput: 0, ..JoyConfig::default() });
    it.eval_string("[1 2 3 4 5] .").unwrap();
    match it.context().heap.node(it.context().stack).payload {
        Payload::List(head) => {
            let mut cur = head;
            let mut steps = 0;
            while cur != NULL {
                cur = it.context().heap.node(cur).next;
                steps += 1;
                assert!(steps < 1000, "next-chain failed to terminate");
            }
            assert_eq!(steps, 5);
        }
        _ => panic!("expected list"),
    }
}

#[test]
fn executing_the_same_quotation_twice_yields_independent_result_lists() {
    // The literal's own node is a constant, executed twice; each
    // execution must push its own fresh cell rather than sharing the
    // literal's index (`Context::new_node_from`'s "fresh copy" guarantee).
    let mut ctx = joy_core::Context::new(JoyConfig::default());
    let prims = PrimTable::new(&mut ctx.symtab);
    let inner = ctx.new_node(Tag::Integer, Payload::Int(7), NULL).unwrap();
    let literal = ctx.new_node(Tag::List, Payload::List(inner), NULL).unwrap();

    joy_runtime::exec_term(&mut ctx, None, &prims, literal).unwrap();
    let first_pushed = ctx.stack;
    let first = ctx.pop().unwrap();
    joy_runtime::exec_term(&mut ctx, None, &prims, literal).unwrap();
    let second_pushed = ctx.stack;
    let second = ctx.pop().unwrap();

    assert_ne!(first_pushed, second_pushed, "each execution must push its own cell, not the literal's");
    assert_ne!(first_pushed, literal);
    assert_ne!(second_pushed, literal);
    match (first.payload, second.payload) {
        (Payload::List(a), Payload::List(b)) => assert_eq!(a, b, "shared literal children are fine since nothing mutates them in place"),
        _ => panic!("expected list payloads"),
    }
}
