use super::*;
use crate::ir::{Instruction, IrCode, OpCode};
use crate::optimizer::{cfg, dataflow, peephole};

fn ins(op: OpCode, result: &str, arg1: &str, arg2: &str) -> Instruction {
    Instruction::new(op, result, arg1, arg2)
}

fn lower(source: &str) -> IrCode {
    let tokens = crate::lexer::lex(source).expect("should lex");
    let outcome = crate::parser::parse(&tokens);
    assert!(outcome.errors.is_empty(), "syntax errors: {:?}", outcome.errors);
    crate::semantic_analysis::analyze(&outcome.program).expect("should validate");
    crate::irgen::generate(&outcome.program).code
}

fn rendered(code: &[Instruction]) -> Vec<String> {
    code.iter().map(ToString::to_string).collect()
}

#[test]
fn test_constant_folding_replaces_add() {
    let mut code = lower("int main(void) { int x; x = 2 + 3; return x; }");
    peephole::constant_folding(&mut code);
    let lines = rendered(&code);
    assert!(lines.contains(&"ASSIGN x, 5".to_owned()), "lines: {lines:?}");
    assert!(lines.iter().all(|l| !l.starts_with("ADD")));
}

#[test]
fn test_constant_folding_substitutes_known_values() {
    let mut code = lower("int main(void) { int x; x = 4; return x * x; }");
    peephole::constant_folding(&mut code);
    let lines = rendered(&code);
    assert!(lines.contains(&"ASSIGN t0, 16".to_owned()), "lines: {lines:?}");
}

#[test]
fn test_division_by_zero_aborts_fold() {
    let mut code = vec![ins(OpCode::Div, "t0", "1", "0")];
    peephole::constant_folding(&mut code);
    assert_eq!(vec![ins(OpCode::Div, "t0", "1", "0")], code);

    let mut code = vec![ins(OpCode::Mod, "t0", "7", "0")];
    peephole::constant_folding(&mut code);
    assert_eq!(OpCode::Mod, code[0].op);
}

#[test]
fn test_folding_facts_die_at_labels() {
    let mut code = vec![
        ins(OpCode::Assign, "x", "1", ""),
        ins(OpCode::Label, "L0", "", ""),
        ins(OpCode::Add, "t0", "x", "0"),
    ];
    peephole::constant_folding(&mut code);
    // x may hold a different value on the back edge into L0
    assert_eq!(ins(OpCode::Add, "t0", "x", "0"), code[2]);
}

#[test]
fn test_folding_facts_die_on_redefinition() {
    let mut code = vec![
        ins(OpCode::Assign, "x", "5", ""),
        ins(OpCode::Call, "x", "input", "0"),
        ins(OpCode::Add, "t0", "x", "1"),
    ];
    peephole::constant_folding(&mut code);
    assert_eq!(ins(OpCode::Add, "t0", "x", "1"), code[2]);
}

#[test]
fn test_copy_propagation() {
    let mut code = vec![
        ins(OpCode::Assign, "y", "x", ""),
        ins(OpCode::Add, "t0", "y", "1"),
    ];
    peephole::copy_propagation(&mut code);
    assert_eq!(ins(OpCode::Add, "t0", "x", "1"), code[1]);
}

#[test]
fn test_copy_propagation_invalidated_by_source_redefinition() {
    let mut code = vec![
        ins(OpCode::Assign, "y", "x", ""),
        ins(OpCode::Assign, "x", "9", ""),
        ins(OpCode::Add, "t0", "y", "1"),
    ];
    peephole::copy_propagation(&mut code);
    // y no longer mirrors x once x changes
    assert_eq!(ins(OpCode::Add, "t0", "y", "1"), code[2]);
}

#[test]
fn test_algebraic_simplification() {
    let mut code = vec![
        ins(OpCode::Add, "t0", "x", "0"),
        ins(OpCode::Sub, "t1", "x", "0"),
        ins(OpCode::Mul, "t2", "x", "1"),
        ins(OpCode::Div, "t3", "x", "1"),
        ins(OpCode::Mul, "t4", "x", "0"),
    ];
    peephole::algebraic_simplification(&mut code);
    let expected = vec![
        ins(OpCode::Copy, "t0", "x", ""),
        ins(OpCode::Copy, "t1", "x", ""),
        ins(OpCode::Copy, "t2", "x", ""),
        ins(OpCode::Copy, "t3", "x", ""),
        ins(OpCode::Assign, "t4", "0", ""),
    ];
    assert_eq!(expected, code);
}

#[test]
fn test_dead_code_elimination_keeps_effects() {
    let mut code = vec![
        ins(OpCode::FunctionBegin, "main", "", ""),
        ins(OpCode::Assign, "dead", "1", ""),
        ins(OpCode::Call, "t0", "input", "0"),
        ins(OpCode::Return, "", "0", ""),
        ins(OpCode::FunctionEnd, "main", "", ""),
    ];
    peephole::dead_code_elimination(&mut code);
    let lines = rendered(&code);
    assert!(!lines.contains(&"ASSIGN dead, 1".to_owned()));
    // the call result is unused, the call itself survives
    assert!(lines.contains(&"CALL t0, input, 0".to_owned()));
}

#[test]
fn test_o1_pipeline_end_to_end() {
    let code = lower("int main(void) { int x; x = 2 + 3; return x; }");
    let optimized = optimize(code, OptLevel::O1);
    let lines = rendered(&optimized);
    assert_eq!(
        vec!["FUNCTION_BEGIN main", "RETURN _, 5", "FUNCTION_END main"],
        lines
    );
}

#[test]
fn test_o1_passes_are_idempotent() {
    let code = lower(
        "int main(void) { int x; int y; x = 2 + 3; y = x; if (y > 4) y = y + 0; return y * 1; }",
    );
    let once = optimize(code, OptLevel::O1);
    let twice = optimize(once.clone(), OptLevel::O1);
    assert_eq!(once, twice);
}

#[test]
fn test_o1_never_grows_instruction_count() {
    let code = lower(
        "int f(int n) { int acc; acc = 0; while (n > 0) { acc = acc + n * 1; n = n - 1; } return acc + 0; }\n\
         int main(void) { return f(3 + 4); }",
    );
    let before = code.len();
    let after = optimize(code, OptLevel::O1).len();
    assert!(after <= before, "grew from {before} to {after}");
}

#[test]
fn test_cfg_partitioning() {
    let code = lower("int main(void) { int x; x = 1; if (x) x = 2; return x; }");
    let graph = cfg::ControlFlowGraph::build(&code);

    // FUNCTION_BEGIN | ASSIGN+IF_FALSE | ASSIGN | LABEL+RETURN | FUNCTION_END | exit
    assert_eq!(6, graph.blocks.len());
    assert_eq!(0, graph.entry);
    assert!(graph.blocks[graph.exit].is_empty());

    let labeled = graph.block_of_label("L0").expect("label block");
    assert_eq!(Some("L0".to_owned()), graph.blocks[labeled].label);
}

#[test]
fn test_cfg_edges_and_invariants() {
    let code = lower("int main(void) { int x; x = 1; if (x) x = 2; return x; }");
    let graph = cfg::ControlFlowGraph::build(&code);

    let branch_block = graph
        .blocks
        .iter()
        .find(|b| b.last_instruction().is_some_and(Instruction::is_branch))
        .expect("branch block");
    assert_eq!(2, branch_block.successors.len());

    // every reachable block except the entry has a predecessor, and every
    // successor edge has a matching predecessor edge
    let reachable = graph.reachable_from_entry();
    for block in &graph.blocks {
        if block.id != graph.entry && reachable.contains(&block.id) {
            assert!(
                !block.predecessors.is_empty(),
                "block {} has no predecessor",
                block.id
            );
        }
        for &succ in &block.successors {
            assert!(graph.blocks[succ].predecessors.contains(&block.id));
        }
    }
}

#[test]
fn test_cfg_return_connects_to_exit() {
    let code = lower("int main(void) { return 0; }");
    let graph = cfg::ControlFlowGraph::build(&code);
    let return_block = graph
        .blocks
        .iter()
        .find(|b| {
            b.last_instruction()
                .is_some_and(|i| i.op == OpCode::Return)
        })
        .expect("return block");
    assert!(return_block.successors.contains(&graph.exit));
    assert!(graph.is_reachable(graph.entry, graph.exit));
}

#[test]
fn test_cfg_reachability_and_order() {
    let code = lower(
        "int main(void) { int i; i = 0; while (i < 3) i = i + 1; return i; }",
    );
    let graph = cfg::ControlFlowGraph::build(&code);
    let order = graph.reverse_postorder();
    assert_eq!(graph.entry, order[0]);
    for &id in &order {
        assert!(graph.is_reachable(graph.entry, id));
    }
    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph CFG {"));
}

#[test]
fn test_unreachable_code_elimination() {
    let code = vec![
        ins(OpCode::FunctionBegin, "main", "", ""),
        ins(OpCode::Goto, "L0", "", ""),
        ins(OpCode::Assign, "x", "1", ""),
        ins(OpCode::Label, "L0", "", ""),
        ins(OpCode::Return, "", "0", ""),
        ins(OpCode::FunctionEnd, "main", "", ""),
    ];
    let cleaned = cfg::eliminate_unreachable(code);
    let lines = rendered(&cleaned);
    assert!(!lines.contains(&"ASSIGN x, 1".to_owned()));
    assert!(lines.contains(&"LABEL L0".to_owned()));
    assert!(lines.contains(&"FUNCTION_END main".to_owned()));
}

#[test]
fn test_liveness_sets() {
    let code = vec![
        ins(OpCode::Assign, "a", "1", ""),
        ins(OpCode::Add, "b", "a", "2"),
        ins(OpCode::Return, "", "b", ""),
    ];
    let live = dataflow::liveness(&code);
    assert!(live.live_out[0].contains("a"));
    assert!(live.live_out[1].contains("b"));
    assert!(!live.live_out[1].contains("a"));
    assert!(live.live_in[2].contains("b"));
    assert!(live.live_out[2].is_empty());
}

#[test]
fn test_liveness_through_branches() {
    let code = vec![
        ins(OpCode::Assign, "x", "1", ""),
        ins(OpCode::IfFalse, "L0", "c", ""),
        ins(OpCode::Assign, "x", "2", ""),
        ins(OpCode::Label, "L0", "", ""),
        ins(OpCode::Return, "", "x", ""),
    ];
    let live = dataflow::liveness(&code);
    // the first definition of x survives along the branch-taken path
    assert!(live.live_out[0].contains("x"));
    assert!(live.live_in[1].contains("c"));
}

#[test]
fn test_reaching_definitions() {
    let code = vec![
        ins(OpCode::Assign, "x", "1", ""),
        ins(OpCode::Assign, "x", "2", ""),
        ins(OpCode::Add, "t0", "x", "0"),
    ];
    let reaching = dataflow::reaching_definitions(&code);
    assert!(!reaching.in_sets[2].contains(&0), "killed definition reaches");
    assert!(reaching.in_sets[2].contains(&1));
}

#[test]
fn test_reaching_definitions_merge_at_join() {
    let code = vec![
        ins(OpCode::IfFalse, "L0", "c", ""),
        ins(OpCode::Assign, "x", "1", ""),
        ins(OpCode::Label, "L0", "", ""),
        ins(OpCode::Assign, "x", "2", ""),
        ins(OpCode::Return, "", "x", ""),
    ];
    let reaching = dataflow::reaching_definitions(&code);
    // both the fall-through definition and ⊥ merge into L0
    assert!(reaching.in_sets[3].contains(&1) || reaching.in_sets[2].contains(&1));
    // after the second definition only it reaches the return
    assert!(reaching.in_sets[4].contains(&3));
    assert!(!reaching.in_sets[4].contains(&1));
}

#[test]
fn test_available_expressions_within_block() {
    let code = vec![
        ins(OpCode::Add, "t0", "a", "b"),
        ins(OpCode::Add, "t1", "a", "b"),
        ins(OpCode::Assign, "a", "0", ""),
        ins(OpCode::Add, "t2", "a", "b"),
    ];
    let avail = dataflow::available_expressions(&code);
    let key = dataflow::ExprKey {
        op: OpCode::Add,
        arg1: "a".to_owned(),
        arg2: "b".to_owned(),
    };
    assert!(avail.in_sets[1].contains(&key));
    // the redefinition of a kills the expression
    assert!(!avail.in_sets[3].contains(&key));
}

#[test]
fn test_redundant_computation_elimination() {
    let code = vec![
        ins(OpCode::Add, "t0", "a", "b"),
        ins(OpCode::Add, "t1", "a", "b"),
        ins(OpCode::Return, "", "t1", ""),
    ];
    let out = dataflow::eliminate_redundant_computations(code);
    assert_eq!(ins(OpCode::Copy, "t1", "t0", ""), out[1]);
}

#[test]
fn test_liveness_driven_dce() {
    let code = vec![
        ins(OpCode::FunctionBegin, "f", "", ""),
        ins(OpCode::Assign, "x", "1", ""),
        ins(OpCode::Assign, "x", "2", ""),
        ins(OpCode::Return, "", "x", ""),
        ins(OpCode::FunctionEnd, "f", "", ""),
    ];
    let out = dataflow::eliminate_dead_by_liveness(code);
    let lines = rendered(&out);
    // the overwritten definition is dead even though x is read later
    assert!(!lines.contains(&"ASSIGN x, 1".to_owned()));
    assert!(lines.contains(&"ASSIGN x, 2".to_owned()));
}

#[test]
fn test_strength_reduction() {
    let code = lower("int main(void) { int x; x = input(); return x * 2; }");
    let optimized = optimize(code, OptLevel::O3);
    assert!(
        optimized
            .iter()
            .any(|i| i.op == OpCode::Add && !i.arg1.is_empty() && i.arg1 == i.arg2),
        "doubling not rewritten as self-add: {optimized:?}"
    );
    assert!(optimized.iter().all(|i| i.op != OpCode::Mul));
}

#[test]
fn test_tail_call_rewrite() {
    let code = vec![
        ins(OpCode::FunctionBegin, "f", "", ""),
        ins(OpCode::Param, "", "1", ""),
        ins(OpCode::Call, "t0", "g", "1"),
        ins(OpCode::Return, "", "t0", ""),
        ins(OpCode::FunctionEnd, "f", "", ""),
    ];
    let optimized = optimize(code, OptLevel::O3);
    let lines = rendered(&optimized);
    assert!(lines.contains(&"GOTO g".to_owned()), "lines: {lines:?}");
    assert!(lines.iter().all(|l| !l.starts_with("CALL")));
    assert!(lines.iter().all(|l| !l.starts_with("RETURN")));
}

#[test]
fn test_call_not_in_tail_position_is_kept() {
    let code = vec![
        ins(OpCode::Call, "t0", "g", "0"),
        ins(OpCode::Add, "t1", "t0", "1"),
        ins(OpCode::Return, "", "t1", ""),
    ];
    let optimized = optimize(code, OptLevel::O3);
    assert!(rendered(&optimized).contains(&"CALL t0, g, 0".to_owned()));
}

#[test]
fn test_small_loop_unrolled_once() {
    let code = vec![
        ins(OpCode::Label, "L0", "", ""),
        ins(OpCode::Call, "t0", "input", "0"),
        ins(OpCode::IfFalse, "L1", "t0", ""),
        ins(OpCode::Goto, "L0", "", ""),
        ins(OpCode::Label, "L1", "", ""),
    ];
    let unrolled = optimize(code, OptLevel::O3);
    let calls = unrolled.iter().filter(|i| i.is_call()).count();
    assert_eq!(2, calls);
    // still exactly one definition of each label
    let labels = unrolled.iter().filter(|i| i.is_label()).count();
    assert_eq!(2, labels);
}

#[test]
fn test_loop_with_inner_label_not_unrolled() {
    let code = vec![
        ins(OpCode::Label, "L0", "", ""),
        ins(OpCode::Label, "L1", "", ""),
        ins(OpCode::Call, "t0", "input", "0"),
        ins(OpCode::IfTrue, "L0", "t0", ""),
    ];
    let unrolled = optimize(code.clone(), OptLevel::O3);
    assert_eq!(rendered(&code), rendered(&unrolled));
}

#[test]
fn test_scheduling_keeps_load_before_dependent_arithmetic() {
    // the label shields the reads of `a` from copy propagation, so both
    // instructions of the candidate pair survive to the scheduler
    let prologue = vec![
        ins(OpCode::Call, "t0", "input", "0"),
        ins(OpCode::Assign, "a", "t0", ""),
        ins(OpCode::Add, "t1", "b", "c"),
        ins(OpCode::Label, "L0", "", ""),
        ins(OpCode::Param, "", "t1", ""),
        ins(OpCode::Param, "", "a", ""),
        ins(OpCode::Call, "t2", "f", "2"),
        ins(OpCode::Return, "", "t2", ""),
    ];
    let scheduled = optimize(prologue, OptLevel::O3);
    let load = scheduled
        .iter()
        .position(|i| i.op == OpCode::Assign && i.result == "a")
        .expect("load survives");
    let arith = scheduled
        .iter()
        .position(|i| i.op == OpCode::Add)
        .expect("arithmetic survives");
    // independent pair, but the load stays ahead of the arithmetic
    assert!(load < arith, "load sank below arithmetic: {scheduled:?}");
}

#[test]
fn test_scheduling_swaps_arithmetic_below_independent_load() {
    let code = vec![
        ins(OpCode::Call, "t0", "input", "0"),
        ins(OpCode::Add, "t1", "b", "c"),
        ins(OpCode::Assign, "a", "t0", ""),
        ins(OpCode::Label, "L0", "", ""),
        ins(OpCode::Param, "", "t1", ""),
        ins(OpCode::Param, "", "a", ""),
        ins(OpCode::Call, "t2", "f", "2"),
        ins(OpCode::Return, "", "t2", ""),
    ];
    let scheduled = optimize(code, OptLevel::O3);
    let load = scheduled
        .iter()
        .position(|i| i.op == OpCode::Assign && i.result == "a")
        .expect("load survives");
    let arith = scheduled
        .iter()
        .position(|i| i.op == OpCode::Add)
        .expect("arithmetic survives");
    assert!(load < arith, "load not lifted above arithmetic: {scheduled:?}");
}

#[test]
fn test_scheduling_never_reorders_params() {
    let code = vec![
        ins(OpCode::Param, "", "x", ""),
        ins(OpCode::Param, "", "y", ""),
        ins(OpCode::Call, "t0", "f", "2"),
        ins(OpCode::Return, "", "0", ""),
    ];
    let scheduled = optimize(code.clone(), OptLevel::O3);
    assert_eq!(rendered(&code), rendered(&scheduled));
}

#[test]
fn test_loop_invariant_code_motion() {
    let code = vec![
        ins(OpCode::Label, "L0", "", ""),
        ins(OpCode::Add, "t0", "a", "b"),
        ins(OpCode::Call, "t1", "input", "0"),
        ins(OpCode::IfTrue, "L0", "t1", ""),
        ins(OpCode::Return, "", "t0", ""),
    ];
    let optimized = optimize(code, OptLevel::O3);
    let label_at = optimized.iter().position(|i| i.is_label()).expect("label");
    let add_at = optimized
        .iter()
        .position(|i| i.op == OpCode::Add)
        .expect("add survives");
    assert!(add_at < label_at, "invariant not hoisted: {optimized:?}");
}
