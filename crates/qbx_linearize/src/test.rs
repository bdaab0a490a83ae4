use qbx_cfg::graph::{BlockId, ControlFlowGraph, EdgeKind, UnitKind};
use qbx_cfg::options::BuildOptions;
use qbx_cfg::{build_routine, MAIN_ROUTINE};
use qbx_middle::parser::expr::{CmpOp, Expr, UnaryOperator};
use qbx_middle::parser::statement::{ExitKind, LoopKind, OnJumpKind, Statement, StatementKind, TryCatch};
use qbx_middle::symbols::{InitValue, SymbolScope, SymbolTable, ValueType};

use crate::error::{LinearizeError, Warning};
use crate::op::{Op, Operand, Place, RuntimeError};
use crate::options::LinearizeOptions;
use crate::{linearize, LinearizedRoutine};

fn build(body: &[Statement]) -> ControlFlowGraph<'_> {
    build_routine(MAIN_ROUTINE, UnitKind::Main, body, BuildOptions::default()).expect("build failed")
}

fn lower<'a>(cfg: &ControlFlowGraph<'a>, symbols: &'a SymbolTable) -> LinearizedRoutine<'a> {
    linearize(cfg, symbols, LinearizeOptions::default()).expect("linearize failed")
}

fn print(s: &str) -> Statement {
    Statement::print(vec![Expr::string(s)])
}

fn count(ops: &[Op<'_>], pred: impl Fn(&Op<'_>) -> bool) -> usize {
    ops.iter().filter(|op| pred(op)).count()
}

#[test]
fn every_block_ends_in_one_terminator() {
    let body = vec![
        Statement::for_loop(
            "I",
            Expr::int(1),
            Expr::int(3),
            None,
            vec![Statement::if_then(Expr::var("I"), vec![print("odd")], Some(vec![print("even")]))],
        ),
        print("done"),
    ];
    let cfg = build(&body);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    assert_eq!(routine.order, cfg.blocks().iter().map(|b| b.id()).collect::<Vec<_>>());
    assert!(routine.order.windows(2).all(|w| w[0] < w[1]));
    for &block in &routine.order {
        let ops = routine.block_ops(block);
        let last = ops.last().expect("block without ops");
        assert!(last.is_terminator(), "{block} ends in {last}");
        assert_eq!(count(ops, |op| op.is_terminator()), 1, "{block}");
    }
    assert!(routine.warnings.is_empty());
}

#[test]
fn for_header_reads_stored_limit_and_step() {
    let body = vec![Statement::for_loop(
        "I",
        Expr::int(1),
        Expr::var("N"),
        Some(Expr::var("S")),
        vec![Statement::print(vec![Expr::var("I")])],
    )];
    let cfg = build(&body);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    // init bb2, header bb3, body bb4, increment bb5, exit bb6
    let init = routine.block_ops(BlockId(2));
    assert_eq!(count(init, |op| matches!(op, Op::Eval { .. })), 3);
    assert!(matches!(init.last(), Some(Op::Jump(BlockId(3)))));

    let header = routine.block_ops(BlockId(3));
    assert_eq!(count(header, |op| matches!(op, Op::Eval { .. })), 0);
    assert!(matches!(
        header,
        [
            Op::Load { place: Place::Var("I"), .. },
            Op::Load { place: Place::LoopLimit(_), .. },
            Op::Load { place: Place::LoopStep(_), .. },
            Op::Compare { op: CmpOp::Le, .. },
            Op::Compare { op: CmpOp::Ge, .. },
            Op::Compare {
                op: CmpOp::Ge,
                rhs: Operand::Imm(0),
                ..
            },
            Op::Select { .. },
            Op::Branch {
                if_true: BlockId(4),
                if_false: BlockId(6),
                ..
            },
        ]
    ));

    let increment = routine.block_ops(BlockId(5));
    assert!(matches!(
        increment,
        [
            Op::Load { place: Place::Var("I"), .. },
            Op::Load { place: Place::LoopStep(_), .. },
            Op::Add { .. },
            Op::Store { place: Place::Var("I"), .. },
            Op::Jump(BlockId(3)),
        ]
    ));
}

#[test]
fn for_without_step_stores_one() {
    let body = vec![Statement::for_loop("I", Expr::int(1), Expr::int(3), None, vec![print("x")])];
    let cfg = build(&body);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    let init = routine.block_ops(BlockId(2));
    assert_eq!(count(init, |op| matches!(op, Op::Eval { .. })), 2);
    assert!(init.iter().any(|op| matches!(op, Op::Const { value: 1, .. })));
}

#[test]
fn for_init_evaluates_before_storing() {
    // FOR I = 1 TO I takes its limit from the value I had before the loop
    let body = vec![Statement::for_loop("I", Expr::int(1), Expr::var("I"), None, vec![print("x")])];
    let cfg = build(&body);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    let init = routine.block_ops(BlockId(2));
    let [Op::Eval { dst: start, .. }, Op::Eval { dst: limit, expr }, Op::Const { dst: step, value: 1 }, Op::Store {
        place: Place::Var("I"),
        src: Operand::Reg(stored_start),
    }, Op::Store {
        place: Place::LoopLimit(_),
        src: Operand::Reg(stored_limit),
    }, Op::Store {
        place: Place::LoopStep(_),
        src: Operand::Reg(stored_step),
    }, Op::Jump(BlockId(3))] = init
    else {
        panic!("unexpected init block: {init:?}");
    };
    assert_eq!(**expr, Expr::var("I"));
    assert_eq!((stored_start, stored_limit, stored_step), (start, limit, step));
}

#[test]
fn literal_step_fixes_the_direction() {
    macro_rules! case {
        ($($step:expr => $op:expr);*) => {
            $(
                let body = vec![Statement::for_loop("I", Expr::int(10), Expr::int(1), $step, vec![print("x")])];
                let cfg = build(&body);
                let symbols = SymbolTable::new();
                let routine = lower(&cfg, &symbols);

                let header = routine.block_ops(BlockId(3));
                assert!(!header.iter().any(|op| matches!(op, Op::Select { .. } | Op::Load { place: Place::LoopStep(_), .. })));
                let compares: Vec<_> = header
                    .iter()
                    .filter_map(|op| match op {
                        Op::Compare { op, .. } => Some(*op),
                        _ => None,
                    })
                    .collect();
                assert_eq!(compares, [$op]);
            )*
        };
    }

    case! {
        None => CmpOp::Le;
        Some(Expr::int(2)) => CmpOp::Le;
        Some(Expr::unary(UnaryOperator::Neg, Expr::int(1))) => CmpOp::Ge
    };
}

#[test]
fn gosub_pushes_and_return_dispatches() {
    let body = vec![
        Statement::gosub(100u32).at_line(10),
        print("back"),
        print("sub").at_line(100),
        Statement::ret(),
    ];
    let cfg = build(&body);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    let call = routine.block_ops(BlockId(0));
    assert!(call.contains(&Op::AllocReturnStack {
        capacity: LinearizeOptions::DEFAULT_RETURN_STACK_CAPACITY
    }));
    assert!(call.iter().any(|op| matches!(
        op,
        Op::TrapIf {
            error: RuntimeError::ReturnStackOverflow,
            ..
        }
    )));
    assert!(call.iter().any(|op| matches!(
        op,
        Op::Store {
            place: Place::ReturnSlot(_),
            src: Operand::Imm(3)
        }
    )));
    assert_eq!(call.last(), Some(&Op::Jump(BlockId(2))));

    let ret = routine.block_ops(BlockId(2));
    assert!(matches!(ret.first(), Some(Op::Statement(_))));
    assert_eq!(
        count(ret, |op| matches!(op, Op::Compare { op: CmpOp::Eq, .. })),
        1
    );
    let jumps: Vec<_> = ret
        .iter()
        .filter_map(|op| match op {
            Op::JumpIf { target, .. } => Some(*target),
            _ => None,
        })
        .collect();
    assert_eq!(jumps, [BlockId(3)]);
    assert_eq!(ret.last(), Some(&Op::Trap(RuntimeError::DispatchMiss)));
}

#[test]
fn return_dispatch_tests_sites_in_ascending_order() {
    let body = vec![
        Statement::gosub(100u32),
        Statement::gosub(100u32),
        Statement::end(),
        print("sub").at_line(100),
        Statement::ret(),
    ];
    let cfg = build(&body);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    let ret = routine.block_ops(BlockId(2));
    let sites: Vec<_> = ret
        .iter()
        .filter_map(|op| match op {
            Op::Compare {
                op: CmpOp::Eq,
                rhs: Operand::Imm(site),
                ..
            } => Some(*site),
            _ => None,
        })
        .collect();
    assert_eq!(sites, [3, 4]);
    assert!(ret.iter().any(|op| matches!(
        op,
        Op::TrapIf {
            error: RuntimeError::ReturnWithoutGosub,
            ..
        }
    )));
    assert_eq!(ret.last(), Some(&Op::Trap(RuntimeError::DispatchMiss)));
}

#[test]
fn unreachable_return_site_is_still_emitted() {
    let mut cfg = ControlFlowGraph::new(MAIN_ROUTINE, UnitKind::Main);
    let site = cfg.add_block(None);
    cfg.register_gosub_return(site);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    assert_eq!(routine.order, [BlockId(0), site]);
    assert_eq!(routine.warnings, [Warning::UnreachableBlock { block: site }]);
    assert_eq!(routine.block_ops(site), [Op::Exit]);
}

#[test]
fn missing_return_site_is_an_error() {
    let mut cfg = ControlFlowGraph::new(MAIN_ROUTINE, UnitKind::Main);
    cfg.register_gosub_return(BlockId(9));
    let symbols = SymbolTable::new();

    assert_eq!(
        linearize(&cfg, &symbols, LinearizeOptions::default()).map(|r| r.order),
        Err(LinearizeError::MissingReturnSite { block: BlockId(9) })
    );
}

#[test]
fn entry_allocates_owned_storage() {
    let mut symbols = SymbolTable::new();
    symbols.variable("X", ValueType::Integer, SymbolScope::Global).unwrap();
    symbols.variable("N$", ValueType::String, SymbolScope::Shared).unwrap();
    symbols.variable("T", ValueType::Long, SymbolScope::Local("S".into())).unwrap();

    let main_body = vec![Statement::for_loop("X", Expr::int(1), Expr::int(2), None, vec![print("x")])];
    let main = build(&main_body);
    let routine = lower(&main, &symbols);
    let entry = routine.block_ops(main.entry());
    assert!(matches!(
        entry,
        [
            Op::Alloc {
                place: Place::Var("X"),
                init: InitValue::Zero
            },
            Op::Alloc {
                place: Place::Var("N$"),
                init: InitValue::Null
            },
            Op::Alloc {
                place: Place::LoopLimit(_),
                ..
            },
            Op::Alloc {
                place: Place::LoopStep(_),
                ..
            },
            Op::Jump(_),
        ]
    ));

    let sub_body = vec![Statement::assign("T", Expr::int(1)), Statement::exit(ExitKind::Sub)];
    let sub = build_routine("S", UnitKind::Sub, &sub_body, BuildOptions::default()).expect("build failed");
    let routine = lower(&sub, &symbols);
    let allocs: Vec<_> = routine
        .block_ops(sub.entry())
        .iter()
        .filter_map(|op| match op {
            Op::Alloc { place, .. } => Some(place.to_string()),
            Op::AllocReturnStack { .. } => Some("retstack".to_owned()),
            _ => None,
        })
        .collect();
    assert_eq!(allocs, ["T"]);
}

#[test]
fn illegal_shape_falls_back_to_first_edge() {
    let mut cfg = ControlFlowGraph::new(MAIN_ROUTINE, UnitKind::Main);
    let a = cfg.add_block(None);
    let b = cfg.add_block(None);
    cfg.add_edge(cfg.entry(), a, EdgeKind::Jump);
    cfg.add_edge(cfg.entry(), b, EdgeKind::Jump);
    cfg.add_edge(a, b, EdgeKind::Fallthrough);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    assert_eq!(routine.block_ops(cfg.entry()), [Op::Jump(a)]);
    assert!(matches!(
        routine.warnings.as_slice(),
        [Warning::UnknownEdgeShape { block: BlockId(0), .. }]
    ));
}

#[test]
fn branch_without_condition_falls_back() {
    let mut cfg = ControlFlowGraph::new(MAIN_ROUTINE, UnitKind::Main);
    let yes = cfg.add_block(None);
    let no = cfg.add_block(None);
    cfg.add_edge(cfg.entry(), yes, EdgeKind::ConditionalTrue);
    cfg.add_edge(cfg.entry(), no, EdgeKind::ConditionalFalse);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    assert_eq!(routine.block_ops(cfg.entry()), [Op::Jump(yes)]);
    assert_eq!(routine.warnings.len(), 1);
}

#[test]
fn on_goto_compares_one_based_index() {
    let body = vec![
        Statement::on(OnJumpKind::Goto, Expr::var("K"), vec![10u32.into(), 20u32.into()]),
        print("none"),
        print("ten").at_line(10),
        print("twenty").at_line(20),
    ];
    let cfg = build(&body);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    let dispatch = routine.block_ops(BlockId(0));
    let cases: Vec<_> = dispatch
        .windows(2)
        .filter_map(|w| match w {
            [Op::Compare {
                rhs: Operand::Imm(index),
                ..
            }, Op::JumpIf { target, .. }] => Some((*index, *target)),
            _ => None,
        })
        .collect();
    assert_eq!(cases, [(1, BlockId(2)), (2, BlockId(3))]);
    assert_eq!(dispatch.last(), Some(&Op::Jump(BlockId(4))));
}

#[test]
fn finally_dispatches_on_the_pending_slot() {
    let body = vec![Statement::for_loop(
        "I",
        Expr::int(1),
        Expr::int(3),
        None,
        vec![Statement::new(StatementKind::Try(TryCatch {
            body: vec![Statement::exit(ExitKind::Loop(LoopKind::For))],
            catch: None,
            finally: Some(vec![print("cleanup")]),
        }))],
    )];
    let cfg = build(&body);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    // increment bb5, FOR exit bb6, TRY entry bb7, FINALLY bb8
    let finally = BlockId(8);
    assert!(routine.block_ops(cfg.entry()).contains(&Op::Alloc {
        place: Place::Pending(finally),
        init: InitValue::Zero
    }));
    assert_eq!(
        routine.block_ops(BlockId(7)),
        [
            Op::PushHandler(finally),
            Op::Store {
                place: Place::Pending(finally),
                src: Operand::Imm(1)
            },
            Op::PopHandler,
            Op::Jump(finally),
        ]
    );
    assert!(matches!(
        routine.block_ops(finally),
        [
            Op::Statement(_),
            Op::ResumePending,
            Op::Load {
                place: Place::Pending(BlockId(8)),
                ..
            },
            Op::Compare {
                op: CmpOp::Eq,
                rhs: Operand::Imm(1),
                ..
            },
            Op::JumpIf {
                target: BlockId(6),
                ..
            },
            Op::Jump(BlockId(5)),
        ]
    ));
    assert!(routine.warnings.is_empty());
}

#[test]
fn listing() {
    let mut cfg = ControlFlowGraph::new(MAIN_ROUTINE, UnitKind::Main);
    let next = cfg.add_block(None);
    cfg.add_edge(cfg.entry(), next, EdgeKind::Jump);
    let symbols = SymbolTable::new();
    let routine = lower(&cfg, &symbols);

    assert_eq!(routine.to_string(), "MAIN MAIN\nbb0:\n    jmp bb1\nbb1:\n    exit\n");
}
