use qbx_cfg::error::Error as BuildError;
use qbx_cfg::graph::{BlockId, EdgeKind, EdgeShape};
use qbx_cfg::MAIN_ROUTINE;
use qbx_linearize::op::{Op, Operand, RuntimeError};
use qbx_middle::parser::expr::{CmpOp, Expr};
use qbx_middle::parser::statement::{ExitKind, LoopKind, Program, Routine, RoutineKind, Statement, StatementKind};
use qbx_middle::symbols::{SymbolScope, SymbolTable, ValueType};

use super::*;

fn print(s: &str) -> Statement {
    Statement::print(vec![Expr::string(s)])
}

fn main_only(main: Vec<Statement>) -> Program {
    Program {
        main,
        routines: Vec::new(),
    }
}

fn compile_ok<'a>(program: &'a Program, symbols: &'a SymbolTable) -> CompileOutput<'a> {
    let out = compile(program, symbols, CompileOptions::default());
    assert!(out.is_ok(), "{:?}", out.errors);
    out
}

fn dispatch_sites(ops: &[Op<'_>]) -> Vec<i64> {
    ops.iter()
        .filter_map(|op| match op {
            Op::Compare {
                op: CmpOp::Eq,
                rhs: Operand::Imm(site),
                ..
            } => Some(*site),
            _ => None,
        })
        .collect()
}

#[test]
fn if_then_else_scenario() {
    let program = main_only(vec![Statement::if_then(
        Expr::compare(CmpOp::Gt, Expr::var("X"), Expr::int(0)),
        vec![print("pos")],
        Some(vec![print("neg")]),
    )]);
    let symbols = SymbolTable::new();
    let out = compile_ok(&program, &symbols);

    let cfg = out.cfg.main.as_ref().expect("main graph");
    assert_eq!(cfg.blocks().len(), 4);
    assert_eq!(
        cfg.shape(BlockId(0)),
        Ok(EdgeShape::Branch {
            if_true: BlockId(2),
            if_false: BlockId(3)
        })
    );
    for arm in [BlockId(2), BlockId(3)] {
        assert_eq!(cfg.shape(arm), Ok(EdgeShape::Goto(BlockId(4))));
        assert!(cfg.outgoing(arm).all(|e| e.kind == EdgeKind::Jump));
    }

    let main = out.routine(MAIN_ROUTINE).expect("main lowered");
    let entry = main.block_ops(BlockId(0));
    assert_eq!(entry.iter().filter(|op| matches!(op, Op::Eval { .. })).count(), 1);
    assert!(matches!(
        entry.last(),
        Some(Op::Branch {
            if_true: BlockId(2),
            if_false: BlockId(3),
            ..
        })
    ));
}

#[test]
fn for_step_scenario() {
    let program = main_only(vec![Statement::for_loop(
        "I",
        Expr::int(1),
        Expr::int(5),
        Some(Expr::int(2)),
        vec![Statement::print(vec![Expr::var("I")])],
    )]);
    let symbols = SymbolTable::new();
    let out = compile_ok(&program, &symbols);
    let cfg = out.cfg.main.as_ref().expect("main graph");

    let init = BlockId(2);
    let header = BlockId(3);
    let increment = BlockId(5);
    assert_eq!(cfg.shape(init), Ok(EdgeShape::Goto(header)));
    assert!(cfg.outgoing(init).all(|e| e.kind == EdgeKind::Fallthrough));
    assert_eq!(
        cfg.shape(header),
        Ok(EdgeShape::Branch {
            if_true: BlockId(4),
            if_false: BlockId(6)
        })
    );
    assert!(cfg
        .outgoing(increment)
        .any(|e| e.target == header && e.kind == EdgeKind::Jump));
    assert!(cfg[header].is_loop_header());

    // STEP is evaluated once in the init block and only loaded afterwards
    let main = out.routine(MAIN_ROUTINE).expect("main lowered");
    let evals: usize = main
        .order
        .iter()
        .map(|&b| {
            main.block_ops(b)
                .iter()
                .filter(|op| matches!(op, Op::Eval { expr, .. } if **expr == Expr::int(2)))
                .count()
        })
        .sum();
    assert_eq!(evals, 1);
    assert!(matches!(
        main.block_ops(header),
        [
            Op::Load { .. },
            Op::Load { .. },
            Op::Compare { op: CmpOp::Le, .. },
            Op::Branch { .. }
        ]
    ));
}

#[test]
fn gosub_scenario() {
    let program = main_only(vec![
        Statement::gosub(100u32).at_line(10),
        print("back"),
        print("sub").at_line(100),
        Statement::ret(),
    ]);
    let symbols = SymbolTable::new();
    let out = compile_ok(&program, &symbols);
    let cfg = out.cfg.main.as_ref().expect("main graph");

    let return_site = BlockId(3);
    assert!(cfg.gosub_return_blocks().contains(&return_site));

    let main = out.routine(MAIN_ROUTINE).expect("main lowered");
    assert!(main.order.contains(&return_site));
    let ret = main.block_ops(BlockId(2));
    assert_eq!(dispatch_sites(ret), [3]);
    let compare = ret
        .iter()
        .position(|op| matches!(op, Op::Compare { op: CmpOp::Eq, .. }))
        .expect("a dispatch compare");
    assert!(matches!(ret[compare + 1], Op::JumpIf { target, .. } if target == return_site));
}

#[test]
fn shared_return_scenario() {
    let program = main_only(vec![
        Statement::gosub("work"),
        print("first"),
        Statement::gosub("work"),
        print("second"),
        Statement::end(),
        print("sub").labeled("work"),
        Statement::ret(),
    ]);
    let symbols = SymbolTable::new();
    let out = compile_ok(&program, &symbols);
    let cfg = out.cfg.main.as_ref().expect("main graph");

    let sites: Vec<i64> = cfg.gosub_return_blocks().iter().map(|b| i64::from(b.0)).collect();
    assert_eq!(sites.len(), 2);

    let main = out.routine(MAIN_ROUTINE).expect("main lowered");
    let (ret, _) = main
        .order
        .iter()
        .map(|&b| (b, main.block_ops(b)))
        .find(|(_, ops)| ops.contains(&Op::Trap(RuntimeError::DispatchMiss)))
        .expect("a RETURN dispatch");
    let ops = main.block_ops(ret);
    assert_eq!(dispatch_sites(ops), sites);
    assert!(sites.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ops.last(), Some(&Op::Trap(RuntimeError::DispatchMiss)));
}

#[test]
fn failing_routine_does_not_stop_the_others() {
    let program = Program {
        main: vec![Statement::call("BROKEN", Vec::new()), print("main")],
        routines: vec![
            Routine::new("BROKEN", RoutineKind::Sub, Vec::new(), vec![Statement::goto(999u32)]),
            Routine::new(
                "SQUARE",
                RoutineKind::Function,
                vec!["N".into()],
                vec![Statement::new(StatementKind::Return(Some(Expr::var("N"))))],
            ),
            Routine::new("LOOSE", RoutineKind::Sub, Vec::new(), vec![Statement::exit(ExitKind::Loop(LoopKind::For))]),
        ],
    };
    let symbols = SymbolTable::new();
    let out = compile(&program, &symbols, CompileOptions::default());

    let failed: Vec<_> = out.errors.iter().map(|e| e.routine.as_str()).collect();
    assert_eq!(failed, ["BROKEN", "LOOSE"]);
    assert!(matches!(
        out.errors[0].error,
        CompileError::Build(BuildError::UnresolvedLabel { .. })
    ));
    assert!(matches!(
        out.errors[1].error,
        CompileError::Build(BuildError::Structural { .. })
    ));
    assert!(out.errors[0].to_string().starts_with("in BROKEN: "));

    let lowered: Vec<_> = out.routines.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(lowered, [MAIN_ROUTINE, "SQUARE"]);
}

#[test]
fn routines_allocate_their_own_locals() {
    let program = Program {
        main: vec![Statement::assign("G", Expr::int(1))],
        routines: vec![Routine::new(
            "S",
            RoutineKind::Sub,
            Vec::new(),
            vec![Statement::assign("T", Expr::var("G"))],
        )],
    };
    let mut symbols = SymbolTable::new();
    symbols.variable("G", ValueType::Integer, SymbolScope::Shared).unwrap();
    symbols.variable("T", ValueType::Double, SymbolScope::Local("S".into())).unwrap();
    let out = compile_ok(&program, &symbols);

    macro_rules! case {
        ($($routine:expr => $names:expr);*) => {
            $(
                let routine = out.routine($routine).expect("lowered");
                let allocated: Vec<String> = routine
                    .block_ops(BlockId(0))
                    .iter()
                    .filter_map(|op| match op {
                        Op::Alloc { place, .. } => Some(place.to_string()),
                        _ => None,
                    })
                    .collect();
                assert_eq!(allocated, $names);
            )*
        };
    }

    case! {
        MAIN_ROUTINE => ["G"];
        "S" => ["T"]
    };
}

#[test]
fn compiling_twice_is_deterministic() {
    let program = main_only(vec![
        Statement::for_loop(
            "I",
            Expr::int(1),
            Expr::int(3),
            None,
            vec![
                Statement::if_then(Expr::var("I"), vec![Statement::gosub(500u32)], None),
                Statement::while_loop(Expr::var("W"), vec![Statement::exit(ExitKind::Loop(LoopKind::While))]),
            ],
        ),
        Statement::end(),
        print("sub").at_line(500),
        Statement::ret(),
    ]);
    let symbols = SymbolTable::new();
    let first = compile_ok(&program, &symbols);
    let second = compile_ok(&program, &symbols);

    assert_eq!(first.to_string(), second.to_string());
    let main = first.cfg.main.as_ref().expect("main graph");
    for block in main.blocks() {
        assert!(main.shape(block.id()).is_ok(), "{}", qbx_cfg::report::CfgReport(main));
    }
    assert_eq!(first.warnings().count(), second.warnings().count());
}

#[test]
fn options_from_level() {
    assert_eq!(CompileOptions::from_level("1"), Some(CompileOptions::default()));
    let unoptimized = CompileOptions::from_level("0").expect("level 0");
    assert!(!unoptimized.build.eliminate_dead_blocks);
    assert_eq!(CompileOptions::from_level("3"), None);
}
