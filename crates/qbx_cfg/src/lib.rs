use std::collections::BTreeMap;

use error::Error;
use graph::{ControlFlowGraph, UnitKind};
use options::BuildOptions;
use passes::build::CfgBuilder;
use passes::jump_targets::JumpTargets;
use qbx_middle::parser::statement::{Program, Statement};

pub mod error;
pub mod graph;
pub mod options;
pub mod passes;
pub mod report;


/// Name of the graph built for the main program
pub const MAIN_ROUTINE: &str = "MAIN";

/// Builds, verifies and cleans up the graph of one program unit
pub fn build_routine<'a>(
    name: &str,
    unit: UnitKind,
    body: &'a [Statement],
    options: BuildOptions,
) -> Result<ControlFlowGraph<'a>, Error> {
    let span = qbx_log::routine_span("build", name);
    let _entered = span.enter();

    let targets = JumpTargets::scan(body);
    targets.check()?;

    let mut cfg = CfgBuilder::new(name, unit, &targets, options).build(body)?;

    passes::verify::verify_shapes(&cfg)?;
    passes::verify::verify_loop_headers(&cfg)?;
    passes::verify::verify_gosub_sites(&cfg)?;

    if options.eliminate_dead_blocks {
        passes::eliminate::eliminate(&mut cfg);
    }
    Ok(cfg)
}

/// The graphs of a whole program
#[derive(Debug, Default)]
pub struct ProgramCfg<'a> {
    /// [`None`] if the main program failed to build
    pub main: Option<ControlFlowGraph<'a>>,
    pub routines: BTreeMap<String, ControlFlowGraph<'a>>,
}

impl<'a> ProgramCfg<'a> {
    /// All graphs, main program first, then routines by name
    pub fn graphs(&self) -> impl Iterator<Item = &ControlFlowGraph<'a>> + '_ {
        self.main.iter().chain(self.routines.values())
    }
}

#[derive(Debug, Default)]
pub struct ProgramBuild<'a> {
    pub cfg: ProgramCfg<'a>,
    /// Routines that failed to build, in program order
    pub errors: Vec<(String, Error)>,
}

/// Builds every program unit. A failing unit does not stop the others from being built.
pub fn build_program(program: &Program, options: BuildOptions) -> ProgramBuild<'_> {
    let mut out = ProgramBuild::default();

    match build_routine(MAIN_ROUTINE, UnitKind::Main, &program.main, options) {
        Ok(cfg) => out.cfg.main = Some(cfg),
        Err(err) => out.errors.push((MAIN_ROUTINE.to_owned(), err)),
    }

    for routine in &program.routines {
        match build_routine(&routine.name, routine.kind.into(), &routine.body, options) {
            Ok(cfg) => {
                out.cfg.routines.insert(routine.name.clone(), cfg);
            }
            Err(err) => {
                qbx_log::error!(routine = %routine.name, %err, "failed to build");
                out.errors.push((routine.name.clone(), err));
            }
        }
    }

    out
}
