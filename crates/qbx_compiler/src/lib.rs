//! Drives the middle tier over a whole program: every unit is built into a control flow graph and lowered into an
//! op stream. A unit that fails does not stop the others.

use std::fmt;

use qbx_cfg::error::Error as BuildError;
use qbx_cfg::options::BuildOptions;
use qbx_cfg::{build_program, ProgramCfg};
use qbx_linearize::error::{LinearizeError, Warning};
use qbx_linearize::options::LinearizeOptions;
use qbx_linearize::{linearize, LinearizedRoutine};
use qbx_middle::parser::statement::Program;
use qbx_middle::symbols::SymbolTable;
use thiserror::Error;

#[cfg(test)]
mod test;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    pub build: BuildOptions,
    pub linearize: LinearizeOptions,
}

impl CompileOptions {
    pub fn from_level(level: &str) -> Option<Self> {
        BuildOptions::from_level(level).map(|build| Self {
            build,
            linearize: LinearizeOptions::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Linearize(#[from] LinearizeError),
}

/// A fatal error that stopped one program unit
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("in {routine}: {error}")]
pub struct RoutineError {
    pub routine: String,
    pub error: CompileError,
}

#[derive(Debug, Default)]
pub struct CompileOutput<'a> {
    pub cfg: ProgramCfg<'a>,
    /// Lowered units, main program first, then routines by name
    pub routines: Vec<LinearizedRoutine<'a>>,
    pub errors: Vec<RoutineError>,
}

impl<'a> CompileOutput<'a> {
    pub fn routine(&self, name: &str) -> Option<&LinearizedRoutine<'a>> {
        self.routines.iter().find(|r| r.name == name)
    }

    /// Warnings of every lowered unit, tagged with the unit's name
    pub fn warnings(&self) -> impl Iterator<Item = (&str, &Warning)> + '_ {
        self.routines
            .iter()
            .flat_map(|r| r.warnings.iter().map(move |w| (r.name.as_str(), w)))
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for CompileOutput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, routine) in self.routines.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{routine}")?;
        }
        Ok(())
    }
}

pub fn compile<'a>(program: &'a Program, symbols: &'a SymbolTable, options: CompileOptions) -> CompileOutput<'a> {
    let build = build_program(program, options.build);

    let mut errors: Vec<RoutineError> = build
        .errors
        .into_iter()
        .map(|(routine, error)| RoutineError {
            routine,
            error: error.into(),
        })
        .collect();

    let mut routines = Vec::new();
    for cfg in build.cfg.graphs() {
        match linearize(cfg, symbols, options.linearize) {
            Ok(routine) => {
                qbx_log::debug!(routine = cfg.name(), ops = routine.ops.len(), "linearized");
                routines.push(routine);
            }
            Err(err) => {
                qbx_log::error!(routine = cfg.name(), %err, "failed to linearize");
                errors.push(RoutineError {
                    routine: cfg.name().to_owned(),
                    error: err.into(),
                });
            }
        }
    }

    CompileOutput {
        cfg: build.cfg,
        routines,
        errors,
    }
}
