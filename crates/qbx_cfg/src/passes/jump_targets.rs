use std::collections::BTreeSet;
use std::iter::Peekable;
use std::slice;

use qbx_middle::parser::statement::{JumpTarget, OnJumpKind, Statement, StatementKind};
use qbx_middle::sourcemap::Span;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceKind {
    /// GOTO, GOSUB and ON..: the target must start a block
    Transfer,
    /// RESTORE only moves the DATA pointer
    Data,
}

#[derive(Debug)]
struct Reference {
    target: JumpTarget,
    span: Span,
    kind: ReferenceKind,
}

/// Every line number and label of one routine that is the target of a non-structured transfer.
///
/// Positions are identified by their canonical key ([`Statement::position`]), so a statement that carries
/// both a line number and a label is one landing zone no matter which name a jump uses.
#[derive(Debug, Default)]
pub struct JumpTargets {
    /// Every defined name, mapped to the canonical key of the statement it names
    definitions: FxHashMap<JumpTarget, JumpTarget>,
    landing_zones: BTreeSet<JumpTarget>,
    /// Canonical keys of statements that directly follow a GOSUB or ON..GOSUB in the same statement list
    return_sites: BTreeSet<JumpTarget>,
    unresolved: Vec<(JumpTarget, Span)>,
    duplicates: Vec<(JumpTarget, Span)>,
}

impl JumpTargets {
    /// Scans a routine body, including all nested bodies.
    ///
    /// The walk uses an explicit stack, so arbitrarily deep nesting cannot exhaust the native stack here.
    /// Unknown targets never abort the scan; they are collected and reported by [`JumpTargets::check`].
    pub fn scan(body: &[Statement]) -> Self {
        let mut this = Self::default();
        let mut references = Vec::new();
        let mut stack: Vec<Peekable<slice::Iter<'_, Statement>>> = vec![body.iter().peekable()];

        while let Some(iter) = stack.last_mut() {
            let Some(stmt) = iter.next() else {
                stack.pop();
                continue;
            };
            let next = iter.peek().copied();

            this.define(stmt);
            this.collect_references(stmt, next, &mut references);

            let start = stack.len();
            stack.extend(child_bodies(stmt).into_iter().map(|body| body.iter().peekable()));
            stack[start..].reverse();
        }

        for Reference { target, span, kind } in references {
            match this.definitions.get(&target) {
                Some(key) => {
                    if kind == ReferenceKind::Transfer {
                        this.landing_zones.insert(key.clone());
                    }
                }
                None => this.unresolved.push((target, span)),
            }
        }

        qbx_log::debug!(
            landing_zones = this.landing_zones.len(),
            return_sites = this.return_sites.len(),
            "scanned jump targets"
        );
        this
    }

    fn define(&mut self, stmt: &Statement) {
        let Some(key) = stmt.position() else {
            return;
        };
        for name in stmt.names() {
            if self.definitions.contains_key(&name) {
                self.duplicates.push((name, stmt.span));
            } else {
                self.definitions.insert(name, key.clone());
            }
        }
    }

    fn collect_references(&mut self, stmt: &Statement, next: Option<&Statement>, out: &mut Vec<Reference>) {
        let transfer = |target: &JumpTarget| Reference {
            target: target.clone(),
            span: stmt.span,
            kind: ReferenceKind::Transfer,
        };

        match &stmt.kind {
            StatementKind::Goto(target) => out.push(transfer(target)),
            StatementKind::Gosub(target) => {
                out.push(transfer(target));
                self.mark_return_site(next);
            }
            StatementKind::On(on) => {
                out.extend(on.targets.iter().map(transfer));
                if on.kind == OnJumpKind::Gosub {
                    self.mark_return_site(next);
                }
            }
            StatementKind::Restore(Some(target)) => out.push(Reference {
                target: target.clone(),
                span: stmt.span,
                kind: ReferenceKind::Data,
            }),
            _ => {}
        }
    }

    /// The statement after a call site is where RETURN lands. It needs a block of its own only if it can be named,
    /// otherwise the builder creates the return block on the spot.
    fn mark_return_site(&mut self, next: Option<&Statement>) {
        if let Some(key) = next.and_then(Statement::position) {
            self.landing_zones.insert(key.clone());
            self.return_sites.insert(key);
        }
    }

    /// The canonical key `target` refers to
    pub fn resolve(&self, target: &JumpTarget) -> Option<&JumpTarget> {
        self.definitions.get(target)
    }

    pub fn is_landing_zone(&self, key: &JumpTarget) -> bool {
        self.landing_zones.contains(key)
    }

    pub fn is_return_site(&self, key: &JumpTarget) -> bool {
        self.return_sites.contains(key)
    }

    pub fn landing_zones(&self) -> &BTreeSet<JumpTarget> {
        &self.landing_zones
    }

    pub fn return_sites(&self) -> &BTreeSet<JumpTarget> {
        &self.return_sites
    }

    pub fn unresolved(&self) -> &[(JumpTarget, Span)] {
        &self.unresolved
    }

    pub fn duplicates(&self) -> &[(JumpTarget, Span)] {
        &self.duplicates
    }

    /// Fails with the first duplicate definition, or else the first unresolved reference, in source order
    pub fn check(&self) -> Result<(), Error> {
        if let Some((target, span)) = self.duplicates.first() {
            return Err(Error::DuplicateLabel {
                target: target.clone(),
                span: *span,
            });
        }
        if let Some((target, span)) = self.unresolved.first() {
            return Err(Error::UnresolvedLabel {
                target: target.clone(),
                span: *span,
            });
        }
        Ok(())
    }
}

/// Nested statement lists of a compound statement, in source order
fn child_bodies(stmt: &Statement) -> SmallVec<[&[Statement]; 4]> {
    let mut bodies = SmallVec::new();
    match &stmt.kind {
        StatementKind::If(i) => {
            bodies.push(i.then.as_slice());
            bodies.extend(i.else_ifs.iter().map(|(_, body)| body.as_slice()));
            bodies.extend(i.el.as_deref());
        }
        StatementKind::Select(s) => {
            bodies.extend(s.cases.iter().map(|arm| arm.body.as_slice()));
            bodies.extend(s.default.as_deref());
        }
        StatementKind::For(l) => bodies.push(l.body.as_slice()),
        StatementKind::While(l) => bodies.push(l.body.as_slice()),
        StatementKind::Do(l) => bodies.push(l.body.as_slice()),
        StatementKind::Try(t) => {
            bodies.push(t.body.as_slice());
            bodies.extend(t.catch.as_ref().map(|c| c.body.as_slice()));
            bodies.extend(t.finally.as_deref());
        }
        _ => {}
    }
    bodies
}
