//! Structural search of a needle sequence inside a method body.
//!
//! Two nodes match when they have the same kind, opcode and operands. Line numbers are ignored on
//! both sides. Host label markers are transparent unless the needle places a marker at that
//! point, in which case the needle marker matches the whole run of consecutive host markers.
//!
//! Labels bind positionally: the first time a needle label is seen (as a branch target or as a
//! marker) it is tied to the host label found at the same position, and every later occurrence
//! inside the same candidate must agree. Temps in the needle capture host slots the same way.

use crate::insn::{Insn, Label, Local};
use crate::insn_list::{InsnList, MatchRegion};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct Bindings {
    /// Needle label → host label.
    fixed: HashMap<Label, Label>,
    /// Needle marker → run of host markers it stands for, until a branch picks one.
    runs: HashMap<Label, Vec<Label>>,
    /// Needle temp → host slot.
    slots: HashMap<u16, u16>,
}

impl Bindings {
    fn target(&mut self, needle: Label, host: Label) -> bool {
        if let Some(&bound) = self.fixed.get(&needle) {
            return bound == host;
        }
        if let Some(run) = self.runs.get(&needle)
            && !run.contains(&host)
        {
            return false;
        }
        self.fixed.insert(needle, host);
        true
    }

    fn marker(&mut self, needle: Label, run: &[Label]) -> bool {
        if let Some(bound) = self.fixed.get(&needle) {
            return run.contains(bound);
        }
        self.runs.insert(needle, run.to_vec());
        true
    }

    fn local(&mut self, needle: Local, host: Local) -> bool {
        match (needle, host) {
            (Local::Temp(temp), Local::Slot(slot)) => *self.slots.entry(temp).or_insert(slot) == slot,
            (needle, host) => needle == host,
        }
    }

    fn finish(mut self) -> (HashMap<Label, Label>, HashMap<u16, u16>) {
        for (needle, run) in self.runs {
            if let Some(&first) = run.first() {
                self.fixed.entry(needle).or_insert(first);
            }
        }
        (self.fixed, self.slots)
    }
}

/// Finds all non-overlapping occurrences of `needle` in `haystack`, scanning greedily from left
/// to right.
///
/// A candidate whose interior contains the start, end or handler marker of any exception range is
/// rejected, so a match never straddles a try/catch boundary. An empty needle matches nowhere.
pub fn find_all(haystack: &InsnList, needle: &InsnList) -> Vec<MatchRegion> {
    let pattern: Vec<&Insn> = needle
        .iter()
        .filter(|insn| !matches!(insn, Insn::Line(_)))
        .collect();
    if pattern.is_empty() {
        return Vec::new();
    }

    let host: Vec<&Insn> = haystack.iter().collect();
    let boundaries: HashSet<Label> = haystack
        .handlers()
        .iter()
        .flat_map(|entry| entry.labels())
        .collect();

    let mut regions = Vec::new();
    let mut start = 0;
    while start < host.len() {
        let region = match_at(&host, &pattern, start)
            .filter(|region| !straddles(&host, region, &boundaries));
        match region {
            Some(region) => {
                tracing::debug!(
                    "Needle matched at [{}, {}) with {} labels bound",
                    region.start,
                    region.end,
                    region.labels.len()
                );
                start = region.end.max(start + 1);
                regions.push(region);
            }
            None => start += 1,
        }
    }
    regions
}

fn straddles(host: &[&Insn], region: &MatchRegion, boundaries: &HashSet<Label>) -> bool {
    host[region.start + 1..region.end]
        .iter()
        .any(|insn| matches!(insn, Insn::Label(label) if boundaries.contains(label)))
}

fn match_at(host: &[&Insn], pattern: &[&Insn], start: usize) -> Option<MatchRegion> {
    match (pattern[0], host[start]) {
        (Insn::Label(_), Insn::Label(_)) => {}
        (Insn::Label(_), _) => return None,
        (_, Insn::Label(_) | Insn::Line(_)) => return None,
        _ => {}
    }

    let mut bindings = Bindings::default();
    let mut hi = start;
    let mut ni = 0;
    while ni < pattern.len() {
        if let Insn::Label(_) = pattern[ni] {
            let mut group = Vec::new();
            while let Some(Insn::Label(label)) = pattern.get(ni) {
                group.push(*label);
                ni += 1;
            }
            let mut run = Vec::new();
            while let Some(insn) = host.get(hi) {
                match insn {
                    Insn::Label(label) => run.push(*label),
                    Insn::Line(_) => {}
                    _ => break,
                }
                hi += 1;
            }
            if run.is_empty() {
                return None;
            }
            for label in group {
                if !bindings.marker(label, &run) {
                    return None;
                }
            }
            continue;
        }

        while host.get(hi).is_some_and(|insn| insn.is_pseudo()) {
            hi += 1;
        }
        let candidate = host.get(hi)?;
        if !same(pattern[ni], candidate, &mut bindings) {
            return None;
        }
        hi += 1;
        ni += 1;
    }

    let (labels, slots) = bindings.finish();
    Some(MatchRegion {
        start,
        end: hi,
        labels,
        slots,
    })
}

fn same(needle: &Insn, host: &Insn, bindings: &mut Bindings) -> bool {
    match (needle, host) {
        (Insn::Simple(a), Insn::Simple(b)) => a == b,
        (Insn::Int(a, x), Insn::Int(b, y)) => a == b && x == y,
        (Insn::Ldc(a), Insn::Ldc(b)) => a == b,
        (Insn::Var(a, x), Insn::Var(b, y)) => a == b && bindings.local(*x, *y),
        (Insn::Iinc(x, a), Insn::Iinc(y, b)) => a == b && bindings.local(*x, *y),
        (Insn::Jump(a, x), Insn::Jump(b, y)) => a == b && bindings.target(*x, *y),
        (Insn::Field(a, x), Insn::Field(b, y)) | (Insn::Method(a, x), Insn::Method(b, y)) => {
            a == b && x == y
        }
        (Insn::Type(a, x), Insn::Type(b, y)) => a == b && x == y,
        (
            Insn::TableSwitch {
                low: a,
                default: da,
                targets: ta,
            },
            Insn::TableSwitch {
                low: b,
                default: db,
                targets: tb,
            },
        ) => {
            a == b
                && ta.len() == tb.len()
                && bindings.target(*da, *db)
                && ta.iter().zip(tb).all(|(x, y)| bindings.target(*x, *y))
        }
        (
            Insn::LookupSwitch {
                default: da,
                pairs: pa,
            },
            Insn::LookupSwitch {
                default: db,
                pairs: pb,
            },
        ) => {
            pa.len() == pb.len()
                && bindings.target(*da, *db)
                && pa
                    .iter()
                    .zip(pb)
                    .all(|((ka, x), (kb, y))| ka == kb && bindings.target(*x, *y))
        }
        _ => false,
    }
}
