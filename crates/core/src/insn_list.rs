//! Editable instruction sequences.
//!
//! An [`InsnList`] is an arena of [`Insn`] nodes plus an `order` vector that lists the live
//! nodes. Labels are arena indices of their marker nodes, so branches, try/catch entries and
//! debug ranges refer to labels by index rather than by pointer. Splicing only rewrites `order`,
//! which keeps every label valid across insertions elsewhere in the list.
//!
//! Fragments (needles, injections, replacements) are ordinary lists. Their labels can be named,
//! and names are how a fragment refers to labels of the code it was matched against:
//!
//! ```text
//! needle:      ILOAD 1; IFEQ @skip          (@skip binds to the host's real target)
//! injection:   ALOAD 0; INVOKEVIRTUAL ...; GOTO @skip
//! ```
//!
//! [`InsnList::apply_labels`] turns a [`MatchRegion`] into a [`Binding`] keyed by name,
//! [`InsnList::merge_labels`] and [`InsnList::pull_labels`] attach that binding to a fragment, and
//! [`InsnList::splice`] consumes it.

use crate::insn::{Constant, Insn, Label, Local, MemberRef};
use crate::Opcode;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Exception-table entry covering `[start, end)` and transferring control to `handler`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryCatch {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    /// Caught class, or `None` for a catch-all (`finally`) entry.
    pub catch_type: Option<String>,
}

impl TryCatch {
    pub fn labels(&self) -> [Label; 3] {
        [self.start, self.end, self.handler]
    }

    fn map_labels(&self, map: impl Fn(Label) -> Label) -> TryCatch {
        TryCatch {
            start: map(self.start),
            end: map(self.end),
            handler: map(self.handler),
            catch_type: self.catch_type.clone(),
        }
    }
}

/// Located occurrence of a needle inside a haystack list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRegion {
    /// Index of the first matched node (inclusive).
    pub start: usize,
    /// Index one past the last matched node.
    pub end: usize,
    /// Needle label → haystack label at this occurrence.
    pub labels: HashMap<Label, Label>,
    /// Needle temp → haystack slot at this occurrence.
    pub slots: HashMap<u16, u16>,
}

impl MatchRegion {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Same region moved by `shift` nodes, used when earlier splices changed the list length.
    pub fn shifted(&self, shift: isize) -> MatchRegion {
        MatchRegion {
            start: self.start.saturating_add_signed(shift),
            end: self.end.saturating_add_signed(shift),
            labels: self.labels.clone(),
            slots: self.slots.clone(),
        }
    }
}

/// Name-keyed view of a match, shareable between the needle and other fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    pub labels: BTreeMap<String, Label>,
    pub slots: BTreeMap<u16, u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Import {
    host: Label,
    /// Re-emit the host marker where this fragment places its own marker.
    keep_marker: bool,
}

/// Ordered, mutable sequence of instruction nodes.
#[derive(Debug, Clone, Default)]
pub struct InsnList {
    arena: Vec<Insn>,
    order: Vec<u32>,
    handlers: Vec<TryCatch>,
    names: BTreeMap<String, Label>,
    imports: HashMap<Label, Import>,
    captured_slots: BTreeMap<u16, u16>,
}

impl PartialEq for InsnList {
    /// Structural equality of the live node sequence and exception table.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a == b)
            && self.handlers == other.handlers
    }
}

impl InsnList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes, pseudo nodes included.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Insn> {
        self.order.get(index).map(|&idx| &self.arena[idx as usize])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Insn> + '_ {
        self.order.iter().map(|&idx| &self.arena[idx as usize])
    }

    /// Live nodes that encode to bytes.
    pub fn real(&self) -> impl Iterator<Item = &Insn> + '_ {
        self.iter().filter(|insn| !insn.is_pseudo())
    }

    pub fn handlers(&self) -> &[TryCatch] {
        &self.handlers
    }

    pub fn names(&self) -> &BTreeMap<String, Label> {
        &self.names
    }

    /// Removes every node, handler, name and pending binding.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Applies `f` to every live node in place.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Insn)) {
        for &idx in &self.order {
            f(&mut self.arena[idx as usize]);
        }
    }

    pub(crate) fn handlers_mut(&mut self) -> &mut Vec<TryCatch> {
        &mut self.handlers
    }

    // ---------------------------------------------------------------------------------------------
    // building

    /// Allocates a label without placing its marker.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.arena.len() as u32);
        self.arena.push(Insn::Label(label));
        label
    }

    /// Returns the label registered under `name`, allocating it on first use.
    pub fn label(&mut self, name: &str) -> Label {
        if let Some(&label) = self.names.get(name) {
            return label;
        }
        let label = self.new_label();
        self.names.insert(name.to_string(), label);
        label
    }

    /// Places the marker of `label` at the end of the list.
    pub fn place(&mut self, label: Label) -> &mut Self {
        debug_assert!(matches!(
            self.arena.get(label.0 as usize),
            Some(Insn::Label(l)) if *l == label
        ));
        self.order.push(label.0);
        self
    }

    /// Places the named label at the end of the list.
    pub fn mark(&mut self, name: &str) -> &mut Self {
        let label = self.label(name);
        self.place(label)
    }

    /// Appends a node. Label markers are placed rather than copied.
    pub fn push(&mut self, insn: Insn) -> &mut Self {
        if let Insn::Label(label) = insn {
            return self.place(label);
        }
        self.order.push(self.arena.len() as u32);
        self.arena.push(insn);
        self
    }

    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        self.push(Insn::Simple(opcode))
    }

    pub fn int(&mut self, opcode: Opcode, value: i32) -> &mut Self {
        self.push(Insn::Int(opcode, value))
    }

    /// Pushes an `int` constant using the shortest instruction for it.
    pub fn push_int(&mut self, value: i32) -> &mut Self {
        match value {
            -1..=5 => {
                let op = Opcode::from_byte((Opcode::ICONST_0.to_byte() as i32 + value) as u8)
                    .unwrap_or(Opcode::ICONST_0);
                self.op(op)
            }
            v if i8::try_from(v).is_ok() => self.int(Opcode::BIPUSH, v),
            v if i16::try_from(v).is_ok() => self.int(Opcode::SIPUSH, v),
            v => self.ldc(Constant::Int(v)),
        }
    }

    pub fn ldc(&mut self, constant: Constant) -> &mut Self {
        self.push(Insn::Ldc(constant))
    }

    pub fn var(&mut self, opcode: Opcode, slot: u16) -> &mut Self {
        self.push(Insn::Var(opcode, Local::Slot(slot)))
    }

    /// Local access through a block-private temp.
    pub fn temp(&mut self, opcode: Opcode, temp: u16) -> &mut Self {
        self.push(Insn::Var(opcode, Local::Temp(temp)))
    }

    pub fn iinc(&mut self, local: Local, delta: i16) -> &mut Self {
        self.push(Insn::Iinc(local, delta))
    }

    /// Branch to the label registered under `name`.
    pub fn jump(&mut self, opcode: Opcode, name: &str) -> &mut Self {
        let label = self.label(name);
        self.push(Insn::Jump(opcode, label))
    }

    pub fn field(&mut self, opcode: Opcode, owner: &str, name: &str, desc: &str) -> &mut Self {
        self.push(Insn::Field(opcode, MemberRef::new(owner, name, desc)))
    }

    pub fn invoke(&mut self, opcode: Opcode, owner: &str, name: &str, desc: &str) -> &mut Self {
        let mut member = MemberRef::new(owner, name, desc);
        member.interface = opcode == Opcode::INVOKEINTERFACE;
        self.push(Insn::Method(opcode, member))
    }

    pub fn type_insn(&mut self, opcode: Opcode, class: &str) -> &mut Self {
        self.push(Insn::Type(opcode, class.to_string()))
    }

    pub fn line(&mut self, line: u16) -> &mut Self {
        self.push(Insn::Line(line))
    }

    /// Adds an exception-table entry over named labels.
    pub fn try_catch(
        &mut self,
        start: &str,
        end: &str,
        handler: &str,
        catch_type: Option<&str>,
    ) -> &mut Self {
        let entry = TryCatch {
            start: self.label(start),
            end: self.label(end),
            handler: self.label(handler),
            catch_type: catch_type.map(str::to_string),
        };
        self.handlers.push(entry);
        self
    }

    pub fn add_handler(&mut self, entry: TryCatch) -> &mut Self {
        self.handlers.push(entry);
        self
    }

    /// Takes the built list out of a `&mut` builder chain.
    pub fn build(&mut self) -> InsnList {
        std::mem::take(self)
    }

    // ---------------------------------------------------------------------------------------------
    // labels

    /// Labels whose markers are placed in this list.
    pub fn extract_labels(&self) -> BTreeSet<Label> {
        self.iter()
            .filter_map(|insn| match insn {
                Insn::Label(label) => Some(*label),
                _ => None,
            })
            .collect()
    }

    /// Index of every placed label marker.
    pub fn positions(&self) -> HashMap<Label, usize> {
        self.iter()
            .enumerate()
            .filter_map(|(pos, insn)| match insn {
                Insn::Label(label) => Some((*label, pos)),
                _ => None,
            })
            .collect()
    }

    /// Deep copy holding only live nodes, with fresh label identities and no pending binding.
    pub fn copy(&self) -> InsnList {
        let mut out = InsnList::new();
        let mut remap: HashMap<Label, Label> = HashMap::new();

        let referenced = self
            .iter()
            .flat_map(|insn| match insn {
                Insn::Label(label) => vec![*label],
                other => other.targets(),
            })
            .chain(self.handlers.iter().flat_map(TryCatch::labels))
            .chain(self.names.values().copied());
        for label in referenced {
            if !remap.contains_key(&label) {
                let fresh = out.new_label();
                remap.insert(label, fresh);
            }
        }

        let map = |label: Label| remap.get(&label).copied().unwrap_or(label);
        for insn in self.iter() {
            out.push(insn.map_labels(map));
        }
        out.handlers = self.handlers.iter().map(|h| h.map_labels(map)).collect();
        out.names = self
            .names
            .iter()
            .map(|(name, label)| (name.clone(), map(*label)))
            .collect();
        out
    }

    /// Converts a region matched with this list as the needle into a name-keyed binding.
    pub fn apply_labels(&self, region: &MatchRegion) -> Binding {
        let labels = self
            .names
            .iter()
            .filter_map(|(name, label)| {
                region
                    .labels
                    .get(label)
                    .map(|host| (name.clone(), *host))
            })
            .collect();
        Binding {
            labels,
            slots: region.slots.iter().map(|(t, s)| (*t, *s)).collect(),
        }
    }

    /// Binds this fragment's named labels to host labels. Bound markers are dropped on splice, so
    /// the fragment's branches land on the host's existing positions.
    pub fn merge_labels(self, binding: &Binding) -> InsnList {
        self.bind(binding, false)
    }

    /// Binds this fragment's named labels to host labels and takes over their markers: the host
    /// marker is re-emitted wherever the fragment places its own.
    pub fn pull_labels(self, binding: &Binding) -> InsnList {
        self.bind(binding, true)
    }

    fn bind(mut self, binding: &Binding, keep_marker: bool) -> InsnList {
        for (name, host) in &binding.labels {
            if let Some(&own) = self.names.get(name) {
                self.imports.insert(
                    own,
                    Import {
                        host: *host,
                        keep_marker,
                    },
                );
            }
        }
        self.captured_slots = binding.slots.clone();
        self
    }

    // ---------------------------------------------------------------------------------------------
    // locals

    /// Temps used by the live nodes with the widest access seen for each.
    pub fn temps(&self) -> BTreeMap<u16, u16> {
        let mut temps = BTreeMap::new();
        for (local, width) in self.iter().filter_map(Insn::local) {
            if let Local::Temp(temp) = local {
                let entry = temps.entry(temp).or_insert(width);
                *entry = (*entry).max(width);
            }
        }
        temps
    }

    /// Slots captured for temps by the last `merge_labels`/`pull_labels`.
    pub fn captured_slots(&self) -> &BTreeMap<u16, u16> {
        &self.captured_slots
    }

    /// Rewrites temps to concrete slots; temps missing from `slots` are left untouched.
    pub fn bind_temps(&mut self, slots: &BTreeMap<u16, u16>) {
        self.for_each_mut(|insn| {
            *insn = insn.map_local(|local| match local {
                Local::Temp(temp) => slots.get(&temp).map_or(local, |slot| Local::Slot(*slot)),
                slot => slot,
            });
        });
    }

    /// First slot past every concrete slot referenced by the live nodes.
    pub fn slot_frontier(&self) -> u16 {
        self.iter()
            .filter_map(Insn::local)
            .filter_map(|(local, width)| match local {
                Local::Slot(slot) => Some(slot.saturating_add(width)),
                Local::Temp(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    // ---------------------------------------------------------------------------------------------
    // splicing

    /// Replaces `remove` nodes at `at` with the contents of `fragment`.
    ///
    /// The fragment's labels get fresh identities in this list unless bound through
    /// [`merge_labels`](Self::merge_labels) or [`pull_labels`](Self::pull_labels). Removed label
    /// markers that the fragment does not re-emit are kept, hoisted to the start of the inserted
    /// segment, so nothing that branched to them dangles. A removed marker that shared its
    /// position with a re-emitted one (only line nodes in between) is placed right next to it.
    /// The fragment's exception entries are placed ahead of the existing ones. Returns the number
    /// of nodes inserted.
    pub fn splice(&mut self, at: usize, remove: usize, fragment: InsnList) -> usize {
        let at = at.min(self.order.len());
        let end = at.saturating_add(remove).min(self.order.len());
        let removed: Vec<u32> = self.order.drain(at..end).collect();
        let live: HashSet<u32> = self.order.iter().copied().collect();
        let runs = self.marker_runs(&removed);

        let mut remap: HashMap<Label, Label> = HashMap::new();
        for insn in &fragment.arena {
            if let Insn::Label(label) = insn {
                let host = match fragment.imports.get(label) {
                    Some(import) => import.host,
                    None => self.new_label(),
                };
                remap.insert(*label, host);
            }
        }
        let map = |label: Label| remap.get(&label).copied().unwrap_or(label);

        let mut segment = Vec::with_capacity(fragment.order.len());
        let mut emitted = HashSet::new();
        for &idx in &fragment.order {
            match &fragment.arena[idx as usize] {
                Insn::Label(label) => {
                    let host = map(*label);
                    let keep = fragment
                        .imports
                        .get(label)
                        .is_none_or(|import| import.keep_marker);
                    // A bound marker that is still placed elsewhere in the host keeps its position.
                    if keep && !live.contains(&host.0) && emitted.insert(host) {
                        segment.push(host.0);
                        let run = runs.get(&host).map(Vec::as_slice).unwrap_or_default();
                        for &other in run {
                            if !live.contains(&other.0) && emitted.insert(other) {
                                segment.push(other.0);
                            }
                        }
                    }
                }
                insn => {
                    segment.push(self.arena.len() as u32);
                    self.arena.push(insn.map_labels(map));
                }
            }
        }

        let hoisted: Vec<u32> = removed
            .into_iter()
            .filter(|&idx| match self.arena[idx as usize] {
                Insn::Label(label) => !emitted.contains(&label),
                _ => false,
            })
            .collect();

        let inserted = hoisted.len() + segment.len();
        self.order
            .splice(at..at, hoisted.into_iter().chain(segment));
        let entries: Vec<TryCatch> = fragment.handlers.iter().map(|h| h.map_labels(map)).collect();
        self.handlers.splice(0..0, entries);
        inserted
    }

    /// Groups the label markers among `nodes` that sit at one position, keyed by each member.
    fn marker_runs(&self, nodes: &[u32]) -> HashMap<Label, Vec<Label>> {
        let mut runs = HashMap::new();
        let mut run: Vec<Label> = Vec::new();
        for &idx in nodes.iter().chain(std::iter::once(&u32::MAX)) {
            match self.arena.get(idx as usize) {
                Some(Insn::Label(label)) => run.push(*label),
                Some(Insn::Line(_)) => {}
                _ => {
                    if run.len() > 1 {
                        for label in &run {
                            runs.insert(*label, run.clone());
                        }
                    }
                    run.clear();
                }
            }
        }
        runs
    }
}
