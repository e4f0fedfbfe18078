//! Local slot renumbering.
//!
//! Parameters keep their slots. Every other (slot, width) pair gets a fresh, densely packed slot
//! in order of first appearance in the code and then in the debug table, so that injected code
//! which allocates from `max_locals` upward never aliases an existing local. A slot that is used
//! with two different widths becomes two distinct locals.

use crate::descriptor;
use crate::insn::Local;
use crate::result::Result;
use crate::tree::MethodNode;
use std::collections::HashMap;

/// Renumbers the locals of `method` in place and updates `max_locals`.
pub fn renumber(method: &mut MethodNode) -> Result<()> {
    let params = method.param_slots()?;
    let mut next = params;
    let mut remap: HashMap<(u16, u16), u16> = HashMap::new();

    let used: Vec<(u16, u16)> = method
        .instructions
        .iter()
        .filter_map(|insn| insn.local())
        .filter_map(|(local, width)| match local {
            Local::Slot(slot) => Some((slot, width)),
            Local::Temp(_) => None,
        })
        .chain(method.local_vars.iter().map(|var| {
            let width = descriptor::field_width(&var.desc).unwrap_or(1);
            (var.slot, width)
        }))
        .collect();

    // Parameter slots stay put; a wide access starting inside them still reserves its tail.
    for &(slot, width) in &used {
        if slot < params {
            next = next.max(slot.saturating_add(width));
        }
    }
    for &(slot, width) in &used {
        if slot < params || remap.contains_key(&(slot, width)) {
            continue;
        }
        remap.insert((slot, width), next);
        next = next.saturating_add(width);
    }

    method.instructions.for_each_mut(|insn| {
        let width = insn.local().map_or(1, |(_, width)| width);
        *insn = insn.map_local(|local| match local {
            Local::Slot(slot) => Local::Slot(remap.get(&(slot, width)).copied().unwrap_or(slot)),
            temp => temp,
        });
    });
    for var in &mut method.local_vars {
        let width = descriptor::field_width(&var.desc).unwrap_or(1);
        if let Some(&slot) = remap.get(&(var.slot, width)) {
            var.slot = slot;
        }
    }

    tracing::debug!(
        "Renumbered {}{}: {} locals moved, max_locals {} -> {}",
        method.name,
        method.desc,
        remap.len(),
        method.max_locals,
        next
    );
    method.max_locals = next;
    Ok(())
}
