//! Operand stack depth analysis.

use crate::insn_list::InsnList;
use std::collections::VecDeque;

/// Computes the maximum operand stack depth reached by `list`.
///
/// Depths are propagated along fall-through, branch and switch edges starting from the first
/// node at depth 0; exception handlers are entered with the thrown reference on the stack. The
/// first depth reaching a node wins. Underflow is clamped to zero and logged.
pub fn max_stack(list: &InsnList) -> u16 {
    let len = list.len();
    if len == 0 {
        return 0;
    }
    let positions = list.positions();
    let mut depth: Vec<Option<i32>> = vec![None; len];
    let mut work = VecDeque::new();

    depth[0] = Some(0);
    work.push_back(0usize);
    for entry in list.handlers() {
        if let Some(&pos) = positions.get(&entry.handler)
            && depth[pos].is_none()
        {
            depth[pos] = Some(1);
            work.push_back(pos);
        }
    }

    let mut max = 0i32;
    while let Some(index) = work.pop_front() {
        let Some(insn) = list.get(index) else {
            continue;
        };
        let before = depth[index].unwrap_or(0);
        max = max.max(before);
        let mut after = before + insn.stack_delta();
        if after < 0 {
            tracing::warn!(
                "Stack underflow at node {} ({:?}): depth {} -> {}",
                index,
                insn,
                before,
                after
            );
            after = 0;
        }
        max = max.max(after);

        let mut successors: Vec<usize> = insn
            .targets()
            .iter()
            .filter_map(|label| positions.get(label).copied())
            .collect();
        if !insn.ends_flow() && index + 1 < len {
            successors.push(index + 1);
        }
        for next in successors {
            if depth[next].is_none() {
                depth[next] = Some(after);
                work.push_back(next);
            }
        }
    }
    u16::try_from(max).unwrap_or(u16::MAX)
}
