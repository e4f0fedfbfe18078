use super::init_tracing;
use graft_core::matcher::find_all;
use graft_core::{ClassNode, Insn, InsnList, Local, MethodNode, Opcode, access, decoder, locals};
use graft_tests::{counter_bytes, method, ops, reparse};

fn replace_all(method: &mut MethodNode, needle: &InsnList, replacement: &InsnList) {
    let regions = find_all(&method.instructions, needle);
    let mut shift = 0isize;
    for region in &regions {
        let region = region.shifted(shift);
        let fragment = replacement.copy().pull_labels(&needle.apply_labels(&region));
        let inserted = method.replace(&region, fragment);
        shift += inserted as isize - region.len() as isize;
    }
}

fn goto_skip() -> MethodNode {
    let mut method = MethodNode::new(access::STATIC, "skip", "()V");
    method
        .instructions
        .jump(Opcode::GOTO, "skip")
        .op(Opcode::NOP)
        .mark("skip")
        .op(Opcode::RETURN);
    method
}

#[test]
fn removed_labels_are_hoisted() {
    init_tracing();
    let mut method = goto_skip();
    replace_all(
        &mut method,
        &ops(&[Opcode::NOP, Opcode::RETURN]),
        &ops(&[Opcode::RETURN]),
    );
    assert_eq!(method.instructions.to_string(), "  GOTO L0\nL0\n  RETURN\n");

    let mut class = ClassNode::new("t/Skip", None);
    class.methods.push(method);
    let decoded = reparse(&class);
    assert_eq!(
        decoded.methods[0].instructions.to_string(),
        "  GOTO L0\nL0\n  RETURN\n"
    );
}

#[test]
fn pulled_marker_moves_with_the_replacement() {
    let mut method = goto_skip();
    let mut needle = InsnList::new();
    needle.mark("at").op(Opcode::RETURN);
    let mut replacement = InsnList::new();
    replacement
        .op(Opcode::ICONST_0)
        .op(Opcode::POP)
        .mark("at")
        .op(Opcode::RETURN);

    replace_all(&mut method, &needle, &replacement);
    assert_eq!(
        method.instructions.to_string(),
        "  GOTO L0\n  NOP\n  ICONST_0\n  POP\nL0\n  RETURN\n"
    );
}

#[test]
fn shared_markers_stay_together_when_one_is_pulled() {
    let mut method = MethodNode::new(access::STATIC, "pair", "()V");
    method
        .instructions
        .op(Opcode::ICONST_0)
        .mark("a")
        .mark("b")
        .op(Opcode::POP)
        .jump(Opcode::GOTO, "a")
        .jump(Opcode::GOTO, "b")
        .op(Opcode::RETURN);
    let (a, b) = (method.instructions.label("a"), method.instructions.label("b"));

    let mut needle = InsnList::new();
    needle.op(Opcode::ICONST_0).mark("t").op(Opcode::POP);
    let mut replacement = InsnList::new();
    replacement
        .op(Opcode::NOP)
        .mark("t")
        .op(Opcode::ICONST_1)
        .op(Opcode::POP);

    replace_all(&mut method, &needle, &replacement);
    let positions = method.instructions.positions();
    assert_eq!(positions[&a] + 1, positions[&b]);
    assert_eq!(
        method.instructions.to_string(),
        "  NOP\nL0\nL1\n  ICONST_1\n  POP\n  GOTO L0\n  GOTO L1\n  RETURN\n"
    );
}

#[test]
fn injected_temps_never_alias_renumbered_locals() {
    let mut method = MethodNode::new(access::STATIC, "spread", "(I)I");
    method
        .instructions
        .var(Opcode::ILOAD, 0)
        .var(Opcode::ISTORE, 7)
        .op(Opcode::LCONST_1)
        .var(Opcode::LSTORE, 3)
        .var(Opcode::ILOAD, 7)
        .op(Opcode::IRETURN);
    method.max_locals = 9;

    locals::renumber(&mut method).unwrap();
    assert_eq!(method.max_locals, 4);

    let mut fragment = InsnList::new();
    fragment
        .op(Opcode::ICONST_0)
        .temp(Opcode::ISTORE, 0)
        .op(Opcode::LCONST_0)
        .temp(Opcode::LSTORE, 1);
    method.prepend(fragment);

    let slots: Vec<Local> = method
        .instructions
        .iter()
        .filter_map(|insn| insn.local().map(|(local, _)| local))
        .collect();
    assert_eq!(
        slots,
        vec![
            Local::Slot(4),
            Local::Slot(5),
            Local::Slot(0),
            Local::Slot(1),
            Local::Slot(2),
            Local::Slot(1),
        ]
    );
    assert_eq!(method.max_locals, 7);

    let mut class = ClassNode::new("t/Spread", None);
    class.methods.push(method);
    assert_eq!(reparse(&class).methods[0].max_locals, 7);
}

#[test]
fn fragment_handlers_come_first() {
    let class = decoder::decode_class(&counter_bytes()).unwrap();
    let mut safe_div = method(&class, "safeDiv", "(II)I").clone();

    let mut guard = InsnList::new();
    guard
        .mark("s")
        .op(Opcode::ICONST_0)
        .op(Opcode::POP)
        .mark("e")
        .jump(Opcode::GOTO, "after")
        .mark("h")
        .op(Opcode::POP)
        .mark("after")
        .try_catch("s", "e", "h", None);
    safe_div.splice(0, 0, guard);

    let catch_types: Vec<Option<&str>> = safe_div
        .instructions
        .handlers()
        .iter()
        .map(|entry| entry.catch_type.as_deref())
        .collect();
    assert_eq!(catch_types, vec![None, Some("java/lang/ArithmeticException")]);

    let mut host = ClassNode::new("t/Guard", None);
    host.methods.push(safe_div);
    let decoded = reparse(&host);
    assert_eq!(decoded.methods[0].instructions.handlers().len(), 2);
    assert_eq!(decoded.methods[0].instructions.handlers()[0].catch_type, None);
}

#[test]
fn each_site_gets_its_own_labels() {
    let mut host = ops(&[Opcode::NOP, Opcode::NOP]);
    let mut fragment = InsnList::new();
    fragment.jump(Opcode::GOTO, "next").mark("next");

    host.splice(2, 0, fragment.copy());
    host.splice(1, 0, fragment.copy());

    assert_eq!(host.extract_labels().len(), 2);
    let positions = host.positions();
    for (index, insn) in host.iter().enumerate() {
        if let Insn::Jump(_, target) = insn {
            assert_eq!(positions[target], index + 1, "jump at {index} lands elsewhere");
        }
    }
}
