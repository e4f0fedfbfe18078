use super::{patched, registry};
use graft_core::{Constant, Insn, InsnList, Local, Opcode, access, decoder};
use graft_core::result::Error as CoreError;
use graft_transform::{CodeEdit, Error};
use graft_tests::{counter_bytes, method, opcodes, ops, target};

fn println(text: &str) -> InsnList {
    let mut list = InsnList::new();
    list.field(
        Opcode::GETSTATIC,
        "java/lang/System",
        "out",
        "Ljava/io/PrintStream;",
    )
    .ldc(Constant::String(text.to_string()))
    .invoke(
        Opcode::INVOKEVIRTUAL,
        "java/io/PrintStream",
        "println",
        "(Ljava/lang/String;)V",
    );
    list
}

fn locals_of(insns: &InsnList) -> Vec<Local> {
    insns
        .iter()
        .filter_map(|insn| insn.local().map(|(local, _)| local))
        .collect()
}

#[test]
fn inject_at_start_runs_before_the_body() {
    let class = patched(vec![CodeEdit::inject_at_start(
        target("run", "()V"),
        println("run"),
    )]);
    assert_eq!(
        opcodes(method(&class, "run", "()V")),
        vec![
            Opcode::GETSTATIC,
            Opcode::LDC,
            Opcode::INVOKEVIRTUAL,
            Opcode::ALOAD,
            Opcode::ICONST_1,
            Opcode::INVOKEVIRTUAL,
            Opcode::POP,
            Opcode::RETURN,
        ]
    );
}

#[test]
fn inject_at_end_appends_after_the_last_node() {
    let class = patched(vec![CodeEdit::inject_at_end(
        target("run", "()V"),
        ops(&[Opcode::NOP]),
    )]);
    assert_eq!(
        opcodes(method(&class, "run", "()V")),
        vec![
            Opcode::ALOAD,
            Opcode::ICONST_1,
            Opcode::INVOKEVIRTUAL,
            Opcode::POP,
            Opcode::RETURN,
            Opcode::NOP,
        ]
    );
}

#[test]
fn inject_before_every_occurrence() {
    let edit = CodeEdit::inject_before(
        target("classify", "(I)Ljava/lang/String;"),
        ops(&[Opcode::ARETURN]),
        ops(&[Opcode::DUP, Opcode::POP]),
    );
    let (bytes, report) = registry(vec![edit])
        .transform_with_report("t.Counter", &counter_bytes())
        .unwrap()
        .unwrap();
    assert_eq!(report.edits[0].sites, 5);

    let class = decoder::decode_class(&bytes).unwrap();
    let classify = opcodes(method(&class, "classify", "(I)Ljava/lang/String;"));
    let guarded = classify
        .windows(3)
        .filter(|w| w == &[Opcode::DUP, Opcode::POP, Opcode::ARETURN])
        .count();
    assert_eq!(guarded, 5);
}

#[test]
fn injected_branch_reuses_the_matched_label() {
    let mut needle = InsnList::new();
    needle
        .var(Opcode::ILOAD, 2)
        .var(Opcode::ILOAD, 0)
        .jump(Opcode::IF_ICMPGE, "exit");
    let mut injection = InsnList::new();
    injection.var(Opcode::ILOAD, 1).jump(Opcode::IFLT, "exit");

    let class = patched(vec![CodeEdit::inject_after(
        target("sum", "(I)I"),
        needle,
        injection,
    )]);
    let sum = method(&class, "sum", "(I)I");
    let targets: Vec<_> = sum
        .instructions
        .iter()
        .filter_map(|insn| match insn {
            Insn::Jump(op, label) if *op != Opcode::GOTO => Some(*label),
            _ => None,
        })
        .collect();
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0], targets[1]);
}

#[test]
fn replace_substitutes_the_matched_run() {
    let mut needle = InsnList::new();
    needle
        .var(Opcode::ILOAD, 1)
        .var(Opcode::ILOAD, 2)
        .op(Opcode::IADD);
    let mut replacement = InsnList::new();
    replacement
        .var(Opcode::ILOAD, 2)
        .var(Opcode::ILOAD, 1)
        .op(Opcode::ISUB);

    let class = patched(vec![CodeEdit::replace(
        target("sum", "(I)I"),
        needle,
        replacement,
    )]);
    let sum = method(&class, "sum", "(I)I");
    assert_eq!(
        opcodes(sum),
        vec![
            Opcode::ICONST_0,
            Opcode::ISTORE,
            Opcode::ICONST_0,
            Opcode::ISTORE,
            Opcode::ILOAD,
            Opcode::ILOAD,
            Opcode::IF_ICMPGE,
            Opcode::ILOAD,
            Opcode::ILOAD,
            Opcode::ISUB,
            Opcode::ISTORE,
            Opcode::IINC,
            Opcode::GOTO,
            Opcode::ILOAD,
            Opcode::IRETURN,
        ]
    );
}

#[test]
fn replacement_temps_reuse_captured_slots() {
    let mut needle = InsnList::new();
    needle
        .temp(Opcode::ILOAD, 0)
        .temp(Opcode::ILOAD, 1)
        .op(Opcode::IADD);
    let mut replacement = InsnList::new();
    replacement
        .temp(Opcode::ILOAD, 1)
        .temp(Opcode::ILOAD, 0)
        .op(Opcode::IADD);

    let class = patched(vec![CodeEdit::replace(
        target("sum", "(I)I"),
        needle,
        replacement,
    )]);
    let sum = method(&class, "sum", "(I)I");
    assert_eq!(
        locals_of(&sum.instructions),
        [1, 2, 2, 0, 2, 1, 1, 2, 1]
            .into_iter()
            .map(Local::Slot)
            .collect::<Vec<_>>()
    );
    assert_eq!(sum.max_locals, 3);
}

#[test]
fn injected_temps_get_fresh_slots() {
    let mut counter = InsnList::new();
    counter.op(Opcode::ICONST_5).temp(Opcode::ISTORE, 0);

    let class = patched(vec![CodeEdit::inject_at_start(
        target("sum", "(I)I"),
        counter,
    )]);
    let sum = method(&class, "sum", "(I)I");
    let slots = locals_of(&sum.instructions);
    assert_eq!(slots[0], Local::Slot(3));
    assert!(slots[1..].iter().all(|slot| *slot != Local::Slot(3)));
    assert_eq!(sum.max_locals, 4);
}

#[test]
fn write_is_idempotent_across_parses() {
    let mut body = InsnList::new();
    body.op(Opcode::ICONST_0).op(Opcode::IRETURN);
    let registry = registry(vec![CodeEdit::write(
        access::PUBLIC,
        target("tick", "(I)I"),
        vec![],
        Some(body),
    )]);

    let once = registry
        .transform("t.Counter", Some(counter_bytes()))
        .unwrap()
        .unwrap();
    let again = registry
        .transform("t.Counter", Some(counter_bytes()))
        .unwrap()
        .unwrap();
    assert_eq!(once, again);

    let twice = registry
        .transform("t.Counter", Some(once.clone()))
        .unwrap()
        .unwrap();
    assert_eq!(once, twice);

    let class = decoder::decode_class(&once).unwrap();
    let tick = method(&class, "tick", "(I)I");
    assert_eq!(opcodes(tick), vec![Opcode::ICONST_0, Opcode::IRETURN]);
    assert!(tick.local_vars.is_empty());
    assert_eq!(tick.max_locals, 2);
}

#[test]
fn write_adds_missing_methods() {
    let mut body = InsnList::new();
    body.var(Opcode::ALOAD, 0)
        .op(Opcode::ICONST_0)
        .field(Opcode::PUTFIELD, "t/Counter", "count", "I")
        .op(Opcode::RETURN);
    let class = patched(vec![CodeEdit::write(
        access::PUBLIC,
        target("reset", "()V"),
        vec!["java/lang/IllegalStateException".to_string()],
        Some(body),
    )]);

    let reset = method(&class, "reset", "()V");
    assert_eq!(
        opcodes(reset),
        vec![Opcode::ALOAD, Opcode::ICONST_0, Opcode::PUTFIELD, Opcode::RETURN]
    );
    assert_eq!(reset.exceptions, vec!["java/lang/IllegalStateException".to_string()]);
    assert_eq!(reset.max_stack, 2);
    assert_eq!(reset.max_locals, 1);
}

#[test]
fn write_without_body_keeps_declared_exceptions() {
    let class = patched(vec![CodeEdit::write(
        access::PUBLIC | access::ABSTRACT,
        target("size", "()I"),
        vec![],
        None,
    )]);
    let size = method(&class, "size", "()I");
    assert!(size.is_bodiless());
    assert_eq!(size.exceptions, vec!["java/io/IOException".to_string()]);
}

#[test]
fn added_field_carries_its_value() {
    let class = patched(vec![CodeEdit::add_field(
        access::PUBLIC | access::STATIC | access::FINAL,
        target("VERSION", "I"),
        Some(Constant::Int(3)),
    )]);
    let field = class.find_field("VERSION", "I").unwrap();
    assert_eq!(field.value, Some(Constant::Int(3)));
    assert_eq!(field.access, access::PUBLIC | access::STATIC | access::FINAL);
}

#[test]
fn duplicate_field_fails_serialization() {
    let err = registry(vec![CodeEdit::add_field(
        access::PRIVATE,
        target("count", "I"),
        None,
    )])
    .transform("t.Counter", Some(counter_bytes()))
    .unwrap_err();
    assert!(matches!(
        err,
        Error::SerializationFailure {
            source: CoreError::DuplicateMember { .. },
            ..
        }
    ));
}

#[test]
fn edits_apply_in_registration_order() {
    let class = patched(vec![
        CodeEdit::inject_at_start(target("run", "()V"), ops(&[Opcode::NOP])),
        CodeEdit::replace(
            target("run", "()V"),
            ops(&[Opcode::NOP]),
            ops(&[Opcode::ICONST_0, Opcode::POP]),
        ),
    ]);
    assert_eq!(
        opcodes(method(&class, "run", "()V"))[..2],
        [Opcode::ICONST_0, Opcode::POP]
    );
}
