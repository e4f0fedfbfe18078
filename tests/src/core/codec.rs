use super::init_tracing;
use graft_core::result::Error;
use graft_core::{
    ClassNode, Constant, Insn, Local, MethodNode, Opcode, access, decoder, encoder, normalize,
};
use graft_tests::{counter_bytes, counter_class, method, opcodes, reparse};

#[test]
fn fixture_survives_decode() {
    init_tracing();
    let original = counter_class();
    let decoded = decoder::decode_class(&counter_bytes()).unwrap();
    tracing::debug!("\n{}", decoded);

    assert_eq!(decoded.name, "t/Counter");
    assert_eq!(decoded.super_name.as_deref(), Some("java/lang/Object"));
    assert_eq!(decoded.interfaces, vec!["java/lang/Runnable".to_string()]);
    assert_eq!(decoded.fields, original.fields);
    assert_eq!(decoded.methods.len(), original.methods.len());
    for (before, after) in original.methods.iter().zip(&decoded.methods) {
        assert_eq!(before.name, after.name);
        assert_eq!(before.access, after.access);
        assert_eq!(before.exceptions, after.exceptions);
        assert_eq!(
            opcodes(before),
            opcodes(after),
            "opcodes of {}{} changed",
            before.name,
            before.desc
        );
    }
}

#[test]
fn debug_tables_and_handlers_survive() {
    let decoded = decoder::decode_class(&counter_bytes()).unwrap();

    let safe_div = method(&decoded, "safeDiv", "(II)I");
    let handlers = safe_div.instructions.handlers();
    assert_eq!(handlers.len(), 1);
    assert_eq!(
        handlers[0].catch_type.as_deref(),
        Some("java/lang/ArithmeticException")
    );

    let tick = method(&decoded, "tick", "(I)I");
    let names: Vec<&str> = tick.local_vars.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["this", "delta"]);
    let lines: Vec<u16> = tick
        .instructions
        .iter()
        .filter_map(|insn| match insn {
            Insn::Line(line) => Some(*line),
            _ => None,
        })
        .collect();
    assert_eq!(lines, vec![10, 11]);

    let size = method(&decoded, "size", "()I");
    assert!(size.is_bodiless());
    assert_eq!(size.exceptions, vec!["java/io/IOException".to_string()]);
}

#[test]
fn normalize_reaches_a_fixed_point() {
    let bytes = counter_bytes();
    let once = normalize(&bytes).unwrap();
    let twice = normalize(&once).unwrap();
    assert_eq!(once, twice);

    let listing = decoder::decode_class(&bytes).unwrap().to_string();
    let normalized = decoder::decode_class(&once).unwrap().to_string();
    assert_eq!(listing, normalized);
}

#[test]
fn stack_and_local_limits_are_recomputed() {
    let mut class = counter_class();
    for method in &mut class.methods {
        method.max_stack = 0;
    }
    let decoded = reparse(&class);

    assert_eq!(method(&decoded, "tick", "(I)I").max_stack, 3);
    assert_eq!(method(&decoded, "safeDiv", "(II)I").max_stack, 2);
    let mix = method(&decoded, "mix", "(JI)J");
    assert_eq!(mix.max_stack, 4);
    assert_eq!(mix.max_locals, 5);
}

#[test]
fn lookup_switch_keys_are_sorted() {
    let decoded = reparse(&counter_class());
    let classify = method(&decoded, "classify", "(I)Ljava/lang/String;");
    let keys: Vec<i32> = classify
        .instructions
        .iter()
        .find_map(|insn| match insn {
            Insn::LookupSwitch { pairs, .. } => Some(pairs.iter().map(|(k, _)| *k).collect()),
            _ => None,
        })
        .unwrap();
    assert_eq!(keys, vec![-1, 100]);

    let table = classify
        .instructions
        .iter()
        .find_map(|insn| match insn {
            Insn::TableSwitch { low, targets, .. } => Some((*low, targets.len())),
            _ => None,
        })
        .unwrap();
    assert_eq!(table, (0, 2));
}

#[test]
fn wide_locals_round_trip() {
    let mut class = ClassNode::new("t/Wide", None);
    let mut method = MethodNode::new(access::STATIC, "far", "()V");
    method
        .instructions
        .ldc(Constant::Double(2.5))
        .var(Opcode::DSTORE, 400)
        .iinc(Local::Slot(300), 1000)
        .op(Opcode::RETURN);
    class.methods.push(method);

    let decoded = reparse(&class);
    let far = method_locals(&decoded.methods[0]);
    assert_eq!(far, vec![Local::Slot(400), Local::Slot(300)]);
    assert_eq!(decoded.methods[0].max_locals, 402);
    assert!(matches!(
        decoded.methods[0].instructions.real().next(),
        Some(Insn::Ldc(Constant::Double(v))) if *v == 2.5
    ));
}

fn method_locals(method: &MethodNode) -> Vec<Local> {
    method
        .instructions
        .iter()
        .filter_map(|insn| insn.local().map(|(local, _)| local))
        .collect()
}

#[test]
fn every_truncation_is_rejected() {
    let bytes = counter_bytes();
    for len in 0..bytes.len() {
        assert!(
            decoder::decode_class(&bytes[..len]).is_err(),
            "prefix of {len} bytes decoded"
        );
    }
}

#[test]
fn trailing_bytes_are_rejected() {
    let mut bytes = counter_bytes();
    bytes.extend_from_slice(&[0, 0]);
    assert!(matches!(
        decoder::decode_class(&bytes),
        Err(Error::TrailingBytes(2))
    ));
}

#[test]
fn newer_major_version_is_rejected() {
    let mut class = counter_class();
    class.major = graft_core::tree::FORMAT_MAJOR + 1;
    let bytes = encoder::encode_class(&class).unwrap();
    assert!(matches!(
        decoder::decode_class(&bytes),
        Err(Error::UnsupportedVersion { .. })
    ));
}
