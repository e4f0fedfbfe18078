//! Fixtures shared by the integration test targets.

use graft_core::{
    ClassNode, Constant, FieldNode, Insn, InsnList, LocalVar, MethodNode, Opcode, access, decoder,
    encoder,
};
use graft_transform::{Identifier, ResolvedIdentifier};

/// Internal name of the fixture class.
pub const COUNTER: &str = "t/Counter";

/// A small class exercising fields, a constructor, branches, a loop, an exception handler,
/// both switch kinds, wide locals and debug tables.
pub fn counter_class() -> ClassNode {
    let mut class = ClassNode::new(COUNTER, Some("java/lang/Object"));
    class.interfaces.push("java/lang/Runnable".to_string());
    class.fields.push(FieldNode::new(access::PRIVATE, "count", "I"));
    let mut limit = FieldNode::new(access::PUBLIC | access::STATIC | access::FINAL, "LIMIT", "J");
    limit.value = Some(Constant::Long(1 << 40));
    class.fields.push(limit);

    let mut init = MethodNode::new(access::PUBLIC, "<init>", "()V");
    init.instructions
        .var(Opcode::ALOAD, 0)
        .invoke(Opcode::INVOKESPECIAL, "java/lang/Object", "<init>", "()V")
        .op(Opcode::RETURN);
    class.methods.push(init);

    let mut run = MethodNode::new(access::PUBLIC, "run", "()V");
    run.instructions
        .var(Opcode::ALOAD, 0)
        .op(Opcode::ICONST_1)
        .invoke(Opcode::INVOKEVIRTUAL, COUNTER, "tick", "(I)I")
        .op(Opcode::POP)
        .op(Opcode::RETURN);
    class.methods.push(run);

    let mut tick = MethodNode::new(access::PUBLIC, "tick", "(I)I");
    let start = tick.instructions.label("start");
    let end = tick.instructions.label("end");
    tick.instructions
        .place(start)
        .line(10)
        .var(Opcode::ALOAD, 0)
        .op(Opcode::DUP)
        .field(Opcode::GETFIELD, COUNTER, "count", "I")
        .var(Opcode::ILOAD, 1)
        .op(Opcode::IADD)
        .field(Opcode::PUTFIELD, COUNTER, "count", "I")
        .line(11)
        .var(Opcode::ALOAD, 0)
        .field(Opcode::GETFIELD, COUNTER, "count", "I")
        .op(Opcode::IRETURN)
        .place(end);
    tick.local_vars.push(LocalVar {
        name: "this".into(),
        desc: format!("L{COUNTER};"),
        start,
        end,
        slot: 0,
    });
    tick.local_vars.push(LocalVar {
        name: "delta".into(),
        desc: "I".into(),
        start,
        end,
        slot: 1,
    });
    class.methods.push(tick);

    let mut safe_div = MethodNode::new(access::PUBLIC | access::STATIC, "safeDiv", "(II)I");
    safe_div
        .instructions
        .mark("try")
        .var(Opcode::ILOAD, 0)
        .var(Opcode::ILOAD, 1)
        .op(Opcode::IDIV)
        .mark("end")
        .op(Opcode::IRETURN)
        .mark("catch")
        .op(Opcode::POP)
        .op(Opcode::ICONST_0)
        .op(Opcode::IRETURN)
        .try_catch("try", "end", "catch", Some("java/lang/ArithmeticException"));
    class.methods.push(safe_div);

    let mut sum = MethodNode::new(access::PUBLIC | access::STATIC, "sum", "(I)I");
    sum.instructions
        .op(Opcode::ICONST_0)
        .var(Opcode::ISTORE, 1)
        .op(Opcode::ICONST_0)
        .var(Opcode::ISTORE, 2)
        .mark("loop")
        .var(Opcode::ILOAD, 2)
        .var(Opcode::ILOAD, 0)
        .jump(Opcode::IF_ICMPGE, "done")
        .var(Opcode::ILOAD, 1)
        .var(Opcode::ILOAD, 2)
        .op(Opcode::IADD)
        .var(Opcode::ISTORE, 1)
        .iinc(graft_core::Local::Slot(2), 1)
        .jump(Opcode::GOTO, "loop")
        .mark("done")
        .var(Opcode::ILOAD, 1)
        .op(Opcode::IRETURN);
    class.methods.push(sum);

    let mut classify = MethodNode::new(
        access::PUBLIC | access::STATIC,
        "classify",
        "(I)Ljava/lang/String;",
    );
    let list = &mut classify.instructions;
    let zero = list.label("zero");
    let one = list.label("one");
    let sparse = list.label("sparse");
    let hundred = list.label("hundred");
    let negative = list.label("negative");
    let other = list.label("other");
    list.var(Opcode::ILOAD, 0).push(Insn::TableSwitch {
        low: 0,
        default: sparse,
        targets: vec![zero, one],
    });
    list.place(zero)
        .ldc(Constant::String("zero".into()))
        .op(Opcode::ARETURN)
        .place(one)
        .ldc(Constant::String("one".into()))
        .op(Opcode::ARETURN)
        .place(sparse)
        .var(Opcode::ILOAD, 0)
        .push(Insn::LookupSwitch {
            default: other,
            pairs: vec![(100, hundred), (-1, negative)],
        })
        .place(hundred)
        .ldc(Constant::String("hundred".into()))
        .op(Opcode::ARETURN)
        .place(negative)
        .ldc(Constant::String("negative".into()))
        .op(Opcode::ARETURN)
        .place(other)
        .ldc(Constant::String("other".into()))
        .op(Opcode::ARETURN);
    class.methods.push(classify);

    let mut mix = MethodNode::new(access::PUBLIC | access::STATIC, "mix", "(JI)J");
    mix.instructions
        .var(Opcode::LLOAD, 0)
        .var(Opcode::ILOAD, 2)
        .op(Opcode::I2L)
        .op(Opcode::LADD)
        .var(Opcode::LSTORE, 3)
        .var(Opcode::LLOAD, 3)
        .ldc(Constant::Long(1 << 40))
        .op(Opcode::LAND)
        .op(Opcode::LRETURN);
    class.methods.push(mix);

    let mut size = MethodNode::new(access::PUBLIC | access::ABSTRACT, "size", "()I");
    size.exceptions.push("java/io/IOException".to_string());
    class.methods.push(size);

    class
}

/// Encoded form of [`counter_class`].
pub fn counter_bytes() -> Vec<u8> {
    encoder::encode_class(&counter_class()).expect("fixture encodes")
}

/// Encodes and decodes `class` again.
pub fn reparse(class: &ClassNode) -> ClassNode {
    let bytes = encoder::encode_class(class).expect("class encodes");
    decoder::decode_class(&bytes).expect("encoded class decodes")
}

pub fn method<'a>(class: &'a ClassNode, name: &str, desc: &str) -> &'a MethodNode {
    class
        .find_method(name, desc)
        .unwrap_or_else(|| panic!("{name}{desc} not found in {}", class.name))
}

/// Opcodes of the real instructions of `method`, in order.
pub fn opcodes(method: &MethodNode) -> Vec<Opcode> {
    list_opcodes(&method.instructions)
}

pub fn list_opcodes(list: &InsnList) -> Vec<Opcode> {
    list.real().filter_map(Insn::opcode).collect()
}

/// List of operand-less instructions.
pub fn ops(opcodes: &[Opcode]) -> InsnList {
    let mut list = InsnList::new();
    for &opcode in opcodes {
        list.op(opcode);
    }
    list
}

/// Runtime identifier on the fixture class.
pub fn target(member: &str, signature: &str) -> ResolvedIdentifier {
    ResolvedIdentifier::assume_runtime(Identifier::new(COUNTER, member, signature))
}
