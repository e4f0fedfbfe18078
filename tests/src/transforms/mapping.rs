use super::{patched, registry};
use graft_core::{InsnList, Opcode};
use graft_transform::{CodeEdit, Identifier, IdentityResolver, MappingTable, Resolver};
use graft_tests::{method, opcodes, ops};

const MAPPINGS: &str = r#"{
    "classes": { "game/Counter": "t/Counter" },
    "members": [
        { "owner": "game/Counter", "name": "increment", "signature": "(I)I", "mapped": "tick" },
        { "owner": "game/Counter", "name": "total", "signature": "I", "mapped": "count" }
    ]
}"#;

#[test]
fn symbolic_targets_resolve_to_runtime_members() {
    let table = MappingTable::from_json(MAPPINGS).unwrap();
    let resolved = table.resolve(&Identifier::new("game/Counter", "increment", "(I)I"));
    assert_eq!(resolved.java_class(), "t.Counter");

    let class = patched(vec![CodeEdit::inject_at_start(resolved, ops(&[Opcode::NOP]))]);
    assert_eq!(opcodes(method(&class, "tick", "(I)I"))[0], Opcode::NOP);
}

#[test]
fn descriptors_are_renamed_with_their_owner() {
    let table = MappingTable::from_json(MAPPINGS).unwrap();
    let resolved = table.resolve(&Identifier::new(
        "game/Counter",
        "copy",
        "(Lgame/Counter;)Lgame/Counter;",
    ));
    assert_eq!(resolved.member, "copy");
    assert_eq!(resolved.signature, "(Lt/Counter;)Lt/Counter;");

    let mut body = InsnList::new();
    body.var(Opcode::ALOAD, 1).op(Opcode::ARETURN);
    let class = patched(vec![CodeEdit::write(
        graft_core::access::PUBLIC,
        resolved,
        vec![],
        Some(body),
    )]);
    assert!(
        class
            .find_method("copy", "(Lt/Counter;)Lt/Counter;")
            .is_some()
    );
}

#[test]
fn identity_resolution_targets_the_named_class() {
    let resolved = IdentityResolver.resolve(&Identifier::new("t/Counter", "run", "()V"));
    let registry = registry(vec![CodeEdit::inject_at_start(resolved, InsnList::new())]);
    assert_eq!(registry.classes(), vec!["t.Counter"]);

    let table = MappingTable::from_json(MAPPINGS).unwrap();
    let field = table.resolve(&Identifier::new("game/Counter", "total", "I"));
    assert_eq!(field.identifier(), &Identifier::new("t/Counter", "count", "I"));
}
