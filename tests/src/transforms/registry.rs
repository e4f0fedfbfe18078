use super::{init_tracing, registry};
use graft_core::{InsnList, Opcode, normalize};
use graft_transform::{
    CodeEdit, DumpMode, EditKind, Error, FileDumpSink, PatchRegistry, TransformerConfig,
};
use graft_tests::{counter_bytes, ops, target};
use std::fs;

fn nop_at_start() -> CodeEdit {
    CodeEdit::inject_at_start(target("run", "()V"), ops(&[Opcode::NOP]))
}

fn file_registry(config: TransformerConfig, edits: Vec<CodeEdit>) -> PatchRegistry {
    let mut builder = PatchRegistry::builder().with_config(config);
    for edit in edits {
        builder.register(edit);
    }
    builder.build()
}

#[test]
fn unregistered_classes_pass_through_untouched() {
    init_tracing();
    let registry = registry(vec![nop_at_start()]);
    let bytes = counter_bytes();

    assert_eq!(
        registry.transform("t.Other", Some(bytes.clone())).unwrap(),
        Some(bytes.clone())
    );
    assert_eq!(registry.transform("t.Counter", None).unwrap(), None);
    assert!(
        registry
            .transform_with_report("t.Other", &bytes)
            .unwrap()
            .is_none()
    );
}

#[test]
fn slash_and_dot_names_reach_the_same_patch_set() {
    let registry = registry(vec![nop_at_start()]);
    let dotted = registry
        .transform("t.Counter", Some(counter_bytes()))
        .unwrap();
    let slashed = registry
        .transform("t/Counter", Some(counter_bytes()))
        .unwrap();
    assert_eq!(dotted, slashed);
    assert_ne!(dotted, Some(counter_bytes()));
}

#[test]
fn unmatched_needle_still_reencodes() {
    let edit = CodeEdit::replace(
        target("sum", "(I)I"),
        ops(&[Opcode::FDIV]),
        InsnList::new(),
    );
    let (bytes, report) = registry(vec![edit])
        .transform_with_report("t.Counter", &counter_bytes())
        .unwrap()
        .unwrap();
    assert_eq!(report.unmatched().count(), 1);
    assert_eq!(report.total_sites(), 0);
    assert_eq!(bytes, normalize(&counter_bytes()).unwrap());
}

#[test]
fn report_lists_every_edit() {
    let edits = vec![
        nop_at_start(),
        CodeEdit::replace(target("sum", "(I)I"), ops(&[Opcode::IADD]), ops(&[Opcode::ISUB])),
        CodeEdit::add_field(graft_core::access::PRIVATE, target("calls", "J"), None),
    ];
    let (_, report) = registry(edits)
        .transform_with_report("t/Counter", &counter_bytes())
        .unwrap()
        .unwrap();

    assert_eq!(report.class, "t.Counter");
    assert_eq!(report.renumbered, vec!["run()V".to_string(), "sum(I)I".to_string()]);
    let kinds: Vec<EditKind> = report.edits.iter().map(|outcome| outcome.kind).collect();
    assert_eq!(kinds, vec![EditKind::Inject, EditKind::Replace, EditKind::AddField]);
    assert_eq!(report.total_sites(), 3);
    assert!(report.to_json().unwrap().contains("\"calls\""));
}

#[test]
fn failures_are_dumped_as_disassembly() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = TransformerConfig {
        dump_dir: dir.path().to_path_buf(),
        ..TransformerConfig::default()
    };
    let registry = file_registry(
        config,
        vec![
            nop_at_start(),
            CodeEdit::inject_at_start(target("absent", "()V"), InsnList::new()),
        ],
    );

    let err = registry
        .transform("t.Counter", Some(counter_bytes()))
        .unwrap_err();
    assert!(matches!(err, Error::MemberNotFound { ref target } if target.member == "absent"));

    let listing = fs::read_to_string(dir.path().join("t#Counter.txt")).unwrap();
    assert!(listing.contains("t/Counter"));
    // The dump shows the class as far as the transform got.
    assert!(listing.contains("NOP"));
}

#[test]
fn malformed_input_is_dumped_raw() {
    let dir = tempfile::tempdir().unwrap();
    let config = TransformerConfig {
        dump_dir: dir.path().to_path_buf(),
        ..TransformerConfig::default()
    };
    let registry = file_registry(config, vec![nop_at_start()]);
    let mut bytes = counter_bytes();
    bytes.truncate(bytes.len() / 2);

    let err = registry
        .transform("t.Counter", Some(bytes.clone()))
        .unwrap_err();
    assert!(matches!(err, Error::MalformedInput { .. }));
    assert_eq!(fs::read(dir.path().join("t#Counter.bin")).unwrap(), bytes);
}

#[test]
fn always_mode_dumps_successful_transforms() {
    let dir = tempfile::tempdir().unwrap();
    let config = TransformerConfig {
        dump: DumpMode::Always,
        dump_dir: dir.path().to_path_buf(),
        raw: true,
    };
    let registry = file_registry(config, vec![nop_at_start()]);
    let patched = registry
        .transform("t.Counter", Some(counter_bytes()))
        .unwrap()
        .unwrap();
    assert_eq!(fs::read(dir.path().join("t#Counter.bin")).unwrap(), patched);
}

#[test]
fn off_mode_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = TransformerConfig {
        dump: DumpMode::Off,
        dump_dir: dir.path().join("dumps"),
        raw: false,
    };
    let registry = file_registry(
        config,
        vec![CodeEdit::inject_at_start(target("absent", "()V"), InsnList::new())],
    );
    assert!(registry.transform("t.Counter", Some(counter_bytes())).is_err());
    assert!(!dir.path().join("dumps").exists());
}

#[test]
fn custom_sink_receives_dumps() {
    let dir = tempfile::tempdir().unwrap();
    let mut builder = PatchRegistry::builder()
        .with_dump_sink(FileDumpSink::new(dir.path().join("custom")));
    builder.register(CodeEdit::inject_at_start(target("absent", "()V"), InsnList::new()));
    let registry = builder.build();

    assert!(registry.transform("t.Counter", Some(counter_bytes())).is_err());
    assert!(dir.path().join("custom").join("t#Counter.txt").exists());
}

#[test]
fn registry_is_shared_between_threads() {
    let registry = registry(vec![nop_at_start()]);
    let expected = registry
        .transform("t.Counter", Some(counter_bytes()))
        .unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| registry.transform("t.Counter", Some(counter_bytes()))))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), expected);
        }
    });
}
