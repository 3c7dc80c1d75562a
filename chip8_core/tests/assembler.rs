use chip8_core::assembler::assembler::{Assembly, Field, Fixup, assemble_program};
use chip8_core::error::error::AsmError;
use chip8_core::scanner::scanner::{Token, TokenKind};

fn assemble(source: &str) -> Vec<u8> {
    assemble_program(source.as_bytes(), false).unwrap()
}

fn assemble_err(source: &str) -> AsmError {
    assemble_program(source.as_bytes(), false).unwrap_err()
}

fn opcode(source: &str) -> u16 {
    let rom = assemble(source);
    assert_eq!(rom.len(), 2, "{source}");
    u16::from_be_bytes([rom[0], rom[1]])
}

#[test]
fn base_encodings() {
    let table: &[(&str, u16)] = &[
        ("  CLS", 0x00E0),
        ("  RET", 0x00EE),
        ("  JP #345", 0x1345),
        ("  SYS #345", 0x1345),
        ("  SYS V0, #300", 0xB300),
        ("  JP V0, #300", 0xB300),
        ("  CALL #2AB", 0x22AB),
        ("  SE V1, #42", 0x3142),
        ("  SE V1, V2", 0x5120),
        ("  SNE V1, 66", 0x4142),
        ("  SNE V1, V2", 0x9120),
        ("  SKP V3", 0xE39E),
        ("  SKNP V3", 0xE3A1),
        ("  OR V1, V2", 0x8121),
        ("  AND V1, V2", 0x8122),
        ("  XOR V1, V2", 0x8123),
        ("  SHR V4", 0x8446),
        ("  SHL V4", 0x844E),
        ("  ADD V1, #10", 0x7110),
        ("  ADD V1, V2", 0x8124),
        ("  ADD I, V5", 0xF51E),
        ("  SUB V1, V2", 0x8125),
        ("  SUBN V1, V2", 0x8127),
        ("  BCD V6", 0xF633),
        ("  RND V7, %1111.0000", 0xC7F0),
        ("  DRW V1, V2, 5", 0xD125),
        ("  LD V1, -1", 0x61FF),
        ("  LD V1, V2", 0x8120),
        ("  LD I, #123", 0xA123),
        ("  LD V8, DT", 0xF807),
        ("  LD V8, K", 0xF80A),
        ("  LD DT, V8", 0xF815),
        ("  LD ST, V8", 0xF818),
        ("  LD F, V8", 0xF829),
        ("  LD [I], V8", 0xF855),
        ("  LD V8, [I]", 0xF865),
    ];

    for (source, expected) in table {
        assert_eq!(opcode(source), *expected, "{source}");
    }
}

#[test]
fn super_encodings_require_super() {
    let table: &[(&str, u16)] = &[
        ("  EXIT", 0x00FD),
        ("  LOW", 0x00FE),
        ("  HIGH", 0x00FF),
        ("  SCU 4", 0x00B4),
        ("  SCD 4", 0x00C4),
        ("  SCR", 0x00FB),
        ("  SCL", 0x00FC),
        ("  LD HF, V2", 0xF230),
        ("  LD R, V7", 0xF775),
        ("  LD V7, R", 0xF785),
    ];

    for (source, expected) in table {
        assert!(matches!(
            assemble_err(source).kind(),
            AsmError::IllegalInstruction(_)
        ));
        assert_eq!(opcode(&format!("SUPER\n{source}")), *expected, "{source}");
    }
}

#[test]
fn extended_encodings_require_extended() {
    let table: &[(&str, u16)] = &[
        ("  SGT V1, V2", 0x5121),
        ("  SLT V1, V2", 0x5122),
        ("  MUL V1, V2", 0x9121),
        ("  DIV V1, V2", 0x9122),
        ("  BCD V1, V2", 0x9123),
        ("  LD A, V3", 0xF394),
    ];

    for (source, expected) in table {
        assert!(assemble_program(source.as_bytes(), false).is_err());
        assert_eq!(opcode(&format!("EXTENDED\n{source}")), *expected, "{source}");
    }
}

#[test]
fn source_is_case_insensitive() {
    assert_eq!(opcode("  ld va, #0a"), 0x6A0A);
}

#[test]
fn forward_and_backward_labels_match() {
    let backward = assemble("TARGET CLS\n  JP TARGET\n  CALL TARGET\n  LD I, TARGET\n");
    let forward = assemble("  JP TARGET\n  CALL TARGET\n  LD I, TARGET\nTARGET CLS\n");

    // both reference 0x200 / 0x206 respectively
    assert_eq!(&backward[2..], &[0x12, 0x00, 0x22, 0x00, 0xA2, 0x00]);
    assert_eq!(&forward[..6], &[0x12, 0x06, 0x22, 0x06, 0xA2, 0x06]);
}

#[test]
fn labels_accept_trailing_colon() {
    let rom = assemble("LOOP: JP LOOP\n");
    assert_eq!(rom, vec![0x12, 0x00]);
}

#[test]
fn equ_and_var_bind_values() {
    let rom = assemble("SPEED EQU 3\nPLAYER VAR V5\n  LD PLAYER, SPEED\n  ADD PLAYER, PLAYER\n");
    assert_eq!(rom, vec![0x65, 0x03, 0x85, 0x54]);
}

#[test]
fn here_is_current_address() {
    assert_eq!(assemble("  CLS\n  JP *\n"), vec![0x00, 0xE0, 0x12, 0x02]);
}

#[test]
fn data_directives() {
    let rom = assemble("  BYTE 1, #FF, -1, \"HI\"\n  WORD #1234, LATER\nLATER\n");
    assert_eq!(
        rom,
        vec![0x01, 0xFF, 0xFF, b'H', b'I', 0x12, 0x34, 0x02, 0x09]
    );
}

#[test]
fn align_and_pad() {
    let rom = assemble("  BYTE 1\n  ALIGN 4\n  BYTE 2\n  PAD 2\n  BYTE 3\n  ALIGN 2\n");
    // already aligned, so the last ALIGN adds nothing
    assert_eq!(rom, vec![1, 0, 0, 0, 2, 0, 0, 3]);

    assert_eq!(*assemble_err("  ALIGN 3\n").kind(), AsmError::IllegalAlignment);
    assert_eq!(*assemble_err("  PAD -1\n").kind(), AsmError::IllegalSize);
}

#[test]
fn ascii_directive_emits_table_indices() {
    let rom = assemble("EXTENDED\n  ASCII \"AB 0\"\n");
    assert_eq!(rom, vec![1, 2, 32, 48]);
    assert_eq!(
        *assemble_err("EXTENDED\n  ASCII \"a~\"\n").kind(),
        AsmError::InvalidAsciiChar('~')
    );
}

#[test]
fn comments_and_blank_lines_are_ignored() {
    let rom = assemble("; header\n\n  CLS ; clear\n\t\n");
    assert_eq!(rom, vec![0x00, 0xE0]);
}

#[test]
fn final_line_without_newline_is_assembled() {
    assert_eq!(assemble("  CLS\n  RET"), vec![0x00, 0xE0, 0x00, 0xEE]);
}

#[test]
fn unresolved_label_fails() {
    let err = assemble_err("  JP NOWHERE\n");
    assert_eq!(err, AsmError::UnresolvedLabel("NOWHERE".into()));
    assert_eq!(err.to_string(), "unresolved label: NOWHERE");
}

#[test]
fn forward_reference_to_register_fails() {
    let err = assemble_err("  JP TARGET\nTARGET VAR V1\n");
    assert_eq!(err, AsmError::LabelNotAddress("TARGET".into()));
}

#[test]
fn mode_after_instructions_fails() {
    let err = assemble_err("  CLS\nSUPER\n");
    assert_eq!(err.line(), Some(2));
    assert_eq!(err.to_string(), "line 2: super must come before instructions");
}

#[test]
fn extended_after_instructions_fails() {
    let err = assemble_err("  CLS\nEXTENDED\n");
    assert_eq!(err.to_string(), "line 2: super must come before instructions");
}

#[test]
fn break_and_assert_emit_nothing() {
    assert_eq!(assemble("BREAK\nASSERT\n  CLS\n  BREAK ; stop here\n"), vec![0x00, 0xE0]);
}

#[test]
fn forward_word_keeps_all_16_bits() {
    let forward = assemble("  WORD BIG\nBIG EQU #1234\n");
    let backward = assemble("BIG EQU #1234\n  WORD BIG\n");
    assert_eq!(forward, vec![0x12, 0x34]);
    assert_eq!(forward, backward);
}

#[test]
fn forward_address_matches_backward() {
    let forward = assemble("  CALL FN\nFN EQU #345\n");
    let backward = assemble("FN EQU #345\n  CALL FN\n");
    assert_eq!(forward, vec![0x23, 0x45]);
    assert_eq!(forward, backward);
}

#[test]
fn forward_address_out_of_range_fails() {
    let err = assemble_err("  CALL BIG\nBIG EQU #1234\n");
    assert_eq!(err, AsmError::AddressOutOfRange("BIG".into()));

    let err = assemble_err("BIG EQU #1234\n  CALL BIG\n");
    assert!(matches!(err.kind(), AsmError::IllegalInstruction(_)));
}

#[test]
fn here_in_word_list_is_per_item() {
    assert_eq!(assemble("  WORD *, *\n"), vec![0x02, 0x00, 0x02, 0x02]);
}

#[test]
fn align_past_end_of_memory_fails() {
    assert_eq!(*assemble_err("  ALIGN #40000000\n").kind(), AsmError::ProgramTooLarge);
    assert_eq!(*assemble_err("  BYTE 1\n  ALIGN #2000\n").kind(), AsmError::ProgramTooLarge);
    assert_eq!(assemble("  BYTE 1\n  ALIGN #800\n").len(), 0x600);
}

#[test]
fn duplicate_label_fails() {
    let err = assemble_err("A1 CLS\nA1 CLS\n");
    assert_eq!(*err.kind(), AsmError::DuplicateLabel("A1".into()));
}

#[test]
fn illegal_label_assignment_fails() {
    assert_eq!(*assemble_err("X EQU V1\n").kind(), AsmError::IllegalLabelAssignment);
    assert_eq!(*assemble_err("X VAR 3\n").kind(), AsmError::IllegalLabelAssignment);
}

#[test]
fn operand_range_errors() {
    assert!(matches!(assemble_err("  LD V1, 256\n").kind(), AsmError::IllegalInstruction(_)));
    assert!(matches!(assemble_err("  JP #1000\n").kind(), AsmError::IllegalInstruction(_)));
    assert!(matches!(assemble_err("  DRW V1, V2, 16\n").kind(), AsmError::IllegalInstruction(_)));
    assert!(matches!(assemble_err("  JP V1, #300\n").kind(), AsmError::IllegalInstruction(_)));
    assert!(matches!(assemble_err("  FOO V1\n").kind(), AsmError::UnexpectedToken));
}

#[test]
fn literal_errors() {
    assert_eq!(*assemble_err("  LD V1, 12Z\n").kind(), AsmError::IllegalDecimal("12Z".into()));
    assert_eq!(*assemble_err("  LD V1, #XY\n").kind(), AsmError::IllegalHex("XY".into()));
    assert_eq!(*assemble_err("  LD V1, %102\n").kind(), AsmError::IllegalBinary("102".into()));
}

#[test]
fn effective_address_errors() {
    assert_eq!(*assemble_err("  LD [V0], V1\n").kind(), AsmError::IllegalEffectiveAddress);
    assert_eq!(*assemble_err("  LD [I, V1\n").kind(), AsmError::IllegalIndirection);
    assert_eq!(*assemble_err("  LD V1,\n").kind(), AsmError::ExpectedOperand);
}

#[test]
fn program_too_large_fails() {
    let err = assemble_err("  PAD #E00\n  BYTE 1\n");
    assert_eq!(err, AsmError::ProgramTooLarge.at_line(2));
}

#[test]
fn eti_mode_assembles_from_0x600() {
    let rom = assemble_program(b"START JP START\n", true).unwrap();
    assert_eq!(rom, vec![0x16, 0x00]);
}

#[test]
fn assembly_state_is_inspectable() {
    let mut asm = Assembly::new(false);
    asm.assemble_line(b"  JP LATER".to_vec()).unwrap();
    assert_eq!(asm.here(), 0x202);
    assert_eq!(
        asm.unresolved.get(&0x200),
        Some(&Fixup {
            label: "LATER".into(),
            field: Field::Address
        })
    );

    asm.assemble_line(b"LATER CLS".to_vec()).unwrap();
    assert_eq!(asm.labels.get("LATER"), Some(&Token::lit(0x202)));
    assert_eq!(asm.labels["LATER"].kind, TokenKind::Lit);
    assert_eq!(asm.build().unwrap(), vec![0x12, 0x02, 0x00, 0xE0]);
}
