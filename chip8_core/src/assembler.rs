pub mod assembler {
    use std::collections::{BTreeMap, HashMap};

    use log::{debug, trace};

    use crate::error::error::AsmError;
    use crate::scanner::scanner::{LineScanner, Token, TokenKind, TokenScanner};

    /// Size of the CHIP-8 address space. Nothing may be emitted past it.
    pub const ADDRESS_SPACE: usize = 0x1000;

    pub const BASE_ADDRESS: usize = 0x200;
    pub const ETI_BASE_ADDRESS: usize = 0x600;

    /// CHIP-8E character set. `ASCII` emits a character's index into this
    /// table and `LD A, Vx` indexes the glyph table with it.
    pub const ASCII_TABLE: &str = "@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_ !\"#$%&'()*+,-./0123456789:;<=>?";

    /// Instruction set an encoding belongs to.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum Mode {
        Base,
        Super,
        Extended,
    }

    /// How operand values are folded into a 16-bit opcode. Indices name
    /// the operand each field is taken from.
    #[derive(Copy, Clone, Debug)]
    enum Enc {
        /// no operands
        Fixed(u16),
        /// op | n, n < 0x10
        Nibble(u16),
        /// op | addr, addr < 0x1000
        Addr(u16, usize),
        /// op | addr, first operand must be V0
        V0Addr(u16),
        /// op | x << 8 | byte
        XByte(u16),
        /// op | x << 8 | y << 4
        XY(u16),
        /// op | x << 8 | x << 4
        XX(u16),
        /// op | x << 8
        X(u16, usize),
        /// op | x << 8, x < 8
        XLow(u16, usize),
        /// op | x << 8 | y << 4 | n, n < 0x10
        XYN(u16),
    }

    /// One legal operand signature of a mnemonic.
    struct Form {
        mode: Mode,
        operands: &'static [TokenKind],
        enc: Enc,
    }

    const fn form(mode: Mode, operands: &'static [TokenKind], enc: Enc) -> Form {
        Form { mode, operands, enc }
    }

    use Mode::{Base, Extended, Super};
    use TokenKind as T;

    const CLS: &[Form] = &[form(Base, &[], Enc::Fixed(0x00E0))];
    const RET: &[Form] = &[form(Base, &[], Enc::Fixed(0x00EE))];
    const EXIT: &[Form] = &[form(Super, &[], Enc::Fixed(0x00FD))];
    const LOW: &[Form] = &[form(Super, &[], Enc::Fixed(0x00FE))];
    const HIGH: &[Form] = &[form(Super, &[], Enc::Fixed(0x00FF))];
    const SCU: &[Form] = &[form(Super, &[T::Lit], Enc::Nibble(0x00B0))];
    const SCD: &[Form] = &[form(Super, &[T::Lit], Enc::Nibble(0x00C0))];
    const SCR: &[Form] = &[form(Super, &[], Enc::Fixed(0x00FB))];
    const SCL: &[Form] = &[form(Super, &[], Enc::Fixed(0x00FC))];
    // SYS is kept as a legacy alias of JP
    const JP: &[Form] = &[
        form(Base, &[T::Lit], Enc::Addr(0x1000, 0)),
        form(Base, &[T::V, T::Lit], Enc::V0Addr(0xB000)),
    ];
    const CALL: &[Form] = &[form(Base, &[T::Lit], Enc::Addr(0x2000, 0))];
    const SE: &[Form] = &[
        form(Base, &[T::V, T::Lit], Enc::XByte(0x3000)),
        form(Base, &[T::V, T::V], Enc::XY(0x5000)),
    ];
    const SNE: &[Form] = &[
        form(Base, &[T::V, T::Lit], Enc::XByte(0x4000)),
        form(Base, &[T::V, T::V], Enc::XY(0x9000)),
    ];
    const SGT: &[Form] = &[form(Extended, &[T::V, T::V], Enc::XY(0x5001))];
    const SLT: &[Form] = &[form(Extended, &[T::V, T::V], Enc::XY(0x5002))];
    const SKP: &[Form] = &[form(Base, &[T::V], Enc::X(0xE09E, 0))];
    const SKNP: &[Form] = &[form(Base, &[T::V], Enc::X(0xE0A1, 0))];
    const OR: &[Form] = &[form(Base, &[T::V, T::V], Enc::XY(0x8001))];
    const AND: &[Form] = &[form(Base, &[T::V, T::V], Enc::XY(0x8002))];
    const XOR: &[Form] = &[form(Base, &[T::V, T::V], Enc::XY(0x8003))];
    const SHR: &[Form] = &[form(Base, &[T::V], Enc::XX(0x8006))];
    const SHL: &[Form] = &[form(Base, &[T::V], Enc::XX(0x800E))];
    const ADD: &[Form] = &[
        form(Base, &[T::V, T::Lit], Enc::XByte(0x7000)),
        form(Base, &[T::V, T::V], Enc::XY(0x8004)),
        form(Base, &[T::I, T::V], Enc::X(0xF01E, 1)),
    ];
    const SUB: &[Form] = &[form(Base, &[T::V, T::V], Enc::XY(0x8005))];
    const SUBN: &[Form] = &[form(Base, &[T::V, T::V], Enc::XY(0x8007))];
    const MUL: &[Form] = &[form(Extended, &[T::V, T::V], Enc::XY(0x9001))];
    const DIV: &[Form] = &[form(Extended, &[T::V, T::V], Enc::XY(0x9002))];
    const BCD: &[Form] = &[
        form(Base, &[T::V], Enc::X(0xF033, 0)),
        form(Extended, &[T::V, T::V], Enc::XY(0x9003)),
    ];
    const RND: &[Form] = &[form(Base, &[T::V, T::Lit], Enc::XByte(0xC000))];
    const DRW: &[Form] = &[form(Base, &[T::V, T::V, T::Lit], Enc::XYN(0xD000))];
    const LD: &[Form] = &[
        form(Base, &[T::V, T::Lit], Enc::XByte(0x6000)),
        form(Base, &[T::V, T::V], Enc::XY(0x8000)),
        form(Base, &[T::I, T::Lit], Enc::Addr(0xA000, 1)),
        form(Base, &[T::V, T::DT], Enc::X(0xF007, 0)),
        form(Base, &[T::V, T::K], Enc::X(0xF00A, 0)),
        form(Base, &[T::DT, T::V], Enc::X(0xF015, 1)),
        form(Base, &[T::ST, T::V], Enc::X(0xF018, 1)),
        form(Base, &[T::F, T::V], Enc::X(0xF029, 1)),
        form(Base, &[T::EffectiveAddress, T::V], Enc::X(0xF055, 1)),
        form(Base, &[T::V, T::EffectiveAddress], Enc::X(0xF065, 0)),
        form(Super, &[T::HF, T::V], Enc::X(0xF030, 1)),
        form(Super, &[T::R, T::V], Enc::XLow(0xF075, 1)),
        form(Super, &[T::V, T::R], Enc::XLow(0xF085, 0)),
        form(Extended, &[T::Ascii, T::V], Enc::X(0xF094, 1)),
    ];

    fn forms(mnemonic: &str) -> Option<&'static [Form]> {
        Some(match mnemonic {
            "CLS" => CLS,
            "RET" => RET,
            "EXIT" => EXIT,
            "LOW" => LOW,
            "HIGH" => HIGH,
            "SCU" => SCU,
            "SCD" => SCD,
            "SCR" => SCR,
            "SCL" => SCL,
            "SYS" | "JP" => JP,
            "CALL" => CALL,
            "SE" => SE,
            "SNE" => SNE,
            "SGT" => SGT,
            "SLT" => SLT,
            "SKP" => SKP,
            "SKNP" => SKNP,
            "OR" => OR,
            "AND" => AND,
            "XOR" => XOR,
            "SHR" => SHR,
            "SHL" => SHL,
            "ADD" => ADD,
            "SUB" => SUB,
            "SUBN" => SUBN,
            "MUL" => MUL,
            "DIV" => DIV,
            "BCD" => BCD,
            "RND" => RND,
            "DRW" => DRW,
            "LD" => LD,
            _ => return None,
        })
    }

    fn byte(n: i32) -> Option<u16> {
        (-0x80..0x100).contains(&n).then_some((n as u8) as u16)
    }

    fn addr(n: i32) -> Option<u16> {
        (0..0x1000).contains(&n).then_some(n as u16)
    }

    fn nibble(n: i32) -> Option<u16> {
        (0..0x10).contains(&n).then_some(n as u16)
    }

    /// Fold matched operands into an opcode; `None` if a value is out of
    /// range for this encoding.
    fn encode(enc: Enc, ops: &[Token]) -> Option<u16> {
        let reg = |idx: usize| ops[idx].int() as u16 & 0xF;
        match enc {
            Enc::Fixed(op) => Some(op),
            Enc::Nibble(op) => Some(op | nibble(ops[0].int())?),
            Enc::Addr(op, idx) => Some(op | addr(ops[idx].int())?),
            Enc::V0Addr(op) => {
                if reg(0) != 0 {
                    return None;
                }
                Some(op | addr(ops[1].int())?)
            }
            Enc::XByte(op) => Some(op | reg(0) << 8 | byte(ops[1].int())?),
            Enc::XY(op) => Some(op | reg(0) << 8 | reg(1) << 4),
            Enc::XX(op) => Some(op | reg(0) << 8 | reg(0) << 4),
            Enc::X(op, idx) => Some(op | reg(idx) << 8),
            Enc::XLow(op, idx) => {
                if reg(idx) >= 8 {
                    return None;
                }
                Some(op | reg(idx) << 8)
            }
            Enc::XYN(op) => Some(op | reg(0) << 8 | reg(1) << 4 | nibble(ops[2].int())?),
        }
    }

    /// Width of a field waiting on a forward reference.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum Field {
        /// low 12 bits of an opcode; the top nibble is the opcode's own
        Address,
        /// a full big-endian `WORD` item
        Word,
    }

    /// A field to patch once its label is known.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Fixup {
        pub label: String,
        pub field: Field,
    }

    /// State of one assembly job.
    pub struct Assembly {
        /// Emitted bytes, starting with `base` reserved bytes.
        pub rom: Vec<u8>,
        pub labels: HashMap<String, Token>,
        /// Offsets of address fields waiting on a label definition.
        pub unresolved: BTreeMap<usize, Fixup>,
        pub base: usize,
        /// SUPER-CHIP instructions enabled.
        pub super_mode: bool,
        /// CHIP-8E instructions enabled.
        pub extended_mode: bool,
        line: usize,
    }

    impl Assembly {
        pub fn new(eti_mode: bool) -> Assembly {
            let base = if eti_mode { ETI_BASE_ADDRESS } else { BASE_ADDRESS };
            Assembly {
                rom: vec![0; base],
                labels: HashMap::new(),
                unresolved: BTreeMap::new(),
                base,
                super_mode: false,
                extended_mode: false,
                line: 0,
            }
        }

        /// Current assembly address.
        pub fn here(&self) -> usize {
            self.rom.len()
        }

        /// Assemble the next source line, tagging any error with its line
        /// number.
        pub fn assemble_line(&mut self, line: Vec<u8>) -> Result<(), AsmError> {
            self.line += 1;
            let mut scanner = TokenScanner::new(line);
            self.assemble(&mut scanner).map_err(|err| err.at_line(self.line))
        }

        /// Assemble one line of tokens.
        pub fn assemble(&mut self, s: &mut TokenScanner) -> Result<(), AsmError> {
            let mut t = s.scan_token()?;

            if t.kind == TokenKind::Label {
                t = self.assemble_label(t.str(), s)?;
            }

            match t.kind {
                TokenKind::Instruction => self.assemble_instruction(t.str(), s),
                TokenKind::Super => {
                    self.assemble_mode(s)?;
                    debug!("enabling SUPER-CHIP instructions");
                    self.super_mode = true;
                    Ok(())
                }
                TokenKind::Extended => {
                    self.assemble_mode(s)?;
                    debug!("enabling CHIP-8E instructions");
                    self.extended_mode = true;
                    Ok(())
                }
                // reserved for debugger support
                TokenKind::Break | TokenKind::Assert => Ok(()),
                TokenKind::End => Ok(()),
                _ => Err(AsmError::UnexpectedToken),
            }
        }

        fn assemble_label(&mut self, label: &str, s: &mut TokenScanner) -> Result<Token, AsmError> {
            if self.labels.contains_key(label) {
                return Err(AsmError::DuplicateLabel(label.to_string()));
            }

            // by default the label is the current address
            self.labels.insert(label.to_string(), Token::lit(self.here() as i32));

            let t = s.scan_token()?;
            if t.kind != TokenKind::Equ && t.kind != TokenKind::Var {
                debug!("label {label} = {:#05X}", self.here());
                return Ok(t);
            }

            let v = s.scan_token()?;
            let legal = (t.kind == TokenKind::Equ && v.kind == TokenKind::Lit)
                || (t.kind == TokenKind::Var && v.kind == TokenKind::V);
            if !legal || s.scan_token()?.kind != TokenKind::End {
                return Err(AsmError::IllegalLabelAssignment);
            }

            debug!("label {label} = {:?}", v);
            self.labels.insert(label.to_string(), v);
            Ok(Token::bare(TokenKind::End))
        }

        fn assemble_mode(&mut self, s: &mut TokenScanner) -> Result<(), AsmError> {
            if s.scan_token()?.kind != TokenKind::End {
                return Err(AsmError::UnexpectedToken);
            }
            if self.rom.len() > self.base {
                return Err(AsmError::ModeAfterInstructions);
            }
            Ok(())
        }

        fn assemble_instruction(&mut self, mnemonic: &str, s: &mut TokenScanner) -> Result<(), AsmError> {
            let tokens = s.scan_operands()?;

            let bytes = match mnemonic {
                "ASCII" => self.assemble_ascii(&tokens)?,
                "BYTE" => self.assemble_byte(&tokens)?,
                "WORD" => self.assemble_word(&tokens)?,
                "ALIGN" => self.assemble_align(&tokens)?,
                "PAD" => self.assemble_pad(&tokens)?,
                _ => {
                    let forms = forms(mnemonic)
                        .ok_or_else(|| AsmError::IllegalInstruction(mnemonic.to_string()))?;
                    let op = self
                        .assemble_forms(forms, &tokens)
                        .ok_or_else(|| AsmError::IllegalInstruction(mnemonic.to_string()))?;
                    vec![(op >> 8) as u8, op as u8]
                }
            };

            self.emit(&bytes)
        }

        /// Try each form in order; the first whose operand kinds and value
        /// ranges match wins.
        fn assemble_forms(&mut self, forms: &[Form], tokens: &[Token]) -> Option<u16> {
            for f in forms {
                let enabled = match f.mode {
                    Mode::Base => true,
                    Mode::Super => self.super_mode,
                    Mode::Extended => self.extended_mode,
                };
                if !enabled {
                    continue;
                }
                if let Some(ops) = self.assemble_operands(tokens, f.operands) {
                    if let Some(op) = encode(f.enc, &ops) {
                        return Some(op);
                    }
                }
            }
            None
        }

        /// Resolve label references and HERE. Unknown labels become a
        /// placeholder address and the current offset is queued for
        /// patching in `build`.
        pub fn assemble_operand(&mut self, t: &Token) -> Token {
            let offset = self.here();
            self.assemble_operand_at(t, offset, Field::Address)
        }

        fn assemble_operand_at(&mut self, t: &Token, offset: usize, field: Field) -> Token {
            match t.kind {
                TokenKind::Id => {
                    let label = t.str();
                    match self.labels.get(label) {
                        Some(bound) => bound.clone(),
                        None => {
                            let fixup = Fixup {
                                label: label.to_string(),
                                field,
                            };
                            self.unresolved.insert(offset, fixup);
                            Token::lit(BASE_ADDRESS as i32)
                        }
                    }
                }
                TokenKind::Here => Token::lit(offset as i32),
                _ => t.clone(),
            }
        }

        /// Resolve a token against labels already defined, without queueing
        /// a patch. Unknown labels stay as ID tokens.
        fn resolve(&self, t: &Token) -> Token {
            match t.kind {
                TokenKind::Id => self.labels.get(t.str()).cloned().unwrap_or_else(|| t.clone()),
                TokenKind::Here => Token::lit(self.here() as i32),
                _ => t.clone(),
            }
        }

        /// Match tokens against an operand signature. `None` means no match,
        /// not an error.
        pub fn assemble_operands(&mut self, tokens: &[Token], kinds: &[TokenKind]) -> Option<Vec<Token>> {
            if tokens.len() != kinds.len() {
                return None;
            }

            let mut ops = Vec::with_capacity(tokens.len());
            for (t, kind) in tokens.iter().zip(kinds) {
                let op = self.assemble_operand(t);
                if op.kind != *kind {
                    return None;
                }
                ops.push(op);
            }
            Some(ops)
        }

        fn assemble_ascii(&mut self, tokens: &[Token]) -> Result<Vec<u8>, AsmError> {
            if !self.extended_mode {
                return Err(AsmError::IllegalInstruction("ASCII".into()));
            }

            let mut b = Vec::new();
            for t in tokens {
                let op = self.resolve(t);
                if op.kind != TokenKind::Text {
                    return Err(AsmError::ExpectedAsciiString);
                }
                for c in op.str().chars() {
                    let idx = ASCII_TABLE.find(c).ok_or(AsmError::InvalidAsciiChar(c))?;
                    b.push(idx as u8);
                }
            }
            Ok(b)
        }

        fn assemble_byte(&mut self, tokens: &[Token]) -> Result<Vec<u8>, AsmError> {
            let mut b = Vec::new();
            for t in tokens {
                let op = self.resolve(t);
                match op.kind {
                    TokenKind::Lit => {
                        let n = byte(op.int()).ok_or(AsmError::InvalidByte)?;
                        b.push(n as u8);
                    }
                    TokenKind::Text => b.extend(op.str().chars().map(|c| c as u8)),
                    _ => return Err(AsmError::InvalidByte),
                }
            }
            Ok(b)
        }

        fn assemble_word(&mut self, tokens: &[Token]) -> Result<Vec<u8>, AsmError> {
            let mut b = Vec::new();
            for t in tokens {
                let offset = self.here() + b.len();
                let op = self.assemble_operand_at(t, offset, Field::Word);
                let n = op.int();
                if op.kind != TokenKind::Lit || !(-0x8000..=0xFFFF).contains(&n) {
                    return Err(AsmError::InvalidWord);
                }
                // msb first
                b.push((n >> 8) as u8);
                b.push(n as u8);
            }
            Ok(b)
        }

        fn assemble_align(&mut self, tokens: &[Token]) -> Result<Vec<u8>, AsmError> {
            let [t] = tokens else {
                return Err(AsmError::IllegalAlignment);
            };
            let op = self.resolve(t);
            if op.kind != TokenKind::Lit {
                return Err(AsmError::IllegalAlignment);
            }
            let n = op.int();
            if n <= 0 || n & (n - 1) != 0 {
                return Err(AsmError::IllegalAlignment);
            }

            let n = n as usize;
            let offset = self.here() & (n - 1);
            let pad = if offset == 0 { 0 } else { n - offset };
            if self.here() + pad > ADDRESS_SPACE {
                return Err(AsmError::ProgramTooLarge);
            }
            Ok(vec![0; pad])
        }

        fn assemble_pad(&mut self, tokens: &[Token]) -> Result<Vec<u8>, AsmError> {
            let [t] = tokens else {
                return Err(AsmError::IllegalSize);
            };
            let op = self.resolve(t);
            if op.kind != TokenKind::Lit {
                return Err(AsmError::IllegalSize);
            }
            let n = op.int();
            if n < 0 || self.here() + n as usize > ADDRESS_SPACE {
                return Err(AsmError::IllegalSize);
            }
            Ok(vec![0; n as usize])
        }

        fn emit(&mut self, bytes: &[u8]) -> Result<(), AsmError> {
            if self.rom.len() + bytes.len() > ADDRESS_SPACE {
                return Err(AsmError::ProgramTooLarge);
            }
            self.rom.extend_from_slice(bytes);
            Ok(())
        }

        /// Patch forward references and return the program image without
        /// the reserved `base` prefix.
        pub fn build(mut self) -> Result<Vec<u8>, AsmError> {
            let pending = std::mem::take(&mut self.unresolved);
            for (offset, fixup) in pending {
                let Some(t) = self.labels.get(&fixup.label) else {
                    self.unresolved.insert(offset, fixup);
                    continue;
                };
                if t.kind != TokenKind::Lit {
                    return Err(AsmError::LabelNotAddress(fixup.label));
                }

                let value = t.int();
                trace!("patching {} = {value:#05X} at {offset:#05X}", fixup.label);
                match fixup.field {
                    Field::Address => {
                        let value = addr(value).ok_or(AsmError::AddressOutOfRange(fixup.label))?;
                        self.rom[offset] = (self.rom[offset] & 0xF0) | (value >> 8) as u8;
                        self.rom[offset + 1] = value as u8;
                    }
                    Field::Word => {
                        if !(-0x8000..=0xFFFF).contains(&value) {
                            return Err(AsmError::InvalidWord);
                        }
                        self.rom[offset] = (value >> 8) as u8;
                        self.rom[offset + 1] = value as u8;
                    }
                }
            }

            if let Some(fixup) = self.unresolved.values().next() {
                return Err(AsmError::UnresolvedLabel(fixup.label.clone()));
            }

            // drop the reserved interpreter region
            Ok(self.rom.split_off(self.base))
        }
    }

    /// Assemble a complete source buffer into a program image.
    ///
    /// The source is upper-cased first, so mnemonics, registers and labels
    /// are case-insensitive.
    pub fn assemble_program(source: &[u8], eti_mode: bool) -> Result<Vec<u8>, AsmError> {
        let source = source.to_ascii_uppercase();
        let mut asm = Assembly::new(eti_mode);

        for line in LineScanner::new(&source) {
            asm.assemble_line(line)?;
        }

        debug!(
            "assembled {} bytes, {} labels",
            asm.rom.len() - asm.base,
            asm.labels.len()
        );
        asm.build()
    }
}
