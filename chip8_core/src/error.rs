pub mod error {
    use thiserror::Error;

    /// Faults raised while assembling source text. Any of these aborts the
    /// whole assembly job; no partial ROM is produced.
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum AsmError {
        #[error("illegal decimal value: {0}")]
        IllegalDecimal(String),

        #[error("illegal hex value: {0}")]
        IllegalHex(String),

        #[error("illegal binary value: {0}")]
        IllegalBinary(String),

        #[error("illegal effective address")]
        IllegalEffectiveAddress,

        #[error("illegal indirection")]
        IllegalIndirection,

        #[error("expected operand")]
        ExpectedOperand,

        #[error("unexpected token")]
        UnexpectedToken,

        #[error("duplicate label: {0}")]
        DuplicateLabel(String),

        #[error("illegal label assignment")]
        IllegalLabelAssignment,

        #[error("super must come before instructions")]
        ModeAfterInstructions,

        #[error("illegal instruction: {0}")]
        IllegalInstruction(String),

        #[error("expected ascii string")]
        ExpectedAsciiString,

        #[error("invalid CHIP-8E ascii character: {0:?}")]
        InvalidAsciiChar(char),

        #[error("invalid byte")]
        InvalidByte,

        #[error("invalid word")]
        InvalidWord,

        #[error("illegal alignment")]
        IllegalAlignment,

        #[error("illegal size")]
        IllegalSize,

        #[error("program too large")]
        ProgramTooLarge,

        #[error("label does not resolve to address: {0}")]
        LabelNotAddress(String),

        #[error("label out of address range: {0}")]
        AddressOutOfRange(String),

        #[error("unresolved label: {0}")]
        UnresolvedLabel(String),

        #[error("line {line}: {source}")]
        AtLine {
            line: usize,
            #[source]
            source: Box<AsmError>,
        },
    }

    impl AsmError {
        /// Attach a 1-based source line number to an error.
        pub fn at_line(self, line: usize) -> AsmError {
            match self {
                AsmError::AtLine { .. } => self,
                other => AsmError::AtLine {
                    line,
                    source: Box::new(other),
                },
            }
        }

        /// The underlying fault with any line information stripped.
        pub fn kind(&self) -> &AsmError {
            match self {
                AsmError::AtLine { source, .. } => source.kind(),
                other => other,
            }
        }

        pub fn line(&self) -> Option<usize> {
            match self {
                AsmError::AtLine { line, .. } => Some(*line),
                _ => None,
            }
        }
    }

    /// Faults raised while loading or executing a program.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
    pub enum VmError {
        #[error("invalid opcode {opcode:#06X} at {address:#05X}")]
        InvalidOpcode { opcode: u16, address: u16 },

        #[error("stack overflow")]
        StackOverflow,

        #[error("stack underflow")]
        StackUnderflow,

        #[error("program too large to fit in memory ({size} bytes, max {max_size})")]
        ProgramTooLarge { size: usize, max_size: usize },
    }

    impl VmError {
        /// Invalid opcodes are reported to the caller, which decides whether
        /// to halt or skip. Everything else ends the run.
        pub fn is_fatal(&self) -> bool {
            !matches!(self, VmError::InvalidOpcode { .. })
        }
    }

    /// Umbrella error for callers that assemble and run in one go.
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum Chip8Error {
        #[error(transparent)]
        Asm(#[from] AsmError),

        #[error(transparent)]
        Vm(#[from] VmError),
    }
}
