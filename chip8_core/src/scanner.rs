pub mod scanner {
    use crate::error::error::AsmError;

    /// Every mnemonic the assembler knows how to encode.
    pub const MNEMONICS: [&str; 37] = [
        "CLS", "RET", "EXIT", "LOW", "HIGH", "SCU", "SCD", "SCR", "SCL", "SYS", "JP", "CALL",
        "SE", "SNE", "SGT", "SLT", "SKP", "SKNP", "OR", "AND", "XOR", "SHR", "SHL", "ADD", "SUB",
        "SUBN", "MUL", "DIV", "BCD", "RND", "DRW", "LD", "ASCII", "BYTE", "WORD", "ALIGN", "PAD",
    ];

    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub enum TokenKind {
        End,
        Char,
        Label,
        Id,
        Instruction,
        Operand,
        V,
        R,
        I,
        EffectiveAddress,
        F,
        HF,
        K,
        DT,
        ST,
        Lit,
        Text,
        Break,
        Assert,
        Equ,
        Var,
        Here,
        Super,
        Extended,
        Ascii,
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum TokenValue {
        None,
        Int(i32),
        Text(String),
        Token(Box<Token>),
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Token {
        pub kind: TokenKind,
        pub value: TokenValue,
    }

    impl Token {
        pub fn new(kind: TokenKind, value: TokenValue) -> Token {
            Token { kind, value }
        }

        pub fn bare(kind: TokenKind) -> Token {
            Token::new(kind, TokenValue::None)
        }

        pub fn lit(value: i32) -> Token {
            Token::new(TokenKind::Lit, TokenValue::Int(value))
        }

        pub fn v(index: u8) -> Token {
            Token::new(TokenKind::V, TokenValue::Int(index as i32))
        }

        pub fn text(kind: TokenKind, text: impl Into<String>) -> Token {
            Token::new(kind, TokenValue::Text(text.into()))
        }

        /// Integer payload, or 0 for tokens that carry none.
        pub fn int(&self) -> i32 {
            match &self.value {
                TokenValue::Int(n) => *n,
                _ => 0,
            }
        }

        /// Text payload, or "" for tokens that carry none.
        pub fn str(&self) -> &str {
            match &self.value {
                TokenValue::Text(s) => s,
                _ => "",
            }
        }
    }

    /// Splits a raw source buffer into `\n` delimited lines.
    ///
    /// A zero byte inside a line stands for the previous non-zero byte of
    /// that line, so runs of a character may be stored as one byte followed
    /// by zeros.
    pub struct LineScanner<'a> {
        buf: &'a [u8],
        pos: usize,
    }

    impl<'a> LineScanner<'a> {
        pub fn new(buf: &'a [u8]) -> LineScanner<'a> {
            LineScanner { buf, pos: 0 }
        }

        pub fn rewind(&mut self) {
            self.pos = 0;
        }

        pub fn position(&self) -> usize {
            self.pos
        }
    }

    impl Iterator for LineScanner<'_> {
        type Item = Vec<u8>;

        fn next(&mut self) -> Option<Vec<u8>> {
            if self.pos >= self.buf.len() {
                return None;
            }

            let mut line = Vec::new();
            let mut curr = 0u8;
            while self.pos < self.buf.len() {
                let val = self.buf[self.pos];
                self.pos += 1;
                if val != 0 {
                    curr = val;
                }
                if curr == b'\n' {
                    return Some(line);
                }
                line.push(curr);
            }

            // trailing line without a newline
            Some(line)
        }
    }

    /// Lexes a single line of (already upper-cased) assembly source.
    pub struct TokenScanner {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl TokenScanner {
        pub fn new(bytes: impl Into<Vec<u8>>) -> TokenScanner {
            TokenScanner {
                bytes: bytes.into(),
                pos: 0,
            }
        }

        fn peek(&self) -> Option<u8> {
            self.bytes.get(self.pos).copied()
        }

        fn peek_at(&self, offset: usize) -> Option<u8> {
            self.bytes.get(self.pos + offset).copied()
        }

        fn skip_whitespace(&mut self) {
            while let Some(c) = self.peek() {
                if c >= 33 {
                    break;
                }
                self.pos += 1;
            }
        }

        /// Consume bytes while `pred` holds and return them as text.
        fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
            let start = self.pos;
            while let Some(c) = self.peek() {
                if !pred(c) {
                    break;
                }
                self.pos += 1;
            }
            self.bytes[start..self.pos].iter().map(|&b| b as char).collect()
        }

        /// Returns the next token on the line, or END once it is exhausted.
        pub fn scan_token(&mut self) -> Result<Token, AsmError> {
            self.skip_whitespace();

            let Some(c) = self.peek() else {
                return Ok(Token::bare(TokenKind::End));
            };

            match c {
                b'0'..=b'9' => self.scan_decimal(),
                b'-' if matches!(self.peek_at(1), Some(b'0'..=b'9')) => self.scan_decimal(),
                b'A'..=b'Z' => Ok(self.scan_identifier()),
                b';' => Ok(self.scan_comment()),
                b'[' => self.scan_effective_address(),
                b',' => self.scan_operand(),
                b'#' => self.scan_hex(),
                b'%' => self.scan_binary(),
                b'"' | b'\'' | b'`' => Ok(self.scan_string(c)),
                b'*' => {
                    self.pos += 1;
                    Ok(Token::bare(TokenKind::Here))
                }
                _ => {
                    self.pos += 1;
                    Ok(Token::new(TokenKind::Char, TokenValue::Int(c as i32)))
                }
            }
        }

        /// Collects the operand list of an instruction. Operands after the
        /// first must be introduced with a comma.
        pub fn scan_operands(&mut self) -> Result<Vec<Token>, AsmError> {
            let mut operands = Vec::new();
            loop {
                let t = self.scan_token()?;
                match t.kind {
                    TokenKind::End => return Ok(operands),
                    TokenKind::Operand => match t.value {
                        TokenValue::Token(inner) => operands.push(*inner),
                        _ => return Err(AsmError::ExpectedOperand),
                    },
                    _ if operands.is_empty() => operands.push(t),
                    _ => return Err(AsmError::UnexpectedToken),
                }
            }
        }

        fn scan_decimal(&mut self) -> Result<Token, AsmError> {
            let start = self.pos;
            if self.peek() == Some(b'-') {
                self.pos += 1;
            }
            self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
            let text: String = self.bytes[start..self.pos].iter().map(|&b| b as char).collect();

            text.parse::<i32>()
                .map(Token::lit)
                .map_err(|_| AsmError::IllegalDecimal(text))
        }

        fn scan_hex(&mut self) -> Result<Token, AsmError> {
            self.pos += 1;
            let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');

            i32::from_str_radix(&text, 16)
                .map(Token::lit)
                .map_err(|_| AsmError::IllegalHex(text))
        }

        fn scan_binary(&mut self) -> Result<Token, AsmError> {
            self.pos += 1;
            let text = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'.');
            let digits: String = text.chars().filter(|&c| c != '.').collect();

            i32::from_str_radix(&digits, 2)
                .map(Token::lit)
                .map_err(|_| AsmError::IllegalBinary(text))
        }

        fn scan_identifier(&mut self) -> Token {
            let start = self.pos;
            let ident = self.take_while(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == b'_');

            if let Some(t) = keyword(&ident) {
                return t;
            }

            if start == 0 {
                // optional trailing colon on label definitions
                if self.peek() == Some(b':') {
                    self.pos += 1;
                }
                Token::text(TokenKind::Label, ident)
            } else {
                Token::text(TokenKind::Id, ident)
            }
        }

        fn scan_comment(&mut self) -> Token {
            self.pos += 1;
            let text: String = self.bytes[self.pos..].iter().map(|&b| b as char).collect();
            self.pos = self.bytes.len();
            Token::text(TokenKind::End, text.trim())
        }

        fn scan_effective_address(&mut self) -> Result<Token, AsmError> {
            self.pos += 1;
            if self.scan_token()?.kind != TokenKind::I {
                return Err(AsmError::IllegalEffectiveAddress);
            }
            let close = self.scan_token()?;
            if close.kind != TokenKind::Char || close.int() != b']' as i32 {
                return Err(AsmError::IllegalIndirection);
            }
            Ok(Token::bare(TokenKind::EffectiveAddress))
        }

        fn scan_operand(&mut self) -> Result<Token, AsmError> {
            self.pos += 1;
            let t = self.scan_token()?;
            if t.kind == TokenKind::End {
                return Err(AsmError::ExpectedOperand);
            }
            Ok(Token::new(TokenKind::Operand, TokenValue::Token(Box::new(t))))
        }

        fn scan_string(&mut self, term: u8) -> Token {
            self.pos += 1;
            let text = self.take_while(|c| c != term);
            // step over the terminator; unterminated strings run to end of line
            if self.peek() == Some(term) {
                self.pos += 1;
            }
            Token::text(TokenKind::Text, text)
        }
    }

    fn keyword(ident: &str) -> Option<Token> {
        let bytes = ident.as_bytes();
        if bytes.len() == 2 && bytes[0] == b'V' {
            if let Some(n) = (bytes[1] as char).to_digit(16) {
                return Some(Token::v(n as u8));
            }
        }

        let kind = match ident {
            "I" => TokenKind::I,
            "R" => TokenKind::R,
            "F" => TokenKind::F,
            "HF" => TokenKind::HF,
            "K" => TokenKind::K,
            "DT" | "D" => TokenKind::DT,
            "ST" | "S" => TokenKind::ST,
            "A" => TokenKind::Ascii,
            "BREAK" => TokenKind::Break,
            "ASSERT" => TokenKind::Assert,
            "EQU" => TokenKind::Equ,
            "VAR" => TokenKind::Var,
            "SUPER" => TokenKind::Super,
            "EXTENDED" => TokenKind::Extended,
            _ if MNEMONICS.contains(&ident) => {
                return Some(Token::text(TokenKind::Instruction, ident));
            }
            _ => return None,
        };
        Some(Token::bare(kind))
    }

}
