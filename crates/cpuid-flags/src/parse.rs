//! Recursive-descent parser for flag selectors.
//!
//! ```text
//! selector := "CPUID" "." leafsel ":" register [ "." name ] [ "[" bits "]" ]
//! leafsel  := leaf | "(" "EAX" "=" leaf [ "," "ECX" "=" number ] ")"
//! leaf     := number | mnemonic
//! number   := hex "H" | "0x" hex | decimal
//! bits     := "bit" N | "bits" HIGH ":" LOW
//! ```
//!
//! Keywords, registers, and mnemonics are case-insensitive.

use cpuid_core::leaf::find_by_name;
use cpuid_core::Register;
use tracing::debug;

use crate::error::{FlagError, Result};
use crate::lexer::{tokenize, Token, TokenKind};
use crate::selector::{BitRange, FlagSelector};

/// Parse selector text such as `CPUID.01H:EDX.SSE2[bit 26]`.
pub fn parse(input: &str) -> Result<FlagSelector> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    let selector = parser.selector()?;
    debug!(%selector, "parsed flag selector");
    Ok(selector)
}

/// Parse a numeric literal: `1FH`, `0x1f`, or `31`.
pub fn parse_number(token: &Token<'_>) -> Result<u32> {
    let text = token.text;
    let invalid = || FlagError::InvalidNumber {
        position: token.position,
        text: text.to_string(),
    };

    let (digits, radix) = if let Some(hex) = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        (hex, 16)
    } else if let Some(hex) = text.strip_suffix(|c: char| c == 'h' || c == 'H') {
        (hex, 16)
    } else {
        (text, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }
    u32::from_str_radix(digits, radix).map_err(|_| invalid())
}

struct Parser<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token<'a>> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self, expected: &'static str) -> Result<Token<'a>> {
        let token = *self
            .tokens
            .get(self.pos)
            .ok_or(FlagError::UnexpectedEnd { expected })?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token<'a>> {
        let token = self.advance(expected)?;
        if token.kind != kind {
            return Err(unexpected(&token, expected));
        }
        Ok(token)
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> Result<Token<'a>> {
        let token = self.advance(keyword)?;
        if !token.is_keyword(keyword) {
            return Err(unexpected(&token, keyword));
        }
        Ok(token)
    }

    /// Consume the next token if it is `kind`.
    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().is_some_and(|t| t.kind == kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn selector(&mut self) -> Result<FlagSelector> {
        self.expect_keyword("CPUID")?;
        self.expect(TokenKind::Dot, "'.'")?;

        let (leaf, subleaf) = if self.eat(TokenKind::LParen) {
            self.expect_keyword("EAX")?;
            self.expect(TokenKind::Equals, "'='")?;
            let leaf = self.leaf()?;
            let subleaf = if self.eat(TokenKind::Comma) {
                self.expect_keyword("ECX")?;
                self.expect(TokenKind::Equals, "'='")?;
                self.number("subleaf")?
            } else {
                0
            };
            self.expect(TokenKind::RParen, "')'")?;
            (leaf, subleaf)
        } else {
            (self.leaf()?, 0)
        };

        self.expect(TokenKind::Colon, "':'")?;
        let register = self.register()?;

        let name = if self.eat(TokenKind::Dot) {
            Some(self.expect(TokenKind::Word, "flag name")?.text.to_string())
        } else {
            None
        };

        let bits = if self.eat(TokenKind::LBracket) {
            let range = self.bits()?;
            self.expect(TokenKind::RBracket, "']'")?;
            Some(range)
        } else {
            None
        };

        if let Some(token) = self.peek() {
            return Err(unexpected(token, "end of input"));
        }

        Ok(FlagSelector {
            leaf,
            subleaf,
            register,
            bits,
            name,
        })
    }

    fn number(&mut self, expected: &'static str) -> Result<u32> {
        let token = self.expect(TokenKind::Word, expected)?;
        parse_number(&token)
    }

    /// A numeric leaf, or a catalog mnemonic when the word starts with a letter.
    fn leaf(&mut self) -> Result<u32> {
        let token = self.expect(TokenKind::Word, "leaf")?;
        if token.text.starts_with(|c: char| c.is_ascii_digit()) {
            return parse_number(&token);
        }
        find_by_name(token.text)
            .map(|info| info.leaf)
            .ok_or_else(|| FlagError::UnknownLeaf {
                position: token.position,
                name: token.text.to_string(),
            })
    }

    fn register(&mut self) -> Result<Register> {
        let token = self.expect(TokenKind::Word, "register")?;
        Register::from_name(token.text).ok_or_else(|| FlagError::UnknownRegister {
            position: token.position,
            name: token.text.to_string(),
        })
    }

    fn bits(&mut self) -> Result<BitRange> {
        const EXPECTED: &str = "'bit' or 'bits'";
        let keyword = self.expect(TokenKind::Word, EXPECTED)?;
        if keyword.is_keyword("bit") {
            let (_, index) = self.bit_index()?;
            Ok(BitRange::bit(index))
        } else if keyword.is_keyword("bits") {
            let (position, high) = self.bit_index()?;
            self.expect(TokenKind::Colon, "':'")?;
            let (_, low) = self.bit_index()?;
            if high < low {
                return Err(FlagError::InvertedRange {
                    position,
                    high,
                    low,
                });
            }
            Ok(BitRange { low, high })
        } else {
            Err(unexpected(&keyword, EXPECTED))
        }
    }

    fn bit_index(&mut self) -> Result<(usize, u32)> {
        let token = self.expect(TokenKind::Word, "bit index")?;
        let bit = parse_number(&token)?;
        if bit > 31 {
            return Err(FlagError::BitOutOfRange {
                position: token.position,
                bit,
            });
        }
        Ok((token.position, bit))
    }
}

fn unexpected(token: &Token<'_>, expected: &'static str) -> FlagError {
    FlagError::UnexpectedToken {
        position: token.position,
        found: token.text.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bit_with_name() {
        let sel = parse("CPUID.01H:EDX.SSE2[bit 26]").unwrap();
        assert_eq!(sel.leaf, 1);
        assert_eq!(sel.subleaf, 0);
        assert_eq!(sel.register, Register::Edx);
        assert_eq!(sel.bits, Some(BitRange::bit(26)));
        assert_eq!(sel.name.as_deref(), Some("SSE2"));
    }

    #[test]
    fn parse_paren_form_with_subleaf() {
        let sel = parse("cpuid.(eax=07h, ecx=1):ebx.avx2[bit 5]").unwrap();
        assert_eq!((sel.leaf, sel.subleaf), (7, 1));
        assert_eq!(sel.register, Register::Ebx);
        assert_eq!(sel.name.as_deref(), Some("avx2"));
    }

    #[test]
    fn parse_range_and_whole_register() {
        let sel = parse("CPUID.1:EAX[bits 11:8]").unwrap();
        assert_eq!(sel.bits, Some(BitRange { low: 8, high: 11 }));

        let sel = parse("CPUID.0x80000001 : ECX").unwrap();
        assert_eq!(sel.leaf, 0x8000_0001);
        assert_eq!(sel.bits, None);
        assert_eq!(sel.name, None);
    }

    #[test]
    fn parse_mnemonic_leaf() {
        let sel = parse("CPUID.extended_features:EBX[bit 9]").unwrap();
        assert_eq!(sel.leaf, 7);

        let sel = parse("CPUID.(EAX=Extended_Topology,ECX=1):EBX").unwrap();
        assert_eq!((sel.leaf, sel.subleaf), (0xB, 1));
    }

    #[test]
    fn numbers_in_every_base() {
        let word = |text| Token {
            kind: TokenKind::Word,
            text,
            position: 0,
        };
        assert_eq!(parse_number(&word("1FH")).unwrap(), 0x1F);
        assert_eq!(parse_number(&word("0x1f")).unwrap(), 0x1F);
        assert_eq!(parse_number(&word("31")).unwrap(), 31);
        assert_eq!(parse_number(&word("0AH")).unwrap(), 0xA);
        assert!(parse_number(&word("H")).is_err());
        assert!(parse_number(&word("0x")).is_err());
        assert!(parse_number(&word("1G")).is_err());
        assert!(parse_number(&word("100000000H")).is_err());
    }

    #[test]
    fn errors_point_at_offending_token() {
        assert_eq!(
            parse("CPUID:EAX").unwrap_err(),
            FlagError::UnexpectedToken {
                position: 5,
                found: ":".into(),
                expected: "'.'",
            }
        );
        assert!(matches!(
            parse("CPUID.01H:EFX").unwrap_err(),
            FlagError::UnknownRegister { position: 10, .. }
        ));
        assert!(matches!(
            parse("CPUID.no_such_leaf:EAX").unwrap_err(),
            FlagError::UnknownLeaf { position: 6, .. }
        ));
        assert!(matches!(
            parse("CPUID.01H:EAX[bit 32]").unwrap_err(),
            FlagError::BitOutOfRange { bit: 32, .. }
        ));
        assert!(matches!(
            parse("CPUID.01H:EAX[bits 3:8]").unwrap_err(),
            FlagError::InvertedRange { high: 3, low: 8, .. }
        ));
        assert!(matches!(
            parse("CPUID.01H:EAX[bit 3] extra").unwrap_err(),
            FlagError::UnexpectedToken {
                expected: "end of input",
                ..
            }
        ));
        assert_eq!(
            parse("CPUID.01H").unwrap_err(),
            FlagError::UnexpectedEnd { expected: "':'" }
        );
        assert!(matches!(
            parse("").unwrap_err(),
            FlagError::UnexpectedEnd { expected: "CPUID" }
        ));
    }
}
