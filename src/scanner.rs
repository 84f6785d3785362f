//! Tokenizer.
//!
//! The scanner produces one token at a time over a [`Source`], performing
//! automatic semicolon insertion and literal scanning. Lexical errors are
//! reported through the installed handler; the error message never starts
//! with a `/`. Comment text surfaced in `COMMENTS`/`DIRECTIVES` mode always
//! starts with a `/`, which distinguishes the two streams.

use std::io::Read;

use unicode_ident::{is_xid_continue, is_xid_start};

use crate::error::ScanHandler;
use crate::source::Source;
use crate::token::{
    LitKind, Operator, Token, contains, tokset, PREC_ADD, PREC_ANDAND, PREC_CMP, PREC_MUL,
    PREC_OROR,
};

/// Surface every comment through the handler.
pub const COMMENTS: u8 = 1 << 0;
/// Surface only comments carrying `line` directives through the handler.
pub const DIRECTIVES: u8 = 1 << 1;

// Tokens after which a newline (or EOF, or a multi-line comment) inserts a
// semicolon.
const NLSEMI_KEYWORDS: u64 = tokset(&[Token::Break, Token::Continue, Token::Return, Token::Name]);

pub struct Scanner<'a> {
    source: Source<'a>,
    mode: u8,
    nlsemi: bool, // if set, '\n' and EOF translate to ';'

    // current token, valid after calling next()
    line: u32,
    col: u32,
    token: Token,
    lit: String,    // valid if token is Name, Literal, or Semi ("semicolon", "newline", or "EOF")
    bad: bool,      // valid if token is Literal; true if a syntax error occurred, lit may be malformed
    kind: LitKind,  // valid if token is Literal
    op: Operator,   // valid if token is Op, Star, AssignOp, or IncOp
    prec: u8,       // valid if token is Op, Star, AssignOp, or IncOp
}

impl<'a> Scanner<'a> {
    pub fn new(src: &'a mut dyn Read, errh: ScanHandler<'a>, mode: u8) -> Scanner<'a> {
        Scanner {
            source: Source::new(src, errh),
            mode,
            nlsemi: false,
            line: 0,
            col: 0,
            token: Token::EOF,
            lit: String::new(),
            bad: false,
            kind: LitKind::Int,
            op: Operator::Add,
            prec: 0,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }
    pub fn literal(&self) -> &str {
        &self.lit
    }
    pub fn bad(&self) -> bool {
        self.bad
    }
    pub fn kind(&self) -> LitKind {
        self.kind
    }
    pub fn op(&self) -> Operator {
        self.op
    }
    pub fn prec(&self) -> u8 {
        self.prec
    }
    pub fn line(&self) -> u32 {
        self.line
    }
    pub fn col(&self) -> u32 {
        self.col
    }

    // errorf reports an error at the most recently read character position.
    fn errorf(&mut self, msg: &str) {
        self.source.error(msg);
    }

    // error_atf reports an error at a byte column offset relative to the
    // current token start.
    fn error_atf(&mut self, offset: u32, msg: &str) {
        let (line, col) = (self.line, self.col + offset);
        (self.source.errh)(line, col, msg);
    }

    // set_lit sets the scanner state for a recognized Literal token.
    fn set_lit(&mut self, kind: LitKind, ok: bool) {
        self.nlsemi = true;
        self.token = Token::Literal;
        self.lit = String::from_utf8_lossy(self.source.segment()).into_owned();
        self.bad = !ok;
        self.kind = kind;
    }

    fn segment_string(&self) -> String {
        String::from_utf8_lossy(self.source.segment()).into_owned()
    }

    /// Advances the scanner to the next token.
    pub fn next(&mut self) {
        let nlsemi = self.nlsemi;
        self.nlsemi = false;

        loop {
            // skip white space
            self.source.stop();
            while self.source.ch == Some(' ')
                || self.source.ch == Some('\t')
                || (self.source.ch == Some('\n') && !nlsemi)
                || self.source.ch == Some('\r')
            {
                self.source.nextch();
            }

            // token start
            let (line, col) = self.source.pos();
            self.line = line;
            self.col = col;
            self.source.start();

            if let Some(c) = self.source.ch {
                if is_letter(c) || (!c.is_ascii() && self.at_ident_char(true)) {
                    self.source.nextch();
                    self.ident();
                    return;
                }
            }

            match self.source.ch {
                None => {
                    if nlsemi {
                        self.lit = "EOF".to_string();
                        self.token = Token::Semi;
                    } else {
                        self.token = Token::EOF;
                    }
                }

                Some('\n') => {
                    self.source.nextch();
                    self.lit = "newline".to_string();
                    self.token = Token::Semi;
                }

                Some('0'..='9') => self.number(false),

                Some('"') => self.std_string(),

                Some('`') => self.raw_string(),

                Some('\'') => self.rune_lit(),

                Some('(') => {
                    self.source.nextch();
                    self.token = Token::Lparen;
                }

                Some('[') => {
                    self.source.nextch();
                    self.token = Token::Lbrack;
                }

                Some('{') => {
                    self.source.nextch();
                    self.token = Token::Lbrace;
                }

                Some(',') => {
                    self.source.nextch();
                    self.token = Token::Comma;
                }

                Some(';') => {
                    self.source.nextch();
                    self.lit = "semicolon".to_string();
                    self.token = Token::Semi;
                }

                Some(')') => {
                    self.source.nextch();
                    self.nlsemi = true;
                    self.token = Token::Rparen;
                }

                Some(']') => {
                    self.source.nextch();
                    self.nlsemi = true;
                    self.token = Token::Rbrack;
                }

                Some('}') => {
                    self.source.nextch();
                    self.nlsemi = true;
                    self.token = Token::Rbrace;
                }

                Some(':') => {
                    self.source.nextch();
                    if self.source.ch == Some('=') {
                        self.source.nextch();
                        self.token = Token::Define;
                    } else {
                        self.token = Token::Colon;
                    }
                }

                Some('.') => {
                    self.source.nextch();
                    if matches!(self.source.ch, Some(c) if is_decimal(c)) {
                        self.number(true);
                    } else if self.source.ch == Some('.') {
                        self.source.nextch();
                        if self.source.ch == Some('.') {
                            self.source.nextch();
                            self.token = Token::DotDotDot;
                        } else {
                            self.source.rewind(); // now ch holds the 1st '.'
                            self.source.nextch(); // consume the 1st '.' again
                            self.token = Token::Dot;
                        }
                    } else {
                        self.token = Token::Dot;
                    }
                }

                Some('+') => {
                    self.source.nextch();
                    self.op = Operator::Add;
                    self.prec = PREC_ADD;
                    if self.source.ch == Some('+') {
                        self.source.nextch();
                        self.nlsemi = true;
                        self.token = Token::IncOp;
                    } else {
                        self.assignop();
                    }
                }

                Some('-') => {
                    self.source.nextch();
                    self.op = Operator::Sub;
                    self.prec = PREC_ADD;
                    if self.source.ch == Some('-') {
                        self.source.nextch();
                        self.nlsemi = true;
                        self.token = Token::IncOp;
                    } else {
                        self.assignop();
                    }
                }

                Some('*') => {
                    self.source.nextch();
                    self.op = Operator::Mul;
                    self.prec = PREC_MUL;
                    // no assignop fallthrough: a lone '*' must be Star
                    if self.source.ch == Some('=') {
                        self.source.nextch();
                        self.token = Token::AssignOp;
                    } else {
                        self.token = Token::Star;
                    }
                }

                Some('/') => {
                    self.source.nextch();
                    if self.source.ch == Some('/') {
                        self.source.nextch();
                        self.line_comment();
                        continue;
                    }
                    if self.source.ch == Some('*') {
                        self.source.nextch();
                        self.full_comment();
                        let (line, _) = self.source.pos();
                        if line > self.line && nlsemi {
                            // A multi-line comment acts like a newline; it
                            // translates to a ';' if nlsemi is set.
                            self.lit = "newline".to_string();
                            self.token = Token::Semi;
                            break;
                        }
                        continue;
                    }
                    self.op = Operator::Div;
                    self.prec = PREC_MUL;
                    self.assignop();
                }

                Some('%') => {
                    self.source.nextch();
                    self.op = Operator::Rem;
                    self.prec = PREC_MUL;
                    self.assignop();
                }

                Some('&') => {
                    self.source.nextch();
                    if self.source.ch == Some('&') {
                        self.source.nextch();
                        self.op = Operator::AndAnd;
                        self.prec = PREC_ANDAND;
                        self.token = Token::Op;
                    } else {
                        self.error_atf(0, &format!("invalid character {}", format_rune('&')));
                        continue;
                    }
                }

                Some('|') => {
                    self.source.nextch();
                    if self.source.ch == Some('|') {
                        self.source.nextch();
                        self.op = Operator::OrOr;
                        self.prec = PREC_OROR;
                        self.token = Token::Op;
                    } else {
                        self.error_atf(0, &format!("invalid character {}", format_rune('|')));
                        continue;
                    }
                }

                Some('<') => {
                    self.source.nextch();
                    if self.source.ch == Some('=') {
                        self.source.nextch();
                        self.op = Operator::Leq;
                    } else {
                        self.op = Operator::Lss;
                    }
                    self.prec = PREC_CMP;
                    self.token = Token::Op;
                }

                Some('>') => {
                    self.source.nextch();
                    if self.source.ch == Some('=') {
                        self.source.nextch();
                        self.op = Operator::Geq;
                    } else {
                        self.op = Operator::Gtr;
                    }
                    self.prec = PREC_CMP;
                    self.token = Token::Op;
                }

                Some('=') => {
                    self.source.nextch();
                    if self.source.ch == Some('=') {
                        self.source.nextch();
                        self.op = Operator::Eql;
                        self.prec = PREC_CMP;
                        self.token = Token::Op;
                    } else {
                        self.token = Token::Assign;
                    }
                }

                Some('!') => {
                    self.source.nextch();
                    if self.source.ch == Some('=') {
                        self.source.nextch();
                        self.op = Operator::Neq;
                        self.prec = PREC_CMP;
                        self.token = Token::Op;
                    } else {
                        self.op = Operator::Not;
                        self.prec = 0;
                        self.token = Token::Op;
                    }
                }

                Some(c) => {
                    self.errorf(&format!("invalid character {}", format_rune(c)));
                    self.source.nextch();
                    continue;
                }
            }

            return;
        }
    }

    fn assignop(&mut self) {
        if self.source.ch == Some('=') {
            self.source.nextch();
            self.token = Token::AssignOp;
        } else {
            self.token = Token::Op;
        }
    }

    // =========================================================================
    // Identifiers and keywords
    // =========================================================================

    fn ident(&mut self) {
        // accelerate common case (7bit ASCII)
        while let Some(c) = self.source.ch {
            if is_letter(c) || is_decimal(c) {
                self.source.nextch();
            } else {
                break;
            }
        }

        // general case
        if matches!(self.source.ch, Some(c) if !c.is_ascii()) {
            while self.at_ident_char(false) {
                self.source.nextch();
            }
        }

        // possibly a keyword
        let lit = self.segment_string();
        self.token = Token::keyword_or_name(&lit);
        self.nlsemi = contains(NLSEMI_KEYWORDS, self.token);
        self.lit = lit;
    }

    fn at_ident_char(&mut self, first: bool) -> bool {
        let Some(c) = self.source.ch else {
            return false;
        };
        if c == '_' || is_xid_start(c) {
            return true;
        }
        if c.is_numeric() {
            if first {
                self.errorf(&format!(
                    "identifier cannot begin with digit {}",
                    format_rune(c)
                ));
            }
            return true;
        }
        if !c.is_ascii() {
            if !is_xid_continue(c) {
                self.errorf(&format!("invalid character {} in identifier", format_rune(c)));
            }
            return true;
        }
        false
    }

    // =========================================================================
    // Numbers
    // =========================================================================

    // digits accepts the sequence { digit | '_' }, reporting presence of
    // digits in bit 0 and separators in bit 1 of the result. For base <= 10,
    // the byte index (relative to the literal start) of the first digit >=
    // base is recorded in *invalid if it is still negative.
    fn digits(&mut self, base: u32, mut invalid: Option<&mut i32>) -> u8 {
        let mut digsep = 0u8;
        if base <= 10 {
            let max = (b'0' + base as u8) as char;
            while let Some(c) = self.source.ch {
                if !(is_decimal(c) || c == '_') {
                    break;
                }
                let mut ds = 1;
                if c == '_' {
                    ds = 2;
                } else if c >= max {
                    if let Some(inv) = &mut invalid {
                        if **inv < 0 {
                            let (_, col) = self.source.pos();
                            **inv = (col - self.col) as i32; // record invalid rune index
                        }
                    }
                }
                digsep |= ds;
                self.source.nextch();
            }
        } else {
            while let Some(c) = self.source.ch {
                if !(is_hex(c) || c == '_') {
                    break;
                }
                let mut ds = 1;
                if c == '_' {
                    ds = 2;
                }
                digsep |= ds;
                self.source.nextch();
            }
        }
        digsep
    }

    fn number(&mut self, mut seen_point: bool) {
        let mut ok = true;
        let mut kind = LitKind::Int;
        let mut base: u32 = 10;
        let mut prefix = '\0'; // one of '\0' (decimal), '0' (0-octal), 'x', 'o', or 'b'
        let mut digsep = 0u8; // bit 0: digit present, bit 1: '_' present
        let mut invalid = -1i32; // index of invalid digit in literal, or < 0

        // integer part
        if !seen_point {
            if self.source.ch == Some('0') {
                self.source.nextch();
                match self.source.ch.map(lower) {
                    Some('x') => {
                        self.source.nextch();
                        base = 16;
                        prefix = 'x';
                    }
                    Some('o') => {
                        self.source.nextch();
                        base = 8;
                        prefix = 'o';
                    }
                    Some('b') => {
                        self.source.nextch();
                        base = 2;
                        prefix = 'b';
                    }
                    _ => {
                        base = 8;
                        prefix = '0';
                        digsep = 1; // leading 0
                    }
                }
            }
            digsep |= self.digits(base, Some(&mut invalid));
            if self.source.ch == Some('.') {
                if prefix == 'o' || prefix == 'b' {
                    self.errorf(&format!("invalid radix point in {} literal", base_name(base)));
                    ok = false;
                }
                self.source.nextch();
                seen_point = true;
            }
        }

        // fractional part
        if seen_point {
            kind = LitKind::Float;
            digsep |= self.digits(base, Some(&mut invalid));
        }

        if digsep & 1 == 0 && ok {
            self.errorf(&format!("{} literal has no digits", base_name(base)));
            ok = false;
        }

        // exponent
        if let Some(ch) = self.source.ch.filter(|&c| matches!(lower(c), 'e' | 'p')) {
            let e = lower(ch);
            if ok {
                if e == 'e' && prefix != '\0' && prefix != '0' {
                    self.errorf(&format!("{:?} exponent requires decimal mantissa", ch));
                    ok = false;
                } else if e == 'p' && prefix != 'x' {
                    self.errorf(&format!("{:?} exponent requires hexadecimal mantissa", ch));
                    ok = false;
                }
            }
            self.source.nextch();
            kind = LitKind::Float;
            if self.source.ch == Some('+') || self.source.ch == Some('-') {
                self.source.nextch();
            }
            digsep = self.digits(10, None) | (digsep & 2); // don't lose sep bit
            if digsep & 1 == 0 && ok {
                self.errorf("exponent has no digits");
                ok = false;
            }
        } else if prefix == 'x' && kind == LitKind::Float && ok {
            self.errorf("hexadecimal mantissa requires a 'p' exponent");
            ok = false;
        }

        // suffix 'i'
        if self.source.ch == Some('i') {
            kind = LitKind::Imag;
            self.source.nextch();
        }

        self.set_lit(kind, ok); // do this now so we can use self.lit below

        if kind == LitKind::Int && invalid >= 0 && ok {
            let idx = invalid as usize;
            let d = self.lit.as_bytes()[idx] as char;
            self.error_atf(
                invalid as u32,
                &format!("invalid digit {:?} in {} literal", d, base_name(base)),
            );
            ok = false;
        }

        if digsep & 2 != 0 && ok {
            if let Some(i) = invalid_sep(&self.lit) {
                self.error_atf(i as u32, "'_' must separate successive digits");
                ok = false;
            }
        }

        self.bad = !ok; // correct self.bad
    }

    // =========================================================================
    // Strings and runes
    // =========================================================================

    fn rune_lit(&mut self) {
        let mut ok = true;
        self.source.nextch();

        let mut n = 0;
        loop {
            if self.source.ch == Some('\'') {
                if ok {
                    if n == 0 {
                        self.errorf("empty rune literal or unescaped '");
                        ok = false;
                    } else if n != 1 {
                        self.error_atf(0, "more than one character in rune literal");
                        ok = false;
                    }
                }
                self.source.nextch();
                break;
            }
            if self.source.ch == Some('\\') {
                self.source.nextch();
                if !self.escape('\'') {
                    ok = false;
                }
                n += 1;
                continue;
            }
            if self.source.ch == Some('\n') {
                if ok {
                    self.errorf("newline in rune literal");
                    ok = false;
                }
                break;
            }
            if self.source.ch.is_none() {
                if ok {
                    self.error_atf(0, "rune literal not terminated");
                    ok = false;
                }
                break;
            }
            self.source.nextch();
            n += 1;
        }

        self.set_lit(LitKind::Rune, ok);
    }

    fn std_string(&mut self) {
        let mut ok = true;
        self.source.nextch();

        loop {
            if self.source.ch == Some('"') {
                self.source.nextch();
                break;
            }
            if self.source.ch == Some('\\') {
                self.source.nextch();
                if !self.escape('"') {
                    ok = false;
                }
                continue;
            }
            if self.source.ch == Some('\n') {
                self.errorf("newline in string");
                ok = false;
                break;
            }
            if self.source.ch.is_none() {
                self.error_atf(0, "string not terminated");
                ok = false;
                break;
            }
            self.source.nextch();
        }

        self.set_lit(LitKind::String, ok);
    }

    fn raw_string(&mut self) {
        let mut ok = true;
        self.source.nextch();

        loop {
            if self.source.ch == Some('`') {
                self.source.nextch();
                break;
            }
            if self.source.ch.is_none() {
                self.error_atf(0, "string not terminated");
                ok = false;
                break;
            }
            self.source.nextch();
        }
        // We leave CRs in the string since they are part of the literal
        // (even though they are not part of the literal value).

        self.set_lit(LitKind::String, ok);
    }

    // The escape forms accepted depend on the literal being scanned: only
    // the enclosing quote is a valid simple escape.
    fn escape(&mut self, quote: char) -> bool {
        let n;
        let base: u32;
        let max: u32;

        match self.source.ch {
            Some(c) if c == quote => {
                self.source.nextch();
                return true;
            }
            Some('a' | 'b' | 'f' | 'n' | 'r' | 't' | 'v' | '\\') => {
                self.source.nextch();
                return true;
            }
            Some('0'..='7') => {
                n = 3;
                base = 8;
                max = 255;
            }
            Some('x') => {
                self.source.nextch();
                n = 2;
                base = 16;
                max = 255;
            }
            Some('u') => {
                self.source.nextch();
                n = 4;
                base = 16;
                max = 0x10FFFF;
            }
            Some('U') => {
                self.source.nextch();
                n = 8;
                base = 16;
                max = 0x10FFFF;
            }
            Some(_) => {
                self.errorf("unknown escape");
                return false;
            }
            None => return true, // complain in caller about EOF
        }

        let mut x: u32 = 0;
        for _ in 0..n {
            let Some(c) = self.source.ch else {
                return true; // complain in caller about EOF
            };
            let mut d = base;
            if is_decimal(c) {
                d = c as u32 - '0' as u32;
            } else if ('a'..='f').contains(&lower(c)) {
                d = lower(c) as u32 - 'a' as u32 + 10;
            }
            if d >= base {
                self.errorf(&format!(
                    "invalid character {:?} in {} escape",
                    c,
                    base_name(base)
                ));
                return false;
            }
            // d < base
            x = x * base + d;
            self.source.nextch();
        }

        if x > max && base == 8 {
            self.errorf(&format!("octal escape value {x} > 255"));
            return false;
        }

        if x > max || (0xD800..0xE000).contains(&x) {
            self.errorf(&format!(
                "escape is invalid Unicode code point {}",
                format_codepoint(x)
            ));
            return false;
        }

        true
    }

    // =========================================================================
    // Comments and directives
    // =========================================================================

    fn comment(&mut self, text: &str) {
        self.error_atf(0, text);
    }

    fn skip_line(&mut self) {
        // don't consume '\n' - needed for nlsemi logic
        while let Some(c) = self.source.ch {
            if c == '\n' {
                break;
            }
            self.source.nextch();
        }
    }

    fn line_comment(&mut self) {
        // opening has already been consumed

        if self.mode & COMMENTS != 0 {
            self.skip_line();
            let text = self.segment_string();
            self.comment(&text);
            return;
        }

        // are we saving directives? or is this definitely not a directive?
        if self.mode & DIRECTIVES == 0 || self.source.ch != Some('l') {
            self.source.stop();
            self.skip_line();
            return;
        }

        // recognize line directive
        for m in "line ".chars() {
            if self.source.ch != Some(m) {
                self.source.stop();
                self.skip_line();
                return;
            }
            self.source.nextch();
        }

        // directive text
        self.skip_line();
        let text = self.segment_string();
        self.comment(&text);
    }

    fn skip_comment(&mut self) -> bool {
        while self.source.ch.is_some() {
            while self.source.ch == Some('*') {
                self.source.nextch();
                if self.source.ch == Some('/') {
                    self.source.nextch();
                    return true;
                }
            }
            self.source.nextch();
        }
        self.error_atf(0, "comment not terminated");
        false
    }

    fn full_comment(&mut self) {
        /* opening has already been consumed */

        if self.mode & COMMENTS != 0 {
            if self.skip_comment() {
                let text = self.segment_string();
                self.comment(&text);
            }
            return;
        }

        if self.mode & DIRECTIVES == 0 || self.source.ch != Some('l') {
            self.source.stop();
            self.skip_comment();
            return;
        }

        // recognize line directive
        for m in "line ".chars() {
            if self.source.ch != Some(m) {
                self.source.stop();
                self.skip_comment();
                return;
            }
            self.source.nextch();
        }

        // directive text
        if self.skip_comment() {
            let text = self.segment_string();
            self.comment(&text);
        }
    }
}

// =============================================================================
// Character classes
// =============================================================================

// returns lower-case c iff c is an ASCII letter
fn lower(c: char) -> char {
    if c.is_ascii_uppercase() {
        (c as u8 + 32) as char
    } else {
        c
    }
}

fn is_letter(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_uppercase() || c == '_'
}

fn is_decimal(c: char) -> bool {
    c.is_ascii_digit()
}

fn is_hex(c: char) -> bool {
    c.is_ascii_digit() || ('a'..='f').contains(&lower(c))
}

fn base_name(base: u32) -> &'static str {
    match base {
        2 => "binary",
        8 => "octal",
        10 => "decimal",
        16 => "hexadecimal",
        _ => unreachable!("invalid base"),
    }
}

// invalid_sep returns the byte index of the first invalid separator in x.
fn invalid_sep(x: &str) -> Option<usize> {
    let x = x.as_bytes();
    let mut x1 = ' '; // prefix char, we only care if it's 'x'
    let mut d = '.'; // digit, one of '_', '0' (a digit), or '.' (anything else)
    let mut i = 0usize;

    // a prefix counts as a digit
    if x.len() >= 2 && x[0] == b'0' {
        x1 = lower(x[1] as char);
        if x1 == 'x' || x1 == 'o' || x1 == 'b' {
            d = '0';
            i = 2;
        }
    }

    // mantissa and exponent
    while i < x.len() {
        let p = d; // previous digit
        d = x[i] as char;
        if d == '_' {
            if p != '0' {
                return Some(i);
            }
        } else if is_decimal(d) || (x1 == 'x' && is_hex(d)) {
            d = '0';
        } else {
            if p == '_' {
                return Some(i - 1);
            }
            d = '.';
        }
        i += 1;
    }
    if d == '_' {
        return Some(x.len() - 1);
    }

    None
}

fn format_rune(c: char) -> String {
    format!("U+{:04X} {:?}", c as u32, c)
}

fn format_codepoint(x: u32) -> String {
    match char::from_u32(x) {
        Some(c) => format_rune(c),
        None => format!("U+{x:04X}"),
    }
}
