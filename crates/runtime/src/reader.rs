//! Minimal scanner and recursive-descent reader: turns Joy source text
//! into an executable factor chain plus symbol-table definitions.
//! Grounded in `examples/original_source/src/scan.c` (token set) and
//! `examples/original_source/src/factor.c` (`DEFINE`/`LIBRA` handling),
//! trimmed to the scanner → runtime contract `spec.md` §6 describes —
//! not a reimplementation of the reference scanner's include-file stack,
//! interpolated strings, or shell-escape execution.

use std::iter::Peekable;
use std::str::Chars;
use std::sync::Arc;

use joy_core::{strings, Context, Index, JoyError, JoyResult, Payload, Tag, NULL};

use crate::dispatch::PrimTable;

/// One top-level phrase read to its terminating `.`: the residual term
/// to execute. Definitions encountered along the way are installed into
/// `ctx.symtab` as a side effect and do not appear here.
pub struct ReadOutcome {
    pub program: Index,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Integer(i64),
    Float(f64),
    Char(char),
    Str(String),
    Bool(bool),
    Ident(String),
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Semicolon,
    EqDef,
    Keyword(Keyword),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Keyword {
    Define,
    Hide,
    In,
    End,
    Module,
    Private,
    Public,
    Const,
    Inline,
}

fn keyword_from(word: &str) -> Option<Keyword> {
    match word {
        "DEFINE" | "LIBRA" => Some(Keyword::Define),
        "HIDE" => Some(Keyword::Hide),
        "IN" => Some(Keyword::In),
        "END" => Some(Keyword::End),
        "MODULE" => Some(Keyword::Module),
        "PRIVATE" => Some(Keyword::Private),
        "PUBLIC" => Some(Keyword::Public),
        "CONST" => Some(Keyword::Const),
        "INLINE" => Some(Keyword::Inline),
        _ => None,
    }
}

/// Incremental reader over one source buffer. The REPL keeps one
/// `Reader` per input line/file and calls [`Reader::next_phrase`] once
/// per `.`-terminated phrase; loading a definition file drains it.
pub struct Reader<'a> {
    chars: Peekable<Chars<'a>>,
    line: u32,
    column: u32,
    pending: Option<Token>,
}

impl<'a> Reader<'a> {
    pub fn new(source: &'a str) -> Self {
        Reader {
            chars: source.chars().peekable(),
            line: 1,
            column: 0,
            pending: None,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next();
        match c {
            Some('\n') => {
                self.line += 1;
                self.column = 0;
            }
            Some(_) => self.column += 1,
            None => {}
        }
        c
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn err(&self, message: impl Into<Arc<str>>) -> JoyError {
        JoyError::syntax(message).at(self.line, self.column)
    }

    fn skip_trivia(&mut self) -> JoyResult<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('$') if self.column == 0 => {
                    // Shell-escape line: not executed here (no host
                    // allow-list at this layer); skip to end of line.
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('(') => {
                    let mut lookahead = self.chars.clone();
                    if lookahead.next() == Some('(') && lookahead.next() == Some('*') {
                        self.bump();
                        self.bump();
                        self.skip_block_comment()?;
                        continue;
                    }
                    return Ok(());
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> JoyResult<()> {
        let mut depth = 1;
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated block comment")),
                Some('(') if self.peek() == Some('*') => {
                    self.bump();
                    depth += 1;
                }
                Some('*') if self.peek() == Some(')') => {
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(_) => {}
            }
        }
    }

    fn next_token(&mut self) -> JoyResult<Token> {
        if let Some(tok) = self.pending.take() {
            return Ok(tok);
        }
        self.skip_trivia()?;
        let c = match self.peek() {
            None => return Ok(Token::Eof),
            Some(c) => c,
        };
        match c {
            '[' => {
                self.bump();
                Ok(Token::LBracket)
            }
            ']' => {
                self.bump();
                Ok(Token::RBracket)
            }
            '{' => {
                self.bump();
                Ok(Token::LBrace)
            }
            '}' => {
                self.bump();
                Ok(Token::RBrace)
            }
            ';' => {
                self.bump();
                Ok(Token::Semicolon)
            }
            '.' => {
                self.bump();
                Ok(Token::Dot)
            }
            '=' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::EqDef)
                } else {
                    Err(self.err("expected '==' after '='"))
                }
            }
            '"' => self.scan_string(),
            '\'' => self.scan_char(),
            '-' | '0'..='9' => self.scan_number(),
            _ if c.is_alphabetic() || "+*/%<>=!~&|^".contains(c) || c == '_' => self.scan_ident(),
            other => Err(self.err(format!("unexpected character '{other}'"))),
        }
    }

    fn push_back(&mut self, tok: Token) {
        self.pending = Some(tok);
    }

    fn scan_string(&mut self) -> JoyResult<Token> {
        self.bump(); // opening quote
        let mut raw = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated string")),
                Some('"') => break,
                Some('\\') => {
                    raw.push('\\');
                    match self.bump() {
                        Some(c) => raw.push(c),
                        None => return Err(self.err("unterminated string")),
                    }
                }
                Some(c) => raw.push(c),
            }
        }
        let decoded = strings::unescape(&raw).map_err(|e| self.err(e))?;
        Ok(Token::Str(decoded.to_string()))
    }

    fn scan_char(&mut self) -> JoyResult<Token> {
        self.bump(); // opening quote
        let c = match self.bump() {
            None => return Err(self.err("unterminated character literal")),
            Some('\\') => match self.bump() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('\\') => '\\',
                Some('\'') => '\'',
                Some('0') => '\0',
                Some(other) => return Err(self.err(format!("unknown escape '\\{other}'"))),
                None => return Err(self.err("unterminated character literal")),
            },
            Some(c) => c,
        };
        Ok(Token::Char(c))
    }

    fn scan_number(&mut self) -> JoyResult<Token> {
        let mut text = String::new();
        if self.peek() == Some('-') {
            text.push(self.bump().unwrap());
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(self.bump().unwrap());
            } else if c == '.' && !is_float {
                let mut lookahead = self.chars.clone();
                lookahead.next();
                if matches!(lookahead.next(), Some(d) if d.is_ascii_digit()) {
                    is_float = true;
                    text.push(self.bump().unwrap());
                } else {
                    break;
                }
            } else if (c == 'e' || c == 'E') && !text.is_empty() {
                is_float = true;
                text.push(self.bump().unwrap());
                if matches!(self.peek(), Some('+') | Some('-')) {
                    text.push(self.bump().unwrap());
                }
            } else {
                break;
            }
        }
        if is_float {
            text.parse::<f64>().map(Token::Float).map_err(|_| self.err("invalid float literal"))
        } else {
            text.parse::<i64>().map(Token::Integer).map_err(|_| self.err("invalid integer literal"))
        }
    }

    fn scan_ident(&mut self) -> JoyResult<Token> {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || "+*/%<>=!~&|^_.".contains(c) {
                // `==` is its own token; don't let a bare ident swallow it.
                if c == '=' {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.next() == Some('=') && text.is_empty() {
                        break;
                    }
                }
                text.push(self.bump().unwrap());
            } else {
                break;
            }
        }
        if text.is_empty() {
            return Err(self.err("expected an identifier"));
        }
        match text.as_str() {
            "true" => Ok(Token::Bool(true)),
            "false" => Ok(Token::Bool(false)),
            _ => match keyword_from(&text) {
                Some(kw) => Ok(Token::Keyword(kw)),
                None => Ok(Token::Ident(text)),
            },
        }
    }

    /// Read one `.`-terminated top-level phrase: zero or more
    /// definitions interleaved with terms, in source order. Returns
    /// `None` once the buffer is exhausted with nothing left to read.
    pub fn next_phrase(&mut self, ctx: &mut Context, prims: &PrimTable) -> JoyResult<Option<ReadOutcome>> {
        let (items, reached_eof) = self.read_top_level_items(ctx, prims)?;
        if items.is_empty() && reached_eof {
            return Ok(None);
        }
        let head = self.link(ctx, items)?;
        Ok(Some(ReadOutcome { program: head }))
    }

    /// Best-effort RETRY recovery (`spec.md` §7): discard input up to
    /// and including the next `.`, so a syntax error in one phrase
    /// does not leave the scanner stuck mid-token for the next one.
    /// Character-level rather than token-level on purpose — a
    /// malformed token is exactly the case where tokenizing further
    /// input isn't reliable.
    pub fn recover_to_next_dot(&mut self) {
        self.pending = None;
        loop {
            match self.bump() {
                None => return,
                Some('.') => return,
                Some(_) => {}
            }
        }
    }

    /// Like [`Reader::read_items`] at the top level, but also reports
    /// whether the phrase ended because the buffer ran out rather than
    /// because a `.` was found — the two need to be told apart only here.
    fn read_top_level_items(&mut self, ctx: &mut Context, prims: &PrimTable) -> JoyResult<(Vec<(Tag, Payload)>, bool)> {
        let mut items = Vec::new();
        loop {
            let tok = self.next_token()?;
            match tok {
                Token::Eof => return Ok((items, true)),
                Token::Dot => return Ok((items, false)),
                other => self.read_one_item(ctx, prims, other, &mut items)?,
            }
        }
    }

    fn link(&self, ctx: &mut Context, items: Vec<(Tag, Payload)>) -> JoyResult<Index> {
        let mut next = NULL;
        for (tag, payload) in items.into_iter().rev() {
            next = ctx.new_node(tag, payload, next)?;
        }
        Ok(next)
    }

    /// Read the contents of a `[ ... ]` quotation, the opening bracket
    /// already consumed. Definitions and module/hide forms are only
    /// legal at the top level, so any such keyword seen here falls
    /// through to [`Reader::token_to_factor`] and is rejected there.
    fn read_items(&mut self, ctx: &mut Context, prims: &PrimTable) -> JoyResult<Vec<(Tag, Payload)>> {
        let mut items = Vec::new();
        loop {
            let tok = self.next_token()?;
            match tok {
                Token::Eof => return Err(self.err("unterminated quotation")),
                Token::RBracket => return Ok(items),
                other => self.read_one_item(ctx, prims, other, &mut items)?,
            }
        }
    }

    /// Dispatch one already-fetched, non-terminator token into `items`.
    /// Shared by top-level phrase reading and quotation contents. A
    /// `DEFINE`/`MODULE`/`HIDE` keyword reached from inside a quotation
    /// is a reader bug in the caller, not a case this function guards —
    /// the grammar only produces such tokens at the top level.
    fn read_one_item(
        &mut self,
        ctx: &mut Context,
        prims: &PrimTable,
        tok: Token,
        items: &mut Vec<(Tag, Payload)>,
    ) -> JoyResult<()> {
        match tok {
            Token::LBracket => {
                let inner = self.read_items(ctx, prims)?;
                let head = self.link(ctx, inner)?;
                items.push((Tag::List, Payload::List(head)));
            }
            Token::LBrace => {
                let bits = self.read_set()?;
                items.push((Tag::Set, Payload::Set(bits)));
            }
            Token::RBrace => return Err(self.err("unmatched '}'")),
            Token::RBracket => return Err(self.err("unmatched ']'")),
            Token::Keyword(Keyword::Define) => {
                self.read_definitions(ctx, prims)?;
            }
            Token::Keyword(Keyword::Module) => {
                let name = self.expect_ident()?;
                ctx.symtab.enter_module(Arc::from(name.as_str()));
            }
            Token::Keyword(Keyword::End) => {
                ctx.symtab.exit_module();
            }
            Token::Keyword(Keyword::Hide) => {
                ctx.symtab.enter_hide();
            }
            Token::Keyword(Keyword::In) => {
                ctx.symtab.exit_hide();
            }
            Token::Keyword(Keyword::Private) => {
                // `getsym`'s `initpriv`: PRIVATE opens a hide-like block
                // identical to HIDE, closed by IN or PUBLIC.
                ctx.symtab.enter_private();
            }
            Token::Keyword(Keyword::Public) => {
                // `getsym`'s `stoppriv` fires from both IN__ and PUBLIC.
                ctx.symtab.exit_hide();
            }
            Token::Keyword(Keyword::Const) | Token::Keyword(Keyword::Inline) => {
                // Compile-pass hints only; `spec.md` §6 says they "do
                // not change evaluator behavior".
            }
            other => {
                let (tag, payload) = self.token_to_factor(ctx, prims, other)?;
                items.push((tag, payload));
            }
        }
        Ok(())
    }

    fn read_set(&mut self) -> JoyResult<u64> {
        let mut bits: u64 = 0;
        loop {
            match self.next_token()? {
                Token::RBrace => return Ok(bits),
                Token::Integer(n) if (0..64).contains(&n) => bits |= 1u64 << n,
                Token::Integer(_) => return Err(self.err("set member out of range 0..63")),
                Token::Eof => return Err(self.err("unterminated set literal")),
                _ => return Err(self.err("expected a small integer inside a set literal")),
            }
        }
    }

    fn expect_ident(&mut self) -> JoyResult<String> {
        match self.next_token()? {
            Token::Ident(name) => Ok(name),
            _ => Err(self.err("expected an identifier")),
        }
    }

    /// `DEFINE` has already been consumed. Reads one or more
    /// `name == body ;` clauses until a token that doesn't start a new
    /// clause, which is pushed back for the enclosing loop.
    fn read_definitions(&mut self, ctx: &mut Context, prims: &PrimTable) -> JoyResult<()> {
        loop {
            let name_tok = self.next_token()?;
            let name = match name_tok {
                Token::Ident(name) => name,
                other => {
                    self.push_back(other);
                    return Ok(());
                }
            };
            match self.next_token()? {
                Token::EqDef => {}
                other => {
                    self.push_back(other);
                    return Err(self.err(format!("expected '==' after definition name '{name}'")));
                }
            }
            let body_items = self.read_body_until_semicolon(ctx, prims)?;
            let head = self.link(ctx, body_items)?;
            ctx.symtab.define_user(&name, head);
        }
    }

    fn read_body_until_semicolon(&mut self, ctx: &mut Context, prims: &PrimTable) -> JoyResult<Vec<(Tag, Payload)>> {
        let mut items = Vec::new();
        loop {
            let tok = self.next_token()?;
            match tok {
                Token::Semicolon => return Ok(items),
                Token::Eof => return Err(self.err("unterminated definition, expected ';'")),
                other => self.read_one_item(ctx, prims, other, &mut items)?,
            }
        }
    }

    fn token_to_factor(&self, ctx: &mut Context, prims: &PrimTable, tok: Token) -> JoyResult<(Tag, Payload)> {
        match tok {
            Token::Integer(n) => Ok((Tag::Integer, Payload::Int(n))),
            Token::Float(f) => Ok((Tag::Float, Payload::Float(f))),
            Token::Char(c) => Ok((Tag::Character, Payload::Char(c))),
            Token::Str(s) => Ok((Tag::String, Payload::Str(Arc::from(s.as_str())))),
            Token::Bool(b) => Ok((Tag::Boolean, Payload::Bool(b))),
            Token::Ident(name) => {
                if let Some(id) = prims.id_by_name(&ctx.symtab, &name) {
                    return Ok((Tag::AnonymousFunction, Payload::Prim(id)));
                }
                let sym = match ctx.symtab.lookup(&name) {
                    Some(sym) => sym,
                    None => ctx.symtab.define_user(&name, NULL).0,
                };
                Ok((Tag::UserDefined, Payload::Symbol(sym)))
            }
            other => Err(self.err(format!("unexpected token {other:?}"))),
        }
    }
}

/// Read every phrase in `source` and execute none of them: used to load
/// a definition file (`spec.md` §6 "Definition file format") where only
/// the side effect on `ctx.symtab` matters. Free top-level terms (code
/// outside any `DEFINE`) are returned concatenated in source order for
/// the caller to execute if it wishes.
pub fn read_program(ctx: &mut Context, prims: &PrimTable, source: &str) -> JoyResult<Index> {
    let mut reader = Reader::new(source);
    let mut chains = Vec::new();
    while let Some(outcome) = reader.next_phrase(ctx, prims)? {
        if outcome.program != NULL {
            chains.push(outcome.program);
        }
    }
    let mut head = NULL;
    for chain in chains.into_iter().rev() {
        if head == NULL {
            head = chain;
            continue;
        }
        // Splice chain onto the front of `head` by walking chain to its
        // tail and linking it in; chains don't share structure so this
        // is a one-time O(n) fix-up, never touched again.
        let mut cur = chain;
        loop {
            let next = ctx.heap.node(cur).next;
            if next == NULL {
                ctx.heap.node_mut(cur).next = head;
                break;
            }
            cur = next;
        }
        head = chain;
    }
    Ok(head)
}
