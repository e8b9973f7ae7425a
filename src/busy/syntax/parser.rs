use crate::syntax::ast::{
    AssignOp, ClassDecl, File, LetDecl, RawEntry, RawValue, Stmt, Submod,
};
use crate::syntax::lexer::{tokenize, Spanned, Token};
use crate::syntax::ParseError;

/// Parse one BUSY file. Returns the first syntax failure with its
/// position; the caller records it and carries on with other modules.
pub fn parse_file(input: &str) -> Result<File, ParseError> {
    let tokens = tokenize(input)?;
    Parser { tokens, pos: 0 }.file()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn next(&mut self) -> Option<Spanned> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn here(&self) -> (u32, u32) {
        match self.tokens.get(self.pos) {
            Some(s) => (s.row, s.col),
            None => self
                .tokens
                .last()
                .map(|s| (s.row, s.col))
                .unwrap_or((1, 1)),
        }
    }

    fn error(&self, msg: impl Into<String>) -> ParseError {
        let (row, col) = self.here();
        ParseError::new(msg, row, col)
    }

    fn expect(&mut self, want: &Token) -> Result<Spanned, ParseError> {
        match self.peek() {
            Some(t) if t == want => Ok(self.next().unwrap()),
            Some(t) => Err(self.error(format!("expected {}, found {}", want, t))),
            None => Err(self.error(format!("expected {}, found end of file", want))),
        }
    }

    fn ident(&mut self) -> Result<(String, u32, u32), ParseError> {
        match self.peek() {
            Some(Token::Ident(_)) => {
                let s = self.next().unwrap();
                match s.token {
                    Token::Ident(name) => Ok((name, s.row, s.col)),
                    _ => unreachable!(),
                }
            }
            Some(t) => Err(self.error(format!("expected identifier, found {}", t))),
            None => Err(self.error("expected identifier, found end of file")),
        }
    }

    fn eat(&mut self, want: &Token) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn file(&mut self) -> Result<File, ParseError> {
        let mut stmts = Vec::new();
        while let Some(t) = self.peek() {
            match t {
                Token::Ident(kw) if kw == "submod" => stmts.push(Stmt::Submod(self.submod()?)),
                Token::Ident(kw) if kw == "class" => stmts.push(Stmt::Class(self.class()?)),
                Token::Ident(kw) if kw == "let" => stmts.push(Stmt::Let(self.letdecl()?)),
                Token::Semi => {
                    self.pos += 1;
                }
                other => {
                    return Err(self.error(format!(
                        "expected `submod`, `class` or `let`, found {}",
                        other
                    )));
                }
            }
        }
        Ok(File { stmts })
    }

    fn submod(&mut self) -> Result<Submod, ParseError> {
        let (row, col) = self.here();
        self.pos += 1; // submod
        let (name, ..) = self.ident()?;
        self.expect(&Token::Eq)?;
        let path = match self.next() {
            Some(Spanned {
                token: Token::Path(p),
                ..
            }) => p,
            // `submod util = util`: a bare directory name is fine.
            Some(Spanned {
                token: Token::Ident(p),
                ..
            }) => p,
            _ => return Err(self.error("expected a directory path")),
        };
        self.eat(&Token::Semi);
        Ok(Submod {
            name,
            path,
            row,
            col,
        })
    }

    fn class(&mut self) -> Result<ClassDecl, ParseError> {
        let (row, col) = self.here();
        self.pos += 1; // class
        let (name, ..) = self.ident()?;
        self.expect(&Token::Colon)?;
        let base = self.dotted()?;
        let body = if self.peek() == Some(&Token::LBrace) {
            self.body()?
        } else {
            Vec::new()
        };
        self.eat(&Token::Semi);
        Ok(ClassDecl {
            name,
            base,
            body,
            row,
            col,
        })
    }

    fn letdecl(&mut self) -> Result<LetDecl, ParseError> {
        let (row, col) = self.here();
        self.pos += 1; // let
        let (name, ..) = self.ident()?;
        let exported = self.eat(&Token::Bang);
        self.expect(&Token::Colon)?;
        let ty = self.dotted()?;
        let body = if self.peek() == Some(&Token::LBrace) {
            self.body()?
        } else {
            Vec::new()
        };
        self.eat(&Token::Semi);
        Ok(LetDecl {
            name,
            exported,
            ty,
            body,
            row,
            col,
        })
    }

    fn dotted(&mut self) -> Result<Vec<String>, ParseError> {
        let mut parts = vec![self.ident()?.0];
        while self.eat(&Token::Dot) {
            parts.push(self.ident()?.0);
        }
        Ok(parts)
    }

    fn body(&mut self) -> Result<Vec<RawEntry>, ParseError> {
        self.expect(&Token::LBrace)?;
        let mut entries = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.pos += 1;
                    break;
                }
                Some(Token::Semi) => {
                    self.pos += 1;
                }
                Some(_) => entries.push(self.entry()?),
                None => return Err(self.error("expected `}`, found end of file")),
            }
        }
        Ok(entries)
    }

    fn entry(&mut self) -> Result<RawEntry, ParseError> {
        let (row, col) = self.here();
        let public = match self.peek() {
            Some(Token::Ident(kw)) if kw == "public" => {
                self.pos += 1;
                true
            }
            _ => false,
        };
        self.expect(&Token::Dot)?;
        let (field, ..) = self.ident()?;
        let op = match self.peek() {
            Some(Token::Eq) => AssignOp::Set,
            Some(Token::PlusEq) => AssignOp::Append,
            _ => return Err(self.error("expected `=` or `+=`")),
        };
        self.pos += 1;
        let mut values = vec![self.value()?];
        while self.starts_value() {
            values.push(self.value()?);
        }
        self.eat(&Token::Semi);
        Ok(RawEntry {
            public,
            field,
            op,
            values,
            row,
            col,
        })
    }

    fn starts_value(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Str(_)
                    | Token::Int(_)
                    | Token::Real(_)
                    | Token::Symbol(_)
                    | Token::Path(_)
                    | Token::Ident(_)
            )
        )
    }

    fn value(&mut self) -> Result<RawValue, ParseError> {
        match self.next() {
            Some(Spanned {
                token: Token::Str(s),
                ..
            }) => Ok(RawValue::Str(s)),
            Some(Spanned {
                token: Token::Int(i),
                ..
            }) => Ok(RawValue::Int(i)),
            Some(Spanned {
                token: Token::Real(r),
                ..
            }) => Ok(RawValue::Real(r)),
            Some(Spanned {
                token: Token::Symbol(s),
                ..
            }) => Ok(RawValue::Symbol(s)),
            Some(Spanned {
                token: Token::Path(p),
                ..
            }) => Ok(RawValue::Path(p)),
            Some(Spanned {
                token: Token::Ident(first),
                ..
            }) => match first.as_str() {
                "true" => Ok(RawValue::Bool(true)),
                "false" => Ok(RawValue::Bool(false)),
                _ => {
                    let mut parts = vec![first];
                    while self.eat(&Token::Dot) {
                        parts.push(self.ident()?.0);
                    }
                    Ok(RawValue::Ident(parts))
                }
            },
            _ => Err(self.error("expected a value")),
        }
    }
}
