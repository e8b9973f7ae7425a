use std::fmt;

use crate::syntax::ParseError;

/// Lexical elements of a BUSY file: identifiers, integers, reals,
/// strings, backtick symbols, slash-separated paths, punctuation.
/// `#` starts a line comment, `/* */` a nestable block comment.
#[derive(Clone, PartialEq, Debug)]
pub enum Token {
    Ident(String),
    Int(i64),
    Real(f64),
    Str(String),
    Symbol(String),
    Path(String),
    LBrace,
    RBrace,
    Colon,
    Semi,
    Bang,
    Dot,
    Eq,
    PlusEq,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "`{}`", s),
            Token::Int(i) => write!(f, "`{}`", i),
            Token::Real(r) => write!(f, "`{}`", r),
            Token::Str(_) => write!(f, "string"),
            Token::Symbol(s) => write!(f, "``{}`", s),
            Token::Path(p) => write!(f, "`{}`", p),
            Token::LBrace => write!(f, "`{{`"),
            Token::RBrace => write!(f, "`}}`"),
            Token::Colon => write!(f, "`:`"),
            Token::Semi => write!(f, "`;`"),
            Token::Bang => write!(f, "`!`"),
            Token::Dot => write!(f, "`.`"),
            Token::Eq => write!(f, "`=`"),
            Token::PlusEq => write!(f, "`+=`"),
        }
    }
}

/// A token plus its 1-based source position.
#[derive(Clone, Debug)]
pub struct Spanned {
    pub token: Token,
    pub row: u32,
    pub col: u32,
}

struct Cursor<'a> {
    rest: std::str::Chars<'a>,
    row: u32,
    col: u32,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Cursor<'a> {
        Cursor {
            rest: input.chars(),
            row: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.rest.clone().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut it = self.rest.clone();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.rest.next()?;
        if c == '\n' {
            self.row += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_path_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, ';' | '{' | '}' | '"' | '`' | '#' | '=' | '!')
}

/// Tokenize a whole BUSY file. Stops at the first lexical error.
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut cur = Cursor::new(input);
    let mut out = Vec::new();

    loop {
        // Skip whitespace and comments.
        loop {
            match cur.peek() {
                Some(c) if c.is_whitespace() => {
                    cur.bump();
                }
                Some('#') => {
                    while let Some(c) = cur.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if cur.peek2() == Some('*') => {
                    let (row, col) = (cur.row, cur.col);
                    cur.bump();
                    cur.bump();
                    let mut depth = 1usize;
                    loop {
                        match (cur.peek(), cur.peek2()) {
                            (Some('/'), Some('*')) => {
                                cur.bump();
                                cur.bump();
                                depth += 1;
                            }
                            (Some('*'), Some('/')) => {
                                cur.bump();
                                cur.bump();
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            (Some(_), _) => {
                                cur.bump();
                            }
                            (None, _) => {
                                return Err(ParseError::new(
                                    "unterminated block comment",
                                    row,
                                    col,
                                ));
                            }
                        }
                    }
                }
                _ => break,
            }
        }

        let (row, col) = (cur.row, cur.col);
        let c = match cur.peek() {
            Some(c) => c,
            None => break,
        };

        let token = match c {
            '{' => {
                cur.bump();
                Token::LBrace
            }
            '}' => {
                cur.bump();
                Token::RBrace
            }
            ':' => {
                cur.bump();
                Token::Colon
            }
            ';' => {
                cur.bump();
                Token::Semi
            }
            '!' => {
                cur.bump();
                Token::Bang
            }
            '=' => {
                cur.bump();
                Token::Eq
            }
            '+' if cur.peek2() == Some('=') => {
                cur.bump();
                cur.bump();
                Token::PlusEq
            }
            '`' => {
                cur.bump();
                let mut name = String::new();
                while let Some(c) = cur.peek() {
                    if is_ident_char(c) {
                        name.push(c);
                        cur.bump();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(ParseError::new("expected identifier after '`'", row, col));
                }
                Token::Symbol(name)
            }
            '"' => {
                cur.bump();
                let mut s = String::new();
                loop {
                    match cur.bump() {
                        Some('"') => break,
                        Some('\\') => match cur.bump() {
                            Some('"') => s.push('"'),
                            Some('\\') => s.push('\\'),
                            Some(other) => {
                                s.push('\\');
                                s.push(other);
                            }
                            None => {
                                return Err(ParseError::new("unterminated string", row, col));
                            }
                        },
                        Some('\n') | None => {
                            return Err(ParseError::new("unterminated string", row, col));
                        }
                        Some(other) => s.push(other),
                    }
                }
                Token::Str(s)
            }
            '.' => {
                // `.` introduces a field unless it spells a relative
                // path (`./x`, `../x`).
                if cur.peek2() == Some('/')
                    || (cur.peek2() == Some('.') && {
                        let mut it = cur.rest.clone();
                        it.next();
                        it.next();
                        it.next() == Some('/')
                    })
                {
                    Token::Path(lex_path(&mut cur))
                } else {
                    cur.bump();
                    Token::Dot
                }
            }
            '/' => Token::Path(lex_path(&mut cur)),
            c if c.is_ascii_digit() => lex_number(&mut cur)?,
            c if is_ident_start(c) => {
                let mut word = String::new();
                while let Some(c) = cur.peek() {
                    if is_ident_char(c) {
                        word.push(c);
                        cur.bump();
                    } else {
                        break;
                    }
                }
                // An identifier immediately followed by `/` continues
                // as a path (`src/main.cpp`); `/*` starts a comment.
                if cur.peek() == Some('/') && cur.peek2() != Some('*') {
                    word.push_str(&lex_path(&mut cur));
                    Token::Path(word)
                } else {
                    Token::Ident(word)
                }
            }
            other => {
                return Err(ParseError::new(
                    format!("unexpected character `{}`", other),
                    row,
                    col,
                ));
            }
        };
        out.push(Spanned { token, row, col });
    }

    Ok(out)
}

fn lex_path(cur: &mut Cursor<'_>) -> String {
    let mut path = String::new();
    while let Some(c) = cur.peek() {
        if c == '/' && cur.peek2() == Some('*') {
            break;
        }
        if is_path_char(c) {
            path.push(c);
            cur.bump();
        } else {
            break;
        }
    }
    path
}

fn lex_number(cur: &mut Cursor<'_>) -> Result<Token, ParseError> {
    let (row, col) = (cur.row, cur.col);
    let mut text = String::new();
    while let Some(c) = cur.peek() {
        if c.is_ascii_digit() {
            text.push(c);
            cur.bump();
        } else {
            break;
        }
    }
    let mut is_real = false;
    if cur.peek() == Some('.') && cur.peek2().map(|c| c.is_ascii_digit()).unwrap_or(false) {
        is_real = true;
        text.push('.');
        cur.bump();
        while let Some(c) = cur.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                cur.bump();
            } else {
                break;
            }
        }
    }
    // Digit-led words like `3rdparty/x` are paths, not numbers.
    if cur.peek() == Some('/') && cur.peek2() != Some('*') {
        text.push_str(&lex_path(cur));
        return Ok(Token::Path(text));
    }
    if is_real {
        text.parse::<f64>()
            .map(Token::Real)
            .map_err(|_| ParseError::new(format!("malformed real `{}`", text), row, col))
    } else {
        text.parse::<i64>()
            .map(Token::Int)
            .map_err(|_| ParseError::new(format!("malformed integer `{}`", text), row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn lexes_a_product_declaration() {
        let t = toks("let hello ! : Executable { .sources += ./main.cpp }");
        assert_eq!(
            t,
            vec![
                Token::Ident("let".into()),
                Token::Ident("hello".into()),
                Token::Bang,
                Token::Colon,
                Token::Ident("Executable".into()),
                Token::LBrace,
                Token::Dot,
                Token::Ident("sources".into()),
                Token::PlusEq,
                Token::Path("./main.cpp".into()),
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn paths_come_in_all_forms() {
        assert_eq!(toks("./a"), vec![Token::Path("./a".into())]);
        assert_eq!(toks("../a/b.h"), vec![Token::Path("../a/b.h".into())]);
        assert_eq!(toks("/abs/x"), vec![Token::Path("/abs/x".into())]);
        assert_eq!(toks("src/main.cpp"), vec![Token::Path("src/main.cpp".into())]);
        assert_eq!(toks("3rdparty/z.c"), vec![Token::Path("3rdparty/z.c".into())]);
    }

    #[test]
    fn dotted_idents_stay_tokens() {
        assert_eq!(
            toks("sub.lib"),
            vec![
                Token::Ident("sub".into()),
                Token::Dot,
                Token::Ident("lib".into()),
            ]
        );
    }

    #[test]
    fn numbers_strings_symbols() {
        assert_eq!(
            toks("42 2.5 \"a \\\"b\\\"\" `win32"),
            vec![
                Token::Int(42),
                Token::Real(2.5),
                Token::Str("a \"b\"".into()),
                Token::Symbol("win32".into()),
            ]
        );
    }

    #[test]
    fn comments_nest() {
        assert_eq!(
            toks("a # line\n/* one /* two */ still */ b"),
            vec![Token::Ident("a".into()), Token::Ident("b".into())]
        );
        assert!(tokenize("/* open").is_err());
    }

    #[test]
    fn positions_are_one_based() {
        let t = tokenize("let x\nlet y").unwrap();
        assert_eq!((t[0].row, t[0].col), (1, 1));
        assert_eq!((t[2].row, t[2].col), (2, 1));
        assert_eq!((t[3].row, t[3].col), (2, 5));
    }
}
