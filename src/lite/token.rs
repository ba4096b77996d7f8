use crate::{Error, raise_tokenize_error};

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    StringLit(String),
    Identifier(String),
    Plus,
    Minus,
    Multiply,
    /// Exponentiation operator `**`
    Exponent,
    Divide,
    Mod,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Colon,
    Dot,
    Comma,
    Semicolon,
    Let,
    Var,
    Const,
    This,
    New,
    InstanceOf,
    TypeOf,
    In,
    Delete,
    Void,
    Function,
    Return,
    If,
    Else,
    For,
    While,
    Do,
    Break,
    Continue,
    Try,
    Catch,
    Finally,
    Throw,
    True,
    False,
    Null,
    Assign,
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    LessThan,
    GreaterThan,
    LessEqual,
    GreaterEqual,
    Arrow,
    QuestionMark,
    NullishCoalescing,
    LogicalNot,
    LogicalAnd,
    LogicalOr,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    Increment,
    Decrement,
}

impl Token {
    /// Spelling of a token usable as a property name (`obj.delete`, `{ default: 1 }`).
    pub fn as_identifier_string(&self) -> Option<String> {
        let name = match self {
            Token::Identifier(s) => return Some(s.clone()),
            Token::Let => "let",
            Token::Var => "var",
            Token::Const => "const",
            Token::This => "this",
            Token::New => "new",
            Token::InstanceOf => "instanceof",
            Token::TypeOf => "typeof",
            Token::In => "in",
            Token::Delete => "delete",
            Token::Void => "void",
            Token::Function => "function",
            Token::Return => "return",
            Token::If => "if",
            Token::Else => "else",
            Token::For => "for",
            Token::While => "while",
            Token::Do => "do",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Try => "try",
            Token::Catch => "catch",
            Token::Finally => "finally",
            Token::Throw => "throw",
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            _ => return None,
        };
        Some(name.to_string())
    }
}

/// A token with its position. `newline_before` drives automatic semicolon insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenData {
    pub token: Token,
    pub line: usize,
    pub column: usize,
    pub newline_before: bool,
}

pub fn tokenize(source: &str) -> Result<Vec<TokenData>, Error> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut line = 1;
    let mut line_start = 0;
    let mut newline_before = false;

    while i < chars.len() {
        let start = i;
        let token = match chars[i] {
            ' ' | '\t' | '\r' | '\u{feff}' | '\u{a0}' => {
                i += 1;
                continue;
            }
            '\n' => {
                i += 1;
                line += 1;
                line_start = i;
                newline_before = true;
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let comment_line = line;
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return Err(raise_tokenize_error!(comment_line, "unterminated comment"));
                    }
                    if chars[i] == '*' && chars[i + 1] == '/' {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                        line_start = i + 1;
                        newline_before = true;
                    }
                    i += 1;
                }
                continue;
            }
            '+' => match chars.get(i + 1) {
                Some('+') => {
                    i += 2;
                    Token::Increment
                }
                Some('=') => {
                    i += 2;
                    Token::AddAssign
                }
                _ => {
                    i += 1;
                    Token::Plus
                }
            },
            '-' => match chars.get(i + 1) {
                Some('-') => {
                    i += 2;
                    Token::Decrement
                }
                Some('=') => {
                    i += 2;
                    Token::SubAssign
                }
                _ => {
                    i += 1;
                    Token::Minus
                }
            },
            '*' => match chars.get(i + 1) {
                Some('*') => {
                    i += 2;
                    Token::Exponent
                }
                Some('=') => {
                    i += 2;
                    Token::MulAssign
                }
                _ => {
                    i += 1;
                    Token::Multiply
                }
            },
            '/' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::DivAssign
                } else {
                    i += 1;
                    Token::Divide
                }
            }
            '%' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::ModAssign
                } else {
                    i += 1;
                    Token::Mod
                }
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '{' => {
                i += 1;
                Token::LBrace
            }
            '}' => {
                i += 1;
                Token::RBrace
            }
            ':' => {
                i += 1;
                Token::Colon
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            ';' => {
                i += 1;
                Token::Semicolon
            }
            '.' if chars.get(i + 1).is_some_and(|c| c.is_ascii_digit()) => {
                let (n, next) = scan_number(&chars, i, line)?;
                i = next;
                Token::Number(n)
            }
            '.' => {
                i += 1;
                Token::Dot
            }
            '?' => {
                if chars.get(i + 1) == Some(&'?') {
                    i += 2;
                    Token::NullishCoalescing
                } else {
                    i += 1;
                    Token::QuestionMark
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') && chars.get(i + 2) == Some(&'=') {
                    i += 3;
                    Token::StrictNotEqual
                } else if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::NotEqual
                } else {
                    i += 1;
                    Token::LogicalNot
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') && chars.get(i + 2) == Some(&'=') {
                    i += 3;
                    Token::StrictEqual
                } else if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::Equal
                } else if chars.get(i + 1) == Some(&'>') {
                    i += 2;
                    Token::Arrow
                } else {
                    i += 1;
                    Token::Assign
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::LessEqual
                } else {
                    i += 1;
                    Token::LessThan
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 2;
                    Token::GreaterEqual
                } else {
                    i += 1;
                    Token::GreaterThan
                }
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                i += 2;
                Token::LogicalAnd
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                i += 2;
                Token::LogicalOr
            }
            '0'..='9' => {
                let (n, next) = scan_number(&chars, i, line)?;
                i = next;
                Token::Number(n)
            }
            quote @ ('"' | '\'') => {
                let (s, next, lines) = scan_string(&chars, i + 1, quote, line)?;
                if lines > 0 {
                    line += lines;
                    if let Some(pos) = chars[..next].iter().rposition(|&c| c == '\n') {
                        line_start = pos + 1;
                    }
                }
                i = next;
                Token::StringLit(s)
            }
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                keyword(&ident).unwrap_or(Token::Identifier(ident))
            }
            other => return Err(raise_tokenize_error!(line, format!("unexpected character '{other}'"))),
        };
        tokens.push(TokenData {
            token,
            line,
            column: start - line_start + 1,
            newline_before,
        });
        newline_before = false;
    }
    Ok(tokens)
}

fn keyword(ident: &str) -> Option<Token> {
    let token = match ident {
        "let" => Token::Let,
        "var" => Token::Var,
        "const" => Token::Const,
        "this" => Token::This,
        "new" => Token::New,
        "instanceof" => Token::InstanceOf,
        "typeof" => Token::TypeOf,
        "in" => Token::In,
        "delete" => Token::Delete,
        "void" => Token::Void,
        "function" => Token::Function,
        "return" => Token::Return,
        "if" => Token::If,
        "else" => Token::Else,
        "for" => Token::For,
        "while" => Token::While,
        "do" => Token::Do,
        "break" => Token::Break,
        "continue" => Token::Continue,
        "try" => Token::Try,
        "catch" => Token::Catch,
        "finally" => Token::Finally,
        "throw" => Token::Throw,
        "true" => Token::True,
        "false" => Token::False,
        "null" => Token::Null,
        _ => return None,
    };
    Some(token)
}

fn scan_number(chars: &[char], start: usize, line: usize) -> Result<(f64, usize), Error> {
    let mut i = start;
    if chars[i] == '0' && matches!(chars.get(i + 1), Some('x' | 'X')) {
        i += 2;
        let digits_start = i;
        while i < chars.len() && (chars[i].is_ascii_hexdigit() || chars[i] == '_') {
            i += 1;
        }
        let mut digits: String = chars[digits_start..i].iter().collect();
        digits.retain(|c| c != '_');
        return match u64::from_str_radix(&digits, 16) {
            Ok(n) => Ok((n as f64, i)),
            Err(_) => Err(raise_tokenize_error!(line, "invalid hexadecimal literal")),
        };
    }

    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j >= chars.len() || !chars[j].is_ascii_digit() {
            return Err(raise_tokenize_error!(line, "missing exponent digits"));
        }
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }
        i = j;
    }
    if i < chars.len() && (chars[i].is_alphabetic() || chars[i] == '_' || chars[i] == '$') {
        return Err(raise_tokenize_error!(line, "identifier starts immediately after numeric literal"));
    }

    let mut num_str: String = chars[start..i].iter().collect();
    num_str.retain(|c| c != '_');
    match num_str.parse::<f64>() {
        Ok(n) => Ok((n, i)),
        Err(_) => Err(raise_tokenize_error!(line, format!("invalid number '{num_str}'"))),
    }
}

/// Scans a string body starting after the opening quote. Returns the value, the index after the
/// closing quote and the number of escaped line breaks crossed.
fn scan_string(chars: &[char], start: usize, quote: char, line: usize) -> Result<(String, usize, usize), Error> {
    let mut result = String::new();
    let mut i = start;
    let mut lines = 0;
    loop {
        let Some(&c) = chars.get(i) else {
            return Err(raise_tokenize_error!(line, "unterminated string literal"));
        };
        match c {
            c if c == quote => return Ok((result, i + 1, lines)),
            '\n' => return Err(raise_tokenize_error!(line, "unterminated string literal")),
            '\\' => {
                i += 1;
                let Some(&escaped) = chars.get(i) else {
                    return Err(raise_tokenize_error!(line, "unterminated string literal"));
                };
                match escaped {
                    'n' => result.push('\n'),
                    't' => result.push('\t'),
                    'r' => result.push('\r'),
                    'b' => result.push('\u{8}'),
                    'f' => result.push('\u{c}'),
                    'v' => result.push('\u{b}'),
                    '0' => result.push('\0'),
                    '\n' => lines += 1,
                    'x' => {
                        let code = hex_digits(chars, i + 1, 2).ok_or_else(|| raise_tokenize_error!(line, "invalid hexadecimal escape"))?;
                        result.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                        i += 2;
                    }
                    'u' if chars.get(i + 1) == Some(&'{') => {
                        let close = chars[i..].iter().position(|&c| c == '}').map(|p| p + i);
                        let Some(close) = close else {
                            return Err(raise_tokenize_error!(line, "invalid unicode escape"));
                        };
                        let hex: String = chars[i + 2..close].iter().collect();
                        let code = u32::from_str_radix(&hex, 16)
                            .ok()
                            .and_then(char::from_u32)
                            .ok_or_else(|| raise_tokenize_error!(line, "invalid unicode escape"))?;
                        result.push(code);
                        i = close;
                    }
                    'u' => {
                        let code = hex_digits(chars, i + 1, 4).ok_or_else(|| raise_tokenize_error!(line, "invalid unicode escape"))?;
                        i += 4;
                        // Surrogate pairs arrive as two escapes.
                        if (0xD800..0xDC00).contains(&code)
                            && chars.get(i + 1) == Some(&'\\')
                            && chars.get(i + 2) == Some(&'u')
                            && let Some(low) = hex_digits(chars, i + 3, 4)
                            && (0xDC00..0xE000).contains(&low)
                        {
                            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                            result.push(char::from_u32(combined).unwrap_or('\u{fffd}'));
                            i += 6;
                        } else {
                            result.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                        }
                    }
                    other => result.push(other),
                }
                i += 1;
            }
            c => {
                result.push(c);
                i += 1;
            }
        }
    }
}

fn hex_digits(chars: &[char], start: usize, count: usize) -> Option<u32> {
    let digits: String = chars.get(start..start + count)?.iter().collect();
    u32::from_str_radix(&digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn operators_and_keywords() {
        assert_eq!(
            kinds("let x = a ?? b === c;"),
            vec![
                Token::Let,
                Token::Identifier("x".into()),
                Token::Assign,
                Token::Identifier("a".into()),
                Token::NullishCoalescing,
                Token::Identifier("b".into()),
                Token::StrictEqual,
                Token::Identifier("c".into()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn numbers_and_strings() {
        assert_eq!(
            kinds(r#"0x1F 1_000 .5 2e3 'a\nA\u{1F600}'"#),
            vec![
                Token::Number(31.0),
                Token::Number(1000.0),
                Token::Number(0.5),
                Token::Number(2000.0),
                Token::StringLit("a\nA\u{1F600}".into()),
            ]
        );
    }

    #[test]
    fn tracks_lines_and_newlines() {
        let tokens = tokenize("a\n/* one\ntwo */ b // tail\nc").unwrap();
        let lines: Vec<_> = tokens.iter().map(|t| (t.line, t.newline_before)).collect();
        assert_eq!(lines, vec![(1, false), (3, true), (4, true)]);
    }

    #[test]
    fn unterminated_string_reports_line() {
        let err = tokenize("x\n'abc").unwrap_err();
        assert_eq!(err.line(), Some(2));
    }
}
