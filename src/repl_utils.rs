//! Input helpers for the interactive shell.
//!
//! `is_complete_input(input)` decides whether the REPL should evaluate what it has or keep
//! reading lines. It is a scanner, not a parser: brackets inside quoted strings and comments are
//! ignored, and a stray closing bracket counts as complete so the parser can report it.

/// Returns true when `src` has no open string, block comment or bracket.
pub fn is_complete_input(src: &str) -> bool {
    let mut bracket_stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut in_line_comment = false;
    let mut in_block_comment = false;
    let mut escape = false;
    let mut chars = src.chars().peekable();

    while let Some(ch) = chars.next() {
        if escape {
            escape = false;
            continue;
        }
        if in_line_comment {
            if ch == '\n' || ch == '\r' {
                in_line_comment = false;
            }
            continue;
        }
        if in_block_comment {
            if ch == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block_comment = false;
            }
            continue;
        }
        if let Some(open) = quote {
            match ch {
                '\\' => escape = true,
                // A newline ends an unterminated string; the parser reports it.
                '\n' => quote = None,
                _ if ch == open => quote = None,
                _ => {}
            }
            continue;
        }

        match ch {
            '\'' | '"' => quote = Some(ch),
            '/' if chars.peek() == Some(&'/') => {
                chars.next();
                in_line_comment = true;
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                in_block_comment = true;
            }
            '(' => bracket_stack.push(')'),
            '[' => bracket_stack.push(']'),
            '{' => bracket_stack.push('}'),
            ')' | ']' | '}' => match bracket_stack.pop() {
                Some(expected) if expected == ch => {}
                _ => return true,
            },
            _ => {}
        }
    }

    quote.is_none() && !in_block_comment && bracket_stack.is_empty()
}

#[cfg(test)]
mod tests {
    use super::is_complete_input;

    #[test]
    fn test_balanced_simple() {
        assert!(is_complete_input("1 + 1"));
        assert!(is_complete_input("let a = 10;"));
    }

    #[test]
    fn test_unbalanced_brackets() {
        assert!(!is_complete_input("(1 + 2"));
        assert!(!is_complete_input("function f() {"));
        assert!(!is_complete_input("[1, 2"));
        // Mismatched closers are left for the parser to report.
        assert!(is_complete_input("(1 + 2]"));
    }

    #[test]
    fn test_strings_and_comments() {
        assert!(is_complete_input("let s = '\\'not a bracket\\'';"));
        assert!(is_complete_input("// comment with { [ ( "));
        assert!(is_complete_input("/* block comment with { [ ( */"));
        assert!(!is_complete_input("/* still open"));
        assert!(is_complete_input("'a string with } inside'"));
        assert!(!is_complete_input("f('open"));
    }

    #[test]
    fn test_division_is_not_a_comment() {
        assert!(!is_complete_input("(a / 1"));
        assert!(is_complete_input("a / b / c"));
    }
}
