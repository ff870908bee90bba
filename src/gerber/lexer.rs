use crate::error::ParseError;

/// Tokens produced by the Gerber scanner.
#[derive(Debug, Clone, PartialEq)]
pub enum GerberToken {
    /// One extended command from a `%...%` block, `*` terminators stripped.
    /// Example: `"FSLAX24Y24"`, `"ADD10C,0.020"`, `"LPD"`
    Extended(String),
    /// A word command terminated by `*`.
    /// Example: `"D10"`, `"X100Y200D01"`, `"G01"`, `"M02"`
    Word(String),
}

/// Tokenize a Gerber file.
///
/// `*` terminates statements and `%...%` wraps extended commands; a single
/// block may hold several `*`-separated extended commands. G04 comments are
/// dropped. CR, LF, CRLF and mixed line endings are all accepted.
///
/// Bytes at or above 0x80 outside comments abort with
/// [`ParseError::InvalidEncoding`].
pub fn tokenize(input: &str) -> Result<Vec<GerberToken>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            '%' => {
                chars.next();
                let mut block = String::new();
                loop {
                    match chars.peek() {
                        Some(&'%') => {
                            chars.next();
                            flush_extended(&mut tokens, &mut block)?;
                            break;
                        }
                        Some(&'*') => {
                            chars.next();
                            flush_extended(&mut tokens, &mut block)?;
                        }
                        Some(&c) => {
                            chars.next();
                            if c != '\n' && c != '\r' {
                                block.push(c);
                            }
                        }
                        None => break,
                    }
                }
            }
            '\n' | '\r' | ' ' | '\t' => {
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '*' {
                        chars.next();
                        break;
                    }
                    if c == '%' {
                        break;
                    }
                    chars.next();
                    if !c.is_whitespace() {
                        word.push(c);
                    }
                }
                let trimmed = word.trim();
                if !trimmed.is_empty() && !is_comment(trimmed) {
                    check_ascii(trimmed)?;
                    tokens.push(GerberToken::Word(trimmed.to_string()));
                }
            }
        }
    }

    Ok(tokens)
}

fn flush_extended(tokens: &mut Vec<GerberToken>, block: &mut String) -> Result<(), ParseError> {
    let trimmed = block.trim();
    if !trimmed.is_empty() && !is_comment(trimmed) {
        check_ascii(trimmed)?;
        tokens.push(GerberToken::Extended(trimmed.to_string()));
    }
    block.clear();
    Ok(())
}

/// G04 comments may carry arbitrary text; everything else must be ASCII.
fn check_ascii(command: &str) -> Result<(), ParseError> {
    if let Some(bad) = command.chars().find(|c| !c.is_ascii()) {
        return Err(ParseError::InvalidEncoding(format!(
            "non-ASCII character {bad:?} in command `{command}`"
        )));
    }
    Ok(())
}

fn is_comment(s: &str) -> bool {
    if s.starts_with("G04") {
        return true;
    }
    // Bare G4 is also a comment, but G40 and friends are not.
    s.starts_with("G4")
        && !s
            .get(2..)
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
}
