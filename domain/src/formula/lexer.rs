//! Formula tokenizer

use super::FormulaError;
use crate::sheet::cell_ref::CellRef;
use crate::sheet::value::ErrorValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorValue),
    Cell(CellRef),
    /// Sheet qualifier, already stripped of quotes and the trailing `!`
    Sheet(String),
    /// Function name, upper-cased, immediately followed by `(`
    Function(String),
    /// Defined name or bare identifier
    Name(String),
    /// `{field}` substitution
    Field(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Ampersand,
    Percent,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    Comma,
    Colon,
}

const ERROR_LITERALS: [ErrorValue; 7] = [
    ErrorValue::Div0,
    ErrorValue::Value,
    ErrorValue::Ref,
    ErrorValue::Name,
    ErrorValue::Na,
    ErrorValue::Num,
    ErrorValue::Null,
];

pub fn tokenize(input: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let (number, next) = lex_number(&chars, i)?;
                tokens.push(Token::Number(number));
                i = next;
            }
            '"' => {
                let (text, next) = lex_quoted(&chars, i, '"').ok_or(FormulaError::UnterminatedString)?;
                tokens.push(Token::Text(text));
                i = next;
            }
            '\'' => {
                let (sheet, next) = lex_quoted(&chars, i, '\'').ok_or(FormulaError::UnterminatedString)?;
                if chars.get(next) != Some(&'!') {
                    return Err(FormulaError::UnexpectedCharacter('\'', i));
                }
                tokens.push(Token::Sheet(sheet));
                i = next + 1;
            }
            '{' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|c| *c == '}')
                    .ok_or(FormulaError::UnexpectedCharacter('{', i))?;
                let name: String = chars[i + 1..i + 1 + end].iter().collect();
                tokens.push(Token::Field(name.trim().to_string()));
                i += end + 2;
            }
            '#' => {
                let rest: String = chars[i..].iter().collect::<String>().to_ascii_uppercase();
                let literal = ERROR_LITERALS
                    .iter()
                    .find(|e| rest.starts_with(e.as_str()))
                    .ok_or(FormulaError::UnexpectedCharacter('#', i))?;
                tokens.push(Token::Error(*literal));
                i += literal.as_str().chars().count();
            }
            c if c.is_alphabetic() || c == '_' || c == '$' || c == '\\' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '.' | '$' | '\\'))
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(classify_word(word, chars.get(i).copied(), &mut i));
            }
            '+' => push(&mut tokens, &mut i, Token::Plus),
            '-' => push(&mut tokens, &mut i, Token::Minus),
            '*' => push(&mut tokens, &mut i, Token::Star),
            '/' => push(&mut tokens, &mut i, Token::Slash),
            '^' => push(&mut tokens, &mut i, Token::Caret),
            '&' => push(&mut tokens, &mut i, Token::Ampersand),
            '%' => push(&mut tokens, &mut i, Token::Percent),
            '=' => push(&mut tokens, &mut i, Token::Eq),
            '(' => push(&mut tokens, &mut i, Token::LParen),
            ')' => push(&mut tokens, &mut i, Token::RParen),
            ',' => push(&mut tokens, &mut i, Token::Comma),
            ':' => push(&mut tokens, &mut i, Token::Colon),
            '<' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push(Token::Le);
                    i += 2;
                }
                Some('>') => {
                    tokens.push(Token::Ne);
                    i += 2;
                }
                _ => push(&mut tokens, &mut i, Token::Lt),
            },
            '>' => match chars.get(i + 1) {
                Some('=') => {
                    tokens.push(Token::Ge);
                    i += 2;
                }
                _ => push(&mut tokens, &mut i, Token::Gt),
            },
            other => return Err(FormulaError::UnexpectedCharacter(other, i)),
        }
    }

    Ok(tokens)
}

fn push(tokens: &mut Vec<Token>, i: &mut usize, token: Token) {
    tokens.push(token);
    *i += 1;
}

fn classify_word(word: String, next: Option<char>, i: &mut usize) -> Token {
    if next == Some('!') {
        *i += 1;
        return Token::Sheet(word);
    }
    if next == Some('(') {
        let upper = word.to_ascii_uppercase();
        let name = upper.strip_prefix("_XLFN.").unwrap_or(&upper).to_string();
        return Token::Function(name);
    }
    match word.to_ascii_uppercase().as_str() {
        "TRUE" => return Token::Bool(true),
        "FALSE" => return Token::Bool(false),
        _ => {}
    }
    match CellRef::parse(&word) {
        Ok(cell) => Token::Cell(cell),
        Err(_) => Token::Name(word),
    }
}

fn lex_number(chars: &[char], start: usize) -> Result<(f64, usize), FormulaError> {
    let mut i = start;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
        i += 1;
    }
    if i < chars.len() && matches!(chars[i], 'e' | 'E') {
        let mut j = i + 1;
        if j < chars.len() && matches!(chars[j], '+' | '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }
    let text: String = chars[start..i].iter().collect();
    text.parse::<f64>()
        .map(|n| (n, i))
        .map_err(|_| FormulaError::InvalidNumber(text))
}

/// Quoted run with doubled-quote escapes; returns the text and the index after the closing quote
fn lex_quoted(chars: &[char], start: usize, quote: char) -> Option<(String, usize)> {
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                text.push(quote);
                i += 2;
                continue;
            }
            return Some((text, i + 1));
        }
        text.push(chars[i]);
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(r: &str) -> Token {
        Token::Cell(CellRef::parse(r).unwrap())
    }

    #[test]
    fn test_arithmetic_tokens() {
        let tokens = tokenize("1.5 + B2*3%").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Number(1.5),
                Token::Plus,
                cell("B2"),
                Token::Star,
                Token::Number(3.0),
                Token::Percent,
            ]
        );
    }

    #[test]
    fn test_sheet_qualified_references() {
        let tokens = tokenize("'Rate Sheet'!$A$1+Summary!B6:B8").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Sheet("Rate Sheet".into()),
                cell("A1"),
                Token::Plus,
                Token::Sheet("Summary".into()),
                cell("B6"),
                Token::Colon,
                cell("B8"),
            ]
        );
    }

    #[test]
    fn test_functions_strings_and_comparisons() {
        let tokens = tokenize(r#"IF(A1<>"it""s",TRUE,_xlfn.CONCAT("a"))"#).unwrap();
        assert_eq!(tokens[0], Token::Function("IF".into()));
        assert_eq!(tokens[3], Token::Ne);
        assert_eq!(tokens[4], Token::Text("it\"s".into()));
        assert_eq!(tokens[6], Token::Bool(true));
        assert_eq!(tokens[8], Token::Function("CONCAT".into()));
    }

    #[test]
    fn test_error_literals_and_names() {
        let tokens = tokenize("#N/A & rate_table + {Square Feet}").unwrap();
        assert_eq!(tokens[0], Token::Error(ErrorValue::Na));
        assert_eq!(tokens[2], Token::Name("rate_table".into()));
        assert_eq!(tokens[4], Token::Field("Square Feet".into()));
    }

    #[test]
    fn test_scientific_numbers() {
        assert_eq!(tokenize("1.2E+3").unwrap(), vec![Token::Number(1200.0)]);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(
            tokenize("1 ; 2"),
            Err(FormulaError::UnexpectedCharacter(';', 2))
        );
        assert_eq!(tokenize("\"open"), Err(FormulaError::UnterminatedString));
        assert!(tokenize("1..2").is_err());
    }
}
