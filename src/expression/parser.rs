//! Parser for the body of a `${{ ... }}` block.
//!
//! ```text
//! expr    := call | quoted | word
//! call    := ['$'] ident '(' [expr (',' expr)*] ')'
//! quoted  := '\'' ... '\'' | '"' ... '"'
//! word    := number | true | false | null | bare text
//! ```

use crate::error::{OrchestrationError, OrchestrationResult};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Call { name: String, args: Vec<Expr> },
}

pub(crate) fn parse(source: &str) -> OrchestrationResult<Expr> {
    let mut parser = Parser {
        chars: source.chars().collect(),
        pos: 0,
        source,
    };
    let expr = parser.expr()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, reason: &str) -> OrchestrationError {
        OrchestrationError::Expression(format!(
            "{reason} at position {} in '{}'",
            self.pos, self.source
        ))
    }

    fn expr(&mut self) -> OrchestrationResult<Expr> {
        self.skip_ws();
        match self.peek() {
            Some(quote @ ('\'' | '"')) => self.quoted(quote),
            Some(_) => {
                let word = self.word();
                self.skip_ws();
                if self.peek() == Some('(') {
                    self.call(word)
                } else if word.is_empty() {
                    Err(self.error("expected a value"))
                } else {
                    Ok(Expr::Literal(literal(&word)))
                }
            }
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn quoted(&mut self, quote: char) -> OrchestrationResult<Expr> {
        self.pos += 1;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == quote {
                let text: String = self.chars[start..self.pos].iter().collect();
                self.pos += 1;
                return Ok(Expr::Literal(Value::String(text)));
            }
            self.pos += 1;
        }
        Err(self.error("unterminated string"))
    }

    fn word(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, ',' | '(' | ')' | '\'' | '"') {
                break;
            }
            self.pos += 1;
        }
        self.chars[start..self.pos]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn call(&mut self, word: String) -> OrchestrationResult<Expr> {
        let name = word.trim_start_matches('$').to_string();
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(self.error("invalid function name"));
        }
        // consume '('
        self.pos += 1;
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(Expr::Call { name, args });
        }
        loop {
            args.push(self.expr()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(')') => {
                    self.pos += 1;
                    return Ok(Expr::Call { name, args });
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
    }
}

fn literal(word: &str) -> Value {
    match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(i) = word.parse::<i64>() {
                Value::from(i)
            } else if let Some(n) = word
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(serde_json::Number::from_f64)
            {
                Value::Number(n)
            } else {
                Value::String(word.to_string())
            }
        }
    }
}
