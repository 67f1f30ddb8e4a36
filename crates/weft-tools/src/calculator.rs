use futures::future::BoxFuture;
use serde::Deserialize;

use weft_core::error::Result;

use crate::{parse_input, Tool, ToolOutcome};

/// Calculator tool over a closed arithmetic grammar.
///
/// The tokenizer validates the ORIGINAL input against the allowed token set
/// before anything is evaluated; an identifier outside the closed set, or
/// any character outside the grammar, is rejected as an error result. There
/// is no rewriting step to smuggle input past the check.
pub struct CalculatorTool;

const FUNCTIONS: &[&str] = &[
    "sqrt", "sin", "cos", "tan", "log", "abs", "round", "ceil", "floor", "pow",
];
const CONSTANTS: &[&str] = &["PI", "E"];

#[derive(Deserialize)]
struct CalculatorInput {
    expression: String,
}

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ** parentheses, \
         the constants PI and E, and the functions sqrt, sin, cos, tan, log, \
         abs, round, ceil, floor, pow."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The arithmetic expression to evaluate, e.g. sqrt(144) + 3"
                }
            },
            "required": ["expression"]
        })
    }

    fn execute<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move {
            let params: CalculatorInput = parse_input(self.name(), input)?;
            match evaluate(&params.expression) {
                Ok(value) => Ok(ToolOutcome::success(format_number(value))),
                Err(message) => Ok(ToolOutcome::error(format!("Error: {}", message))),
            }
        })
    }
}

/// Evaluate a restricted arithmetic expression.
pub fn evaluate(expression: &str) -> std::result::Result<f64, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!(
            "unexpected token at position {}",
            parser.pos
        ));
    }
    if !value.is_finite() {
        return Err("expression did not evaluate to a finite number".into());
    }
    Ok(value)
}

/// Render a result the way users expect: integers without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

// ── Tokenizer ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pow,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                if chars.get(i + 1) == Some(&'*') {
                    tokens.push(Token::Pow);
                    i += 2;
                } else {
                    tokens.push(Token::Star);
                    i += 1;
                }
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}'", literal))?;
                tokens.push(Token::Number(number));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                if !FUNCTIONS.contains(&ident.as_str()) && !CONSTANTS.contains(&ident.as_str()) {
                    return Err(format!("unknown identifier '{}'", ident));
                }
                tokens.push(Token::Ident(ident));
            }
            other => return Err(format!("disallowed character '{}'", other)),
        }
    }

    Ok(tokens)
}

// ── Parser / evaluator ───────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> std::result::Result<(), String> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(format!("expected {:?}, found {:?}", expected, token)),
            None => Err(format!("expected {:?}, found end of input", expected)),
        }
    }

    fn expr(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    value /= self.unary()?;
                }
                Some(Token::Percent) => {
                    self.advance();
                    value %= self.unary()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> std::result::Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.advance();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> std::result::Result<f64, String> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::Pow) {
            self.advance();
            // Right-associative; the exponent may itself be signed.
            let exponent = self.unary()?;
            Ok(base.powf(exponent))
        } else {
            Ok(base)
        }
    }

    fn atom(&mut self) -> std::result::Result<f64, String> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "PI" => Ok(std::f64::consts::PI),
                "E" => Ok(std::f64::consts::E),
                _ => self.call(&name),
            },
            Some(token) => Err(format!("unexpected token {:?}", token)),
            None => Err("unexpected end of expression".into()),
        }
    }

    fn call(&mut self, name: &str) -> std::result::Result<f64, String> {
        self.expect(Token::LParen)?;
        let first = self.expr()?;

        if name == "pow" {
            self.expect(Token::Comma)?;
            let second = self.expr()?;
            self.expect(Token::RParen)?;
            return Ok(first.powf(second));
        }

        self.expect(Token::RParen)?;
        let value = match name {
            "sqrt" => first.sqrt(),
            "sin" => first.sin(),
            "cos" => first.cos(),
            "tan" => first.tan(),
            "log" => first.ln(),
            "abs" => first.abs(),
            "round" => first.round(),
            "ceil" => first.ceil(),
            "floor" => first.floor(),
            other => return Err(format!("unknown function '{}'", other)),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_arithmetic() {
        assert_eq!(evaluate("1 + 2 * 3").unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3").unwrap(), 9.0);
        assert_eq!(evaluate("10 / 4").unwrap(), 2.5);
        assert_eq!(evaluate("10 % 3").unwrap(), 1.0);
        assert_eq!(evaluate("2 ** 10").unwrap(), 1024.0);
        assert_eq!(evaluate("-3 + 5").unwrap(), 2.0);
    }

    #[test]
    fn test_power_is_right_associative() {
        assert_eq!(evaluate("2 ** 3 ** 2").unwrap(), 512.0);
        assert_eq!(evaluate("2 ** -1").unwrap(), 0.5);
    }

    #[test]
    fn test_functions_and_constants() {
        assert_eq!(evaluate("sqrt(144) + 3").unwrap(), 15.0);
        assert_eq!(evaluate("abs(-7)").unwrap(), 7.0);
        assert_eq!(evaluate("floor(2.9) + ceil(2.1)").unwrap(), 5.0);
        assert_eq!(evaluate("round(2.5)").unwrap(), 3.0);
        assert_eq!(evaluate("pow(2, 8)").unwrap(), 256.0);
        assert!((evaluate("sin(PI)").unwrap()).abs() < 1e-10);
        assert!((evaluate("log(E)").unwrap() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_unknown_identifiers_are_rejected_before_evaluation() {
        assert!(evaluate("require('fs')").is_err());
        assert!(evaluate("process").is_err());
        assert!(evaluate("eval(1)").is_err());
        assert!(evaluate("sqrtx(4)").is_err());
        // Even appended to a valid prefix.
        assert!(evaluate("1 + globalThis").is_err());
    }

    #[test]
    fn test_disallowed_characters_are_rejected() {
        assert!(evaluate("1; 2").is_err());
        assert!(evaluate("'fs'").is_err());
        assert!(evaluate("a = 1").is_err());
        assert!(evaluate("[1]").is_err());
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(evaluate("").is_err());
        assert!(evaluate("1 +").is_err());
        assert!(evaluate("(1").is_err());
        assert!(evaluate("pow(2)").is_err());
        assert!(evaluate("1 2").is_err());
        assert!(evaluate("1..5").is_err());
    }

    #[test]
    fn test_non_finite_results_are_errors() {
        assert!(evaluate("1 / 0").is_err());
        assert!(evaluate("sqrt(-1)").is_err());
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(15.0), "15");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-4.0), "-4");
    }

    #[tokio::test]
    async fn test_tool_wraps_errors_as_outcomes() {
        let tool = CalculatorTool;
        let ok = tool
            .execute(serde_json::json!({"expression": "sqrt(144) + 3"}))
            .await
            .unwrap();
        assert!(!ok.is_error);
        assert_eq!(ok.content, "15");

        let bad = tool
            .execute(serde_json::json!({"expression": "require('fs')"}))
            .await
            .unwrap();
        assert!(bad.is_error);
        assert!(bad.content.starts_with("Error:"));
    }
}
