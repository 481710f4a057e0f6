//! `calculator` — a minimal arithmetic tool used to exercise the tool-call
//! continuation loop (§8 scenario 3) without depending on an external
//! sandbox. Grounded in the shape of `skynet_agent::tools::execute_command`
//! (single-field JSON input, plain-text result) but scoped to arithmetic.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tool::{BridgeContext, Tool, ToolResult};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a basic arithmetic expression (+, -, *, /, parentheses). \
         Use this instead of doing math in your head."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expr": {
                    "type": "string",
                    "description": "The arithmetic expression to evaluate, e.g. \"2+2\"."
                }
            },
            "required": ["expr"]
        })
    }

    async fn execute(&self, _ctx: &BridgeContext, input: Value) -> ToolResult {
        let expr = match input.get("expr").and_then(|v| v.as_str()) {
            Some(e) if !e.trim().is_empty() => e.trim(),
            _ => return ToolResult::error("'expr' is required"),
        };
        match eval(expr) {
            Ok(value) => ToolResult::success(format_number(value)),
            Err(msg) => ToolResult::error(msg),
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Tiny recursive-descent evaluator for `+ - * / ( )` over f64 literals.
fn eval(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut pos = 0;
    let value = parse_expr(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(format!("unexpected trailing input near token {pos}"));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expr: &str) -> Result<Vec<Tok>, String> {
    let mut out = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => { i += 1; }
            '+' => { out.push(Tok::Plus); i += 1; }
            '-' => { out.push(Tok::Minus); i += 1; }
            '*' => { out.push(Tok::Star); i += 1; }
            '/' => { out.push(Tok::Slash); i += 1; }
            '(' => { out.push(Tok::LParen); i += 1; }
            ')' => { out.push(Tok::RParen); i += 1; }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let s: String = chars[start..i].iter().collect();
                let n = s.parse::<f64>().map_err(|_| format!("invalid number '{s}'"))?;
                out.push(Tok::Num(n));
            }
            other => return Err(format!("unexpected character '{other}'")),
        }
    }
    Ok(out)
}

fn parse_expr(tokens: &[Tok], pos: &mut usize) -> Result<f64, String> {
    let mut value = parse_term(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Tok::Plus) => { *pos += 1; value += parse_term(tokens, pos)?; }
            Some(Tok::Minus) => { *pos += 1; value -= parse_term(tokens, pos)?; }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_term(tokens: &[Tok], pos: &mut usize) -> Result<f64, String> {
    let mut value = parse_factor(tokens, pos)?;
    loop {
        match tokens.get(*pos) {
            Some(Tok::Star) => { *pos += 1; value *= parse_factor(tokens, pos)?; }
            Some(Tok::Slash) => {
                *pos += 1;
                let rhs = parse_factor(tokens, pos)?;
                if rhs == 0.0 {
                    return Err("division by zero".to_string());
                }
                value /= rhs;
            }
            _ => break,
        }
    }
    Ok(value)
}

fn parse_factor(tokens: &[Tok], pos: &mut usize) -> Result<f64, String> {
    match tokens.get(*pos) {
        Some(Tok::Num(n)) => { *pos += 1; Ok(*n) }
        Some(Tok::Minus) => { *pos += 1; Ok(-parse_factor(tokens, pos)?) }
        Some(Tok::LParen) => {
            *pos += 1;
            let value = parse_expr(tokens, pos)?;
            match tokens.get(*pos) {
                Some(Tok::RParen) => { *pos += 1; Ok(value) }
                _ => Err("expected closing parenthesis".to_string()),
            }
        }
        other => Err(format!("unexpected token {other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_simple_addition() {
        assert_eq!(eval("2+2").unwrap(), 4.0);
    }

    #[test]
    fn respects_operator_precedence() {
        assert_eq!(eval("2+3*4").unwrap(), 14.0);
    }

    #[test]
    fn honors_parentheses() {
        assert_eq!(eval("(2+3)*4").unwrap(), 20.0);
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(eval("1/0").is_err());
    }

    #[tokio::test]
    async fn execute_formats_integer_results_without_decimal() {
        use crate::test_support::test_context;

        let tool = CalculatorTool;
        let ctx = test_context();
        let result = tool.execute(&ctx, json!({"expr": "2+2"})).await;
        assert!(!result.is_error);
        assert_eq!(result.content, "4");
    }

    #[tokio::test]
    async fn execute_reports_error_for_malformed_expression() {
        use crate::test_support::test_context;

        let tool = CalculatorTool;
        let ctx = test_context();
        let result = tool.execute(&ctx, json!({"expr": "2+"})).await;
        assert!(result.is_error);
    }
}
