use crate::agents::agent::{Agent, AgentResult, ensure_task_supported};
use crate::models::{AgentDescriptor, Capability, CoreError, CoreErrorKind, Task};

const MAX_EXPRESSION_LEN: usize = 256;
const MAX_NESTING: usize = 64;

/// Evaluates plain arithmetic. Only numbers, `+ - * / % ^` and parentheses are accepted;
/// there are no identifiers, calls or assignments to reach.
pub struct CalculatorAgent {
    descriptor: AgentDescriptor,
}

impl CalculatorAgent {
    pub fn new() -> Self {
        Self::with_id("calculator")
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            descriptor: AgentDescriptor::new(id, "Arithmetic evaluator", [Capability::Calculation]),
        }
    }
}

impl Default for CalculatorAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent for CalculatorAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    fn handle(&self, task: &Task) -> AgentResult<String> {
        ensure_task_supported(&self.descriptor, task)?;

        let expression = task
            .context_str("expression")
            .unwrap_or(task.description.as_str());
        let value = evaluate(expression).map_err(|message| {
            CoreError::new(CoreErrorKind::AgentExecution, message)
                .with_agent(self.descriptor.id.clone())
        })?;
        Ok(format_number(value))
    }
}

pub fn evaluate(expression: &str) -> Result<f64, String> {
    if expression.len() > MAX_EXPRESSION_LEN {
        return Err(format!(
            "expression exceeds {MAX_EXPRESSION_LEN} characters"
        ));
    }

    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err("expression is empty".to_string());
    }

    let mut parser = Parser {
        tokens: &tokens,
        position: 0,
        depth: 0,
    };
    let value = parser.expression()?;
    if let Some(token) = parser.peek() {
        return Err(format!("unexpected token '{token}'"));
    }
    if !value.is_finite() {
        return Err("result is not a finite number".to_string());
    }
    Ok(value)
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LeftParen,
    RightParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Star => f.write_str("*"),
            Self::Slash => f.write_str("/"),
            Self::Percent => f.write_str("%"),
            Self::Caret => f.write_str("^"),
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
        }
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expression.char_indices().peekable();

    while let Some((start, ch)) = chars.next() {
        let token = match ch {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Caret,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(index, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        end = index + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &expression[start..end];
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                Token::Number(value)
            }
            other => return Err(format!("unsupported character '{other}'")),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    position: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.position).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expression(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(token @ (Token::Plus | Token::Minus)) = self.peek() {
            self.advance();
            let rhs = self.term()?;
            value = if token == Token::Plus {
                value + rhs
            } else {
                value - rhs
            };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.unary()?;
        while let Some(token @ (Token::Star | Token::Slash | Token::Percent)) = self.peek() {
            self.advance();
            let rhs = self.unary()?;
            value = match token {
                Token::Star => value * rhs,
                _ if rhs == 0.0 => return Err("division by zero".to_string()),
                Token::Slash => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<f64, String> {
        self.enter()?;
        let value = match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                -self.unary()?
            }
            Some(Token::Plus) => {
                self.advance();
                self.unary()?
            }
            _ => self.power()?,
        };
        self.depth -= 1;
        Ok(value)
    }

    fn power(&mut self) -> Result<f64, String> {
        let base = self.primary()?;
        if self.peek() == Some(Token::Caret) {
            self.advance();
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, String> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LeftParen) => {
                let value = self.expression()?;
                match self.advance() {
                    Some(Token::RightParen) => Ok(value),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(token) => Err(format!("unexpected token '{token}'")),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn enter(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err("expression nests too deeply".to_string());
        }
        Ok(())
    }
}
