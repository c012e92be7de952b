use notify_schemas::Value;

use crate::ast::{BinOp, Expr, UnOp};
use crate::token::Token;

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(mut self) -> Result<Expr, String> {
        let expr = self.parse_or()?;
        if self.peek() != &Token::Eof {
            return Err(format!("unexpected trailing token: {:?}", self.peek()));
        }
        Ok(expr)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, t: &Token) -> Result<(), String> {
        if self.peek() == t {
            self.advance();
            Ok(())
        } else {
            Err(format!("expected {t:?}, found {:?}", self.peek()))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_and()?;
        while self.peek() == &Token::Or {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_not()?;
        while self.peek() == &Token::And {
            self.advance();
            let rhs = self.parse_not()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.peek() == &Token::Not {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Unary(UnOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, String> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            Token::Eq => BinOp::Eq,
            Token::Ne => BinOp::Ne,
            Token::Lt => BinOp::Lt,
            Token::Le => BinOp::Le,
            Token::Gt => BinOp::Gt,
            Token::Ge => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> Result<Expr, String> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        if self.peek() == &Token::Minus {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnOp::Neg, Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let primary = self.parse_primary()?;
        let mut path = match &primary {
            Expr::Path(p) => Some(p.clone()),
            _ => None,
        };

        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let Token::Ident(field) = self.advance() else {
                        return Err("expected identifier after '.'".to_string());
                    };
                    match &mut path {
                        Some(p) => {
                            p.push('.');
                            p.push_str(&field);
                        }
                        None => return Err("'.' access on a non-path expression".to_string()),
                    }
                }
                Token::LBracket => {
                    self.advance();
                    let Token::Str(field) = self.advance() else {
                        return Err("expected string literal inside '[...]'".to_string());
                    };
                    self.expect(&Token::RBracket)?;
                    match &mut path {
                        Some(p) => {
                            p.push('.');
                            p.push_str(&field);
                        }
                        None => return Err("'[...]' access on a non-path expression".to_string()),
                    }
                }
                _ => break,
            }
        }

        Ok(match path {
            Some(p) => Expr::Path(p),
            None => primary,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.advance() {
            Token::Number(n) => {
                if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                    Ok(Expr::Lit(Value::Int(n as i64)))
                } else {
                    Ok(Expr::Lit(Value::Float(n)))
                }
            }
            Token::Str(s) => Ok(Expr::Lit(Value::Str(s))),
            Token::True => Ok(Expr::Lit(Value::Bool(true))),
            Token::False => Ok(Expr::Lit(Value::Bool(false))),
            Token::Null => Ok(Expr::Lit(Value::Null)),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                if self.peek() == &Token::LParen {
                    self.advance();
                    let mut args = Vec::new();
                    if self.peek() != &Token::RParen {
                        args.push(self.parse_or()?);
                        while self.peek() == &Token::Comma {
                            self.advance();
                            args.push(self.parse_or()?);
                        }
                    }
                    self.expect(&Token::RParen)?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Path(name))
                }
            }
            other => Err(format!("unexpected token: {other:?}")),
        }
    }
}
