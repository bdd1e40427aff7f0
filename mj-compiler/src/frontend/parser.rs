//! Recursive-descent parser producing the typed syntax tree.

use super::lexer::{position_to_line_col, tokenize, Spanned, Token};
use crate::ast::{
    BinOp, ClassDecl, Expr, MainClass, MethodDecl, NodeId, Param, Program, Stmt, TypeName, VarDecl,
};
use crate::CompileError;

pub fn parse_program(source: &str) -> Result<Program, CompileError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        next_node: 0,
    };
    parser.program()
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Spanned>,
    pos: usize,
    next_node: usize,
}

impl<'src> Parser<'src> {
    // ── Token plumbing ───────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        let offset = match self.tokens.get(self.pos) {
            Some(s) => s.start,
            None => self.source.len(),
        };
        let (line, col) = position_to_line_col(self.source, offset);
        let found = match self.peek() {
            Some(t) => t.to_string(),
            None => "end of input".to_string(),
        };
        CompileError::Parse {
            line,
            col,
            message: format!("{} (found {})", message.into(), found),
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), CompileError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", token)))
        }
    }

    fn ident(&mut self) -> Result<String, CompileError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("expected identifier")),
        }
    }

    fn keyword_ident(&mut self, word: &str) -> Result<(), CompileError> {
        match self.peek() {
            Some(Token::Ident(name)) if name == word => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(self.error(format!("expected '{}'", word))),
        }
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        id
    }

    // ── Declarations ─────────────────────────────────────────────────

    fn program(&mut self) -> Result<Program, CompileError> {
        let main = self.main_class()?;
        let mut classes = Vec::new();
        while self.peek().is_some() {
            classes.push(self.class_decl()?);
        }
        Ok(Program { main, classes })
    }

    fn main_class(&mut self) -> Result<MainClass, CompileError> {
        self.expect(Token::Class)?;
        let name = self.ident()?;
        self.expect(Token::LBrace)?;
        self.expect(Token::Public)?;
        self.expect(Token::Static)?;
        self.expect(Token::Void)?;
        self.keyword_ident("main")?;
        self.expect(Token::LParen)?;
        self.keyword_ident("String")?;
        self.expect(Token::LBracket)?;
        self.expect(Token::RBracket)?;
        self.ident()?;
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(&Token::RBrace) {
            stmts.push(self.statement()?);
        }
        self.expect(Token::RBrace)?;
        self.expect(Token::RBrace)?;

        let body = if stmts.len() == 1 {
            stmts.remove(0)
        } else {
            Stmt::Block(stmts)
        };
        Ok(MainClass { name, body })
    }

    fn class_decl(&mut self) -> Result<ClassDecl, CompileError> {
        self.expect(Token::Class)?;
        let name = self.ident()?;
        let extends = if self.eat(&Token::Extends) {
            Some(self.ident()?)
        } else {
            None
        };
        self.expect(Token::LBrace)?;

        let mut fields = Vec::new();
        while !self.at(&Token::Public) && !self.at(&Token::RBrace) {
            fields.push(self.var_decl()?);
        }
        let mut methods = Vec::new();
        while !self.eat(&Token::RBrace) {
            methods.push(self.method_decl()?);
        }

        Ok(ClassDecl {
            name,
            extends,
            fields,
            methods,
        })
    }

    fn var_decl(&mut self) -> Result<VarDecl, CompileError> {
        let ty = self.type_name()?;
        let name = self.ident()?;
        self.expect(Token::Semicolon)?;
        Ok(VarDecl { ty, name })
    }

    fn type_name(&mut self) -> Result<TypeName, CompileError> {
        match self.peek() {
            Some(Token::Int) => {
                self.pos += 1;
                if self.eat(&Token::LBracket) {
                    self.expect(Token::RBracket)?;
                    Ok(TypeName::IntArray)
                } else {
                    Ok(TypeName::Int)
                }
            }
            Some(Token::Boolean) => {
                self.pos += 1;
                Ok(TypeName::Boolean)
            }
            Some(Token::Ident(_)) => Ok(TypeName::Class(self.ident()?)),
            _ => Err(self.error("expected a type")),
        }
    }

    /// A local declaration starts with a primitive type or with `Ident Ident`.
    fn at_local_decl(&self) -> bool {
        match (self.peek(), self.peek_at(1)) {
            (Some(Token::Int), _) | (Some(Token::Boolean), _) => true,
            (Some(Token::Ident(_)), Some(Token::Ident(_))) => true,
            _ => false,
        }
    }

    fn method_decl(&mut self) -> Result<MethodDecl, CompileError> {
        self.expect(Token::Public)?;
        let ret_ty = self.type_name()?;
        let name = self.ident()?;
        self.expect(Token::LParen)?;
        let mut params = Vec::new();
        if !self.at(&Token::RParen) {
            loop {
                let ty = self.type_name()?;
                let name = self.ident()?;
                params.push(Param { ty, name });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;

        let mut locals = Vec::new();
        while self.at_local_decl() {
            locals.push(self.var_decl()?);
        }
        let mut body = Vec::new();
        while !self.at(&Token::Return) {
            if self.peek().is_none() {
                return Err(self.error("expected 'return'"));
            }
            body.push(self.statement()?);
        }
        self.expect(Token::Return)?;
        let ret = self.expression()?;
        self.expect(Token::Semicolon)?;
        self.expect(Token::RBrace)?;

        Ok(MethodDecl {
            ret_ty,
            name,
            params,
            locals,
            body,
            ret,
        })
    }

    // ── Statements ───────────────────────────────────────────────────

    fn statement(&mut self) -> Result<Stmt, CompileError> {
        match self.peek() {
            Some(Token::LBrace) => {
                self.pos += 1;
                let mut stmts = Vec::new();
                while !self.eat(&Token::RBrace) {
                    if self.peek().is_none() {
                        return Err(self.error("expected '}'"));
                    }
                    stmts.push(self.statement()?);
                }
                Ok(Stmt::Block(stmts))
            }
            Some(Token::If) => {
                self.pos += 1;
                let id = self.node_id();
                self.expect(Token::LParen)?;
                let condition = self.expression()?;
                self.expect(Token::RParen)?;
                let then_branch = Box::new(self.statement()?);
                let else_branch = if self.eat(&Token::Else) {
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    id,
                    condition,
                    then_branch,
                    else_branch,
                })
            }
            Some(Token::While) => {
                self.pos += 1;
                let id = self.node_id();
                self.expect(Token::LParen)?;
                let condition = self.expression()?;
                self.expect(Token::RParen)?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::While {
                    id,
                    condition,
                    body,
                })
            }
            Some(Token::Println) => {
                self.pos += 1;
                self.expect(Token::LParen)?;
                let value = self.expression()?;
                self.expect(Token::RParen)?;
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Print(value))
            }
            _ => {
                let expr = self.expression()?;
                self.expect(Token::Semicolon)?;
                Ok(Stmt::Expr(expr))
            }
        }
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn expression(&mut self) -> Result<Expr, CompileError> {
        let target = self.binary(0)?;
        if !self.at(&Token::Assign) {
            return Ok(target);
        }
        match target {
            Expr::Var(_) | Expr::Member { .. } | Expr::Index { .. } => {
                self.pos += 1;
                let value = self.expression()?;
                Ok(Expr::assign(target, value))
            }
            _ => Err(self.error("invalid assignment target")),
        }
    }

    /// Precedence climbing over the binary operator table, loosest level first.
    fn binary(&mut self, level: usize) -> Result<Expr, CompileError> {
        if level == LEVELS {
            return self.unary();
        }
        let mut left = self.binary(level + 1)?;
        while let Some(op) = self.peek().and_then(|t| binop_at(level, t)) {
            self.pos += 1;
            let right = self.binary(level + 1)?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Minus) {
            let operand = self.unary()?;
            return Ok(Expr::binary(BinOp::Sub, Expr::IntLit(0), operand));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::LBracket) {
                let index = self.expression()?;
                self.expect(Token::RBracket)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(&Token::Dot) {
                let name = self.ident()?;
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if !self.at(&Token::RParen) {
                        loop {
                            args.push(self.expression()?);
                            if !self.eat(&Token::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(Token::RParen)?;
                    expr = Expr::Call {
                        target: Box::new(expr),
                        method: name,
                        args,
                    };
                } else {
                    expr = Expr::Member {
                        target: Box::new(expr),
                        member: name,
                    };
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(Expr::IntLit(n)),
            Some(Token::True) => Ok(Expr::BoolLit(true)),
            Some(Token::False) => Ok(Expr::BoolLit(false)),
            Some(Token::This) => Ok(Expr::This),
            Some(Token::Ident(name)) => Ok(Expr::Var(name)),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::New) => {
                if self.eat(&Token::Int) {
                    self.expect(Token::LBracket)?;
                    let size = self.expression()?;
                    self.expect(Token::RBracket)?;
                    Ok(Expr::NewIntArray(Box::new(size)))
                } else {
                    let class = self.ident()?;
                    self.expect(Token::LParen)?;
                    self.expect(Token::RParen)?;
                    Ok(Expr::NewObject(class))
                }
            }
            Some(_) => {
                self.pos -= 1;
                Err(self.error("expected an expression"))
            }
            None => Err(self.error("expected an expression")),
        }
    }
}

/// Number of binary precedence levels, from `||` (0) to `* / %` (5).
const LEVELS: usize = 6;

fn binop_at(level: usize, token: &Token) -> Option<BinOp> {
    let op = match (level, token) {
        (0, Token::OrOr) => BinOp::Or,
        (1, Token::AndAnd) => BinOp::And,
        (2, Token::Eq) => BinOp::Eq,
        (2, Token::Neq) => BinOp::Ne,
        (3, Token::Lt) => BinOp::Lt,
        (3, Token::Le) => BinOp::Le,
        (3, Token::Gt) => BinOp::Gt,
        (3, Token::Ge) => BinOp::Ge,
        (4, Token::Plus) => BinOp::Add,
        (4, Token::Minus) => BinOp::Sub,
        (5, Token::Mul) => BinOp::Mul,
        (5, Token::Div) => BinOp::Div,
        (5, Token::Mod) => BinOp::Mod,
        _ => return None,
    };
    Some(op)
}
