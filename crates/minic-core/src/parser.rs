//! Recursive-descent parser.
//!
//! Consumes the token stream and produces the AST. Expressions use
//! precedence climbing over the C operator table; statements and
//! declarations are parsed by one function each, with `expect` enforcing
//! the grammar and reporting `expected .., got ..` on violation.

use crate::ast::*;
use crate::diagnostics::{err, CompileError, ErrorKind};
use crate::lexer::{Token, TokenKind};
use crate::span::Span;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parse a full translation unit: struct declarations, prototypes, function
/// definitions and global variables, in source order.
pub fn parse(tokens: Vec<Token>) -> Result<Vec<Stmt>, CompileError> {
    Parser { tokens, pos: 0 }.translation_unit()
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_else(|| {
                self.tokens
                    .last()
                    .map(|t| t.span)
                    .unwrap_or_else(Span::dummy)
            })
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        match self.peek() {
            Some(k) if *k == kind => Ok(self.advance().unwrap()),
            Some(k) => err(
                ErrorKind::ExpectedToken {
                    expected: kind.to_string(),
                    got: k.to_string(),
                },
                self.span(),
            ),
            None => err(
                ErrorKind::ExpectedToken {
                    expected: kind.to_string(),
                    got: "end of input".to_string(),
                },
                self.span(),
            ),
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), CompileError> {
        let span = self.span();
        match self.advance().map(|t| t.kind) {
            Some(TokenKind::Ident(name)) => Ok((name, span)),
            Some(other) => err(
                ErrorKind::ExpectedToken {
                    expected: "identifier".to_string(),
                    got: other.to_string(),
                },
                span,
            ),
            None => err(
                ErrorKind::ExpectedToken {
                    expected: "identifier".to_string(),
                    got: "end of input".to_string(),
                },
                span,
            ),
        }
    }

    fn unexpected<T>(&mut self) -> Result<T, CompileError> {
        let span = self.span();
        let got = self
            .peek()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "end of input".to_string());
        err(ErrorKind::UnexpectedToken(got), span)
    }

    // ----- declarations -----

    fn translation_unit(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        while self.peek().is_some() {
            stmts.push(self.top_level_decl()?);
        }
        Ok(stmts)
    }

    fn top_level_decl(&mut self) -> Result<Stmt, CompileError> {
        // `struct S { .. };` is a type declaration; `struct S name ..` is a
        // variable of struct type, handled by the common decl path.
        if self.at(&TokenKind::KwStruct) && matches!(self.peek_at(2), Some(TokenKind::LBrace)) {
            return self.struct_decl();
        }
        let span = self.span();
        let (ty, type_name, ptr_depth) = self.parse_type()?;
        let (name, _) = self.expect_ident()?;

        if self.at(&TokenKind::LParen) {
            return self.fn_decl(ty, ptr_depth, name, span);
        }
        let decl = self.finish_decl(ty, type_name, ptr_depth, name, span)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(match decl {
            Decl::Var(v) => Stmt::new(StmtKind::VarDecl(v), span),
            Decl::Array(a) => Stmt::new(StmtKind::ArrayDecl(a), span),
        })
    }

    fn struct_decl(&mut self) -> Result<Stmt, CompileError> {
        let span = self.span();
        self.expect(TokenKind::KwStruct)?;
        let (name, _) = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let fspan = self.span();
            let (ty, type_name, ptr_depth) = self.parse_type()?;
            let (fname, _) = self.expect_ident()?;
            fields.push(self.finish_decl(ty, type_name, ptr_depth, fname, fspan)?);
            self.expect(TokenKind::Semicolon)?;
        }
        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::new(
            StmtKind::StructDecl(StructDecl { name, fields, span }),
            span,
        ))
    }

    /// `type "*"*`; `struct S` yields `(Struct, Some("S"), ..)`.
    fn parse_type(&mut self) -> Result<(DataType, Option<String>, u16), CompileError> {
        let (ty, type_name) = match self.peek() {
            Some(TokenKind::KwVoid) => (DataType::Void, None),
            Some(TokenKind::KwInt) => (DataType::Int, None),
            Some(TokenKind::KwChar) => (DataType::Char, None),
            Some(TokenKind::KwFloat) => (DataType::Float, None),
            Some(TokenKind::KwBool) => (DataType::Bool, None),
            Some(TokenKind::KwStruct) => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                let mut depth = 0u16;
                while self.eat(&TokenKind::Star) {
                    depth += 1;
                }
                return Ok((DataType::Struct, Some(name), depth));
            }
            _ => return self.unexpected(),
        };
        self.advance();
        let mut depth = 0u16;
        while self.eat(&TokenKind::Star) {
            depth += 1;
        }
        Ok((ty, type_name, depth))
    }

    fn is_type_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                TokenKind::KwVoid
                    | TokenKind::KwInt
                    | TokenKind::KwChar
                    | TokenKind::KwFloat
                    | TokenKind::KwBool
                    | TokenKind::KwStruct
            )
        )
    }

    /// Array suffix + optional initializer after `type name` has been read.
    fn finish_decl(
        &mut self,
        ty: DataType,
        type_name: Option<String>,
        ptr_depth: u16,
        name: String,
        span: Span,
    ) -> Result<Decl, CompileError> {
        if self.at(&TokenKind::LBracket) {
            let mut dims = Vec::new();
            while self.eat(&TokenKind::LBracket) {
                let dspan = self.span();
                match self.advance().map(|t| t.kind) {
                    Some(TokenKind::Int(v)) => dims.push(v),
                    Some(other) => {
                        return err(
                            ErrorKind::ExpectedToken {
                                expected: "integer literal".to_string(),
                                got: other.to_string(),
                            },
                            dspan,
                        )
                    }
                    None => {
                        return err(
                            ErrorKind::ExpectedToken {
                                expected: "integer literal".to_string(),
                                got: "end of input".to_string(),
                            },
                            dspan,
                        )
                    }
                }
                self.expect(TokenKind::RBracket)?;
            }
            return Ok(Decl::Array(ArrayDecl {
                ty,
                type_name,
                name,
                dims,
                ptr_depth,
                span,
            }));
        }
        let init = if self.eat(&TokenKind::Assign) {
            Some(self.expr()?)
        } else {
            None
        };
        Ok(Decl::Var(VarDecl {
            ty,
            type_name,
            name,
            ptr_depth,
            init,
            span,
        }))
    }

    fn fn_decl(
        &mut self,
        ret_ty: DataType,
        ptr_depth: u16,
        name: String,
        span: Span,
    ) -> Result<Stmt, CompileError> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let aspan = self.span();
                let (ty, type_name, depth) = self.parse_type()?;
                let (aname, _) = self.expect_ident()?;
                args.push(self.finish_decl(ty, type_name, depth, aname, aspan)?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;

        let body = if self.eat(&TokenKind::Semicolon) {
            None // prototype
        } else {
            Some(self.block()?)
        };
        Ok(Stmt::new(
            StmtKind::FnDecl(FnDecl {
                ret_ty,
                ptr_depth,
                name,
                args,
                body,
                span,
            }),
            span,
        ))
    }

    // ----- statements -----

    fn block(&mut self) -> Result<Block, CompileError> {
        let span = self.span();
        self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.peek().is_none() {
                return self.unexpected();
            }
            stmts.push(self.stmt()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block::new(stmts, span))
    }

    /// A loop or branch body: either a braced block or a single statement
    /// wrapped into one, so bodies are uniformly compound.
    fn body(&mut self) -> Result<Block, CompileError> {
        if self.at(&TokenKind::LBrace) {
            self.block()
        } else {
            let span = self.span();
            let stmt = self.stmt()?;
            Ok(Block::new(vec![stmt], span))
        }
    }

    fn stmt(&mut self) -> Result<Stmt, CompileError> {
        let span = self.span();
        match self.peek() {
            Some(TokenKind::LBrace) => {
                let block = self.block()?;
                Ok(Stmt::new(StmtKind::Compound(block), span))
            }
            Some(TokenKind::KwIf) => self.if_stmt(),
            Some(TokenKind::KwFor) => self.for_stmt(),
            Some(TokenKind::KwWhile) => self.while_stmt(),
            Some(TokenKind::KwDo) => self.do_while_stmt(),
            Some(TokenKind::KwReturn) => {
                self.advance();
                let value = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expr()?)
                };
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::new(StmtKind::Return { value }, span))
            }
            Some(TokenKind::KwBreak) => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::new(StmtKind::Break, span))
            }
            Some(TokenKind::KwContinue) => {
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::new(StmtKind::Continue, span))
            }
            Some(_) if self.is_type_start() => {
                // Local struct type declarations are not part of the grammar.
                let stmt = self.local_decl()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(stmt)
            }
            Some(_) => {
                let e = self.expr()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::new(StmtKind::Expr(e), span))
            }
            None => self.unexpected(),
        }
    }

    fn local_decl(&mut self) -> Result<Stmt, CompileError> {
        let span = self.span();
        let (ty, type_name, ptr_depth) = self.parse_type()?;
        let (name, _) = self.expect_ident()?;
        Ok(match self.finish_decl(ty, type_name, ptr_depth, name, span)? {
            Decl::Var(v) => Stmt::new(StmtKind::VarDecl(v), span),
            Decl::Array(a) => Stmt::new(StmtKind::ArrayDecl(a), span),
        })
    }

    fn if_stmt(&mut self) -> Result<Stmt, CompileError> {
        let span = self.span();
        self.expect(TokenKind::KwIf)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        let then_body = self.body()?;
        let else_body = if self.eat(&TokenKind::KwElse) {
            Some(self.body()?)
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                cond,
                then_body,
                else_body,
            },
            span,
        ))
    }

    fn for_stmt(&mut self) -> Result<Stmt, CompileError> {
        let span = self.span();
        self.expect(TokenKind::KwFor)?;
        self.expect(TokenKind::LParen)?;

        // Range form: `for (T x : arr)`.
        if self.is_type_start() {
            if let (Some(TokenKind::Ident(_)), Some(TokenKind::Colon)) =
                (self.peek_at(1), self.peek_at(2))
            {
                let (ty, _, _) = self.parse_type()?;
                let (name, _) = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let (array, _) = self.expect_ident()?;
                self.expect(TokenKind::RParen)?;
                let body = self.body()?;
                return Ok(Stmt::new(
                    StmtKind::ForRange {
                        ty,
                        name,
                        array,
                        body,
                    },
                    span,
                ));
            }
        }

        let init = if self.eat(&TokenKind::Semicolon) {
            None
        } else if self.is_type_start() {
            let d = self.local_decl()?;
            self.expect(TokenKind::Semicolon)?;
            Some(Box::new(d))
        } else {
            let espan = self.span();
            let e = self.expr()?;
            self.expect(TokenKind::Semicolon)?;
            Some(Box::new(Stmt::new(StmtKind::Expr(e), espan)))
        };

        let cond = if self.at(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.expr()?)
        };
        self.expect(TokenKind::Semicolon)?;

        let step = if self.at(&TokenKind::RParen) {
            None
        } else {
            Some(self.expr()?)
        };
        self.expect(TokenKind::RParen)?;

        let body = self.body()?;
        Ok(Stmt::new(
            StmtKind::For {
                init,
                cond,
                step,
                body,
            },
            span,
        ))
    }

    fn while_stmt(&mut self) -> Result<Stmt, CompileError> {
        let span = self.span();
        self.expect(TokenKind::KwWhile)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        let body = self.body()?;
        Ok(Stmt::new(StmtKind::While { cond, body }, span))
    }

    fn do_while_stmt(&mut self) -> Result<Stmt, CompileError> {
        let span = self.span();
        self.expect(TokenKind::KwDo)?;
        let body = self.body()?;
        self.expect(TokenKind::KwWhile)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Stmt::new(StmtKind::DoWhile { body, cond }, span))
    }

    // ----- expressions -----

    fn expr(&mut self) -> Result<Expr, CompileError> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<Expr, CompileError> {
        let lhs = self.binary(0)?;
        let op = match self.peek() {
            Some(TokenKind::Assign) => BinOp::Assign,
            Some(TokenKind::PlusAssign) => BinOp::AddAssign,
            Some(TokenKind::MinusAssign) => BinOp::SubAssign,
            Some(TokenKind::StarAssign) => BinOp::MulAssign,
            Some(TokenKind::SlashAssign) => BinOp::DivAssign,
            Some(TokenKind::PercentAssign) => BinOp::ModAssign,
            Some(TokenKind::AmpAssign) => BinOp::BitAndAssign,
            Some(TokenKind::PipeAssign) => BinOp::BitOrAssign,
            Some(TokenKind::CaretAssign) => BinOp::BitXorAssign,
            Some(TokenKind::ShlAssign) => BinOp::ShlAssign,
            Some(TokenKind::ShrAssign) => BinOp::ShrAssign,
            _ => return Ok(lhs),
        };
        let span = self.span();
        self.advance();
        // Right-associative.
        let rhs = self.assignment()?;
        Ok(Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        ))
    }

    fn binop_at(&self, min_prec: u8) -> Option<(BinOp, u8)> {
        let (op, prec) = match self.peek()? {
            TokenKind::OrOr => (BinOp::Or, 1),
            TokenKind::AndAnd => (BinOp::And, 2),
            TokenKind::Pipe => (BinOp::BitOr, 3),
            TokenKind::Caret => (BinOp::BitXor, 4),
            TokenKind::Amp => (BinOp::BitAnd, 5),
            TokenKind::Eq => (BinOp::Eq, 6),
            TokenKind::Ne => (BinOp::Ne, 6),
            TokenKind::Lt => (BinOp::Lt, 7),
            TokenKind::Gt => (BinOp::Gt, 7),
            TokenKind::Le => (BinOp::Le, 7),
            TokenKind::Ge => (BinOp::Ge, 7),
            TokenKind::Shl => (BinOp::Shl, 8),
            TokenKind::Shr => (BinOp::Shr, 8),
            TokenKind::Plus => (BinOp::Add, 9),
            TokenKind::Minus => (BinOp::Sub, 9),
            TokenKind::Star => (BinOp::Mul, 10),
            TokenKind::Slash => (BinOp::Div, 10),
            TokenKind::Percent => (BinOp::Mod, 10),
            _ => return None,
        };
        (prec >= min_prec).then_some((op, prec))
    }

    /// Precedence climbing; all listed operators are left-associative.
    fn binary(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let mut lhs = self.unary()?;
        while let Some((op, prec)) = self.binop_at(min_prec) {
            let span = self.span();
            self.advance();
            let rhs = self.binary(prec + 1)?;
            lhs = Expr::new(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, CompileError> {
        let span = self.span();
        let op = match self.peek() {
            Some(TokenKind::Inc) => Some(UnOp::Inc),
            Some(TokenKind::Dec) => Some(UnOp::Dec),
            Some(TokenKind::Amp) => Some(UnOp::AddrOf),
            Some(TokenKind::Star) => Some(UnOp::Deref),
            Some(TokenKind::Minus) => {
                // A negated literal folds into the literal; everything else
                // desugars to `0 - x`, there is no negate operator further
                // down the pipeline.
                self.advance();
                let operand = self.unary()?;
                return Ok(match operand.kind {
                    ExprKind::Int(v) => Expr::new(ExprKind::Int(-v), span),
                    ExprKind::Float(v) => Expr::new(ExprKind::Float(-v), span),
                    _ => Expr::new(
                        ExprKind::Binary {
                            op: BinOp::Sub,
                            lhs: Box::new(Expr::new(ExprKind::Int(0), span)),
                            rhs: Box::new(operand),
                        },
                        span,
                    ),
                });
            }
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    postfix: false,
                    operand: Box::new(operand),
                },
                span,
            ));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, CompileError> {
        let mut e = self.primary()?;
        loop {
            let span = self.span();
            match self.peek() {
                Some(TokenKind::Inc) => {
                    self.advance();
                    e = Expr::new(
                        ExprKind::Unary {
                            op: UnOp::Inc,
                            postfix: true,
                            operand: Box::new(e),
                        },
                        span,
                    );
                }
                Some(TokenKind::Dec) => {
                    self.advance();
                    e = Expr::new(
                        ExprKind::Unary {
                            op: UnOp::Dec,
                            postfix: true,
                            operand: Box::new(e),
                        },
                        span,
                    );
                }
                _ => return Ok(e),
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, CompileError> {
        let span = self.span();
        match self.peek().cloned() {
            Some(TokenKind::Int(v)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Int(v), span))
            }
            Some(TokenKind::Float(v)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Float(v), span))
            }
            Some(TokenKind::Char(c)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Char(c), span))
            }
            Some(TokenKind::Str(s)) => {
                self.advance();
                Ok(Expr::new(ExprKind::Str(s), span))
            }
            Some(TokenKind::True) => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(true), span))
            }
            Some(TokenKind::False) => {
                self.advance();
                Ok(Expr::new(ExprKind::Bool(false), span))
            }
            Some(TokenKind::LParen) => {
                self.advance();
                let e = self.expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            Some(TokenKind::Ident(name)) => {
                self.advance();
                match self.peek() {
                    Some(TokenKind::LParen) => {
                        self.advance();
                        let mut args = Vec::new();
                        if !self.at(&TokenKind::RParen) {
                            loop {
                                args.push(self.expr()?);
                                if !self.eat(&TokenKind::Comma) {
                                    break;
                                }
                            }
                        }
                        self.expect(TokenKind::RParen)?;
                        Ok(Expr::new(ExprKind::Call { name, args }, span))
                    }
                    Some(TokenKind::LBracket) => {
                        let mut indices = Vec::new();
                        while self.eat(&TokenKind::LBracket) {
                            indices.push(self.expr()?);
                            self.expect(TokenKind::RBracket)?;
                        }
                        Ok(Expr::new(ExprKind::ArrayAccess { name, indices }, span))
                    }
                    Some(TokenKind::Dot) => {
                        self.advance();
                        let (field, _) = self.expect_ident()?;
                        Ok(Expr::new(
                            ExprKind::Member {
                                object: name,
                                field,
                            },
                            span,
                        ))
                    }
                    _ => Ok(Expr::new(ExprKind::Symbol(name), span)),
                }
            }
            _ => self.unexpected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(src: &str) -> Vec<Stmt> {
        parse(tokenize(src).unwrap()).unwrap()
    }

    fn parse_err(src: &str) -> CompileError {
        match tokenize(src).map(parse) {
            Ok(Err(e)) => e,
            Err(e) => e,
            Ok(Ok(_)) => panic!("expected parse error for {src:?}"),
        }
    }

    #[test]
    fn function_with_body_and_prototype() {
        let unit = parse_src("int f(int a); int f(int a) { return a; }");
        assert_eq!(unit.len(), 2);
        match (&unit[0].kind, &unit[1].kind) {
            (StmtKind::FnDecl(proto), StmtKind::FnDecl(def)) => {
                assert!(proto.body.is_none());
                assert!(def.body.is_some());
                assert_eq!(def.args.len(), 1);
            }
            other => panic!("unexpected kinds: {other:?}"),
        }
    }

    #[test]
    fn precedence_mul_binds_tighter_than_add() {
        let unit = parse_src("int f() { return 1 + 2 * 3; }");
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        let StmtKind::Return { value: Some(e) } = &f.body.as_ref().unwrap().stmts[0].kind else {
            panic!()
        };
        let ExprKind::Binary { op, rhs, .. } = &e.kind else {
            panic!()
        };
        assert_eq!(*op, BinOp::Add);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary { op: BinOp::Mul, .. }
        ));
    }

    #[test]
    fn assignment_is_right_associative() {
        let unit = parse_src("void f() { int a; int b; a = b = 1; }");
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        let StmtKind::Expr(e) = &f.body.as_ref().unwrap().stmts[2].kind else {
            panic!()
        };
        let ExprKind::Binary { op, rhs, .. } = &e.kind else {
            panic!()
        };
        assert_eq!(*op, BinOp::Assign);
        assert!(matches!(
            rhs.kind,
            ExprKind::Binary {
                op: BinOp::Assign,
                ..
            }
        ));
    }

    #[test]
    fn unary_minus_becomes_zero_minus() {
        let unit = parse_src("int f(int x) { return -x; }");
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        let StmtKind::Return { value: Some(e) } = &f.body.as_ref().unwrap().stmts[0].kind else {
            panic!()
        };
        let ExprKind::Binary { op, lhs, .. } = &e.kind else {
            panic!()
        };
        assert_eq!(*op, BinOp::Sub);
        assert!(matches!(lhs.kind, ExprKind::Int(0)));
    }

    #[test]
    fn array_decl_requires_literal_dimensions() {
        let e = parse_err("void f() { int a[n]; }");
        assert!(matches!(e.kind, ErrorKind::ExpectedToken { .. }));
    }

    #[test]
    fn multi_dimension_array_and_access() {
        let unit = parse_src("void f() { int m[2][3]; m[1][2] = 5; }");
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        let body = f.body.as_ref().unwrap();
        let StmtKind::ArrayDecl(a) = &body.stmts[0].kind else {
            panic!()
        };
        assert_eq!(a.dims, vec![2, 3]);
        let StmtKind::Expr(e) = &body.stmts[1].kind else {
            panic!()
        };
        let ExprKind::Binary { lhs, .. } = &e.kind else {
            panic!()
        };
        assert!(matches!(
            &lhs.kind,
            ExprKind::ArrayAccess { indices, .. } if indices.len() == 2
        ));
    }

    #[test]
    fn range_for_parses() {
        let unit = parse_src("void f() { int a[4]; for (int x : a) { x; } }");
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        assert!(matches!(
            f.body.as_ref().unwrap().stmts[1].kind,
            StmtKind::ForRange { .. }
        ));
    }

    #[test]
    fn struct_decl_and_member_access() {
        let unit = parse_src("struct P { int x; int y; }; void f() { struct P p; p.x = 1; }");
        assert!(matches!(unit[0].kind, StmtKind::StructDecl(_)));
        let StmtKind::FnDecl(f) = &unit[1].kind else {
            panic!()
        };
        let body = f.body.as_ref().unwrap();
        assert!(matches!(&body.stmts[0].kind, StmtKind::VarDecl(v)
            if v.ty == DataType::Struct && v.type_name.as_deref() == Some("P")));
        let StmtKind::Expr(e) = &body.stmts[1].kind else {
            panic!()
        };
        let ExprKind::Binary { lhs, .. } = &e.kind else {
            panic!()
        };
        assert!(matches!(&lhs.kind, ExprKind::Member { .. }));
    }

    #[test]
    fn dangling_else_attaches_to_inner_if() {
        let unit = parse_src("void f(int a) { if (a) if (a) a = 1; else a = 2; }");
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        let StmtKind::If {
            then_body,
            else_body,
            ..
        } = &f.body.as_ref().unwrap().stmts[0].kind
        else {
            panic!()
        };
        assert!(else_body.is_none());
        assert!(matches!(
            then_body.stmts[0].kind,
            StmtKind::If {
                else_body: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let e = parse_err("int f() { return 1 }");
        assert!(matches!(
            e.kind,
            ErrorKind::ExpectedToken { ref expected, .. } if expected == ";"
        ));
    }

    #[test]
    fn for_with_empty_sections() {
        let unit = parse_src("void f() { for (;;) { break; } }");
        let StmtKind::FnDecl(f) = &unit[0].kind else {
            panic!()
        };
        let StmtKind::For {
            init, cond, step, ..
        } = &f.body.as_ref().unwrap().stmts[0].kind
        else {
            panic!()
        };
        assert!(init.is_none() && cond.is_none() && step.is_none());
    }
}
