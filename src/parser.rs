// ABOUTME: Recursive-descent parser — tokens to AST, with for-desugaring and
// ABOUTME: panic-mode error recovery

use crate::ast::{Expr, ExprKind, FunctionDecl, LiteralValue, NodeId, Stmt};
use crate::error::Diagnostics;
use crate::token::{Literal, Token, TokenKind};
use std::rc::Rc;

const MAX_PARAMS: usize = 255;
const MAX_ARGS: usize = 255;

/// A parse error used only to unwind out of the current rule, up to
/// `declaration`, for panic-mode synchronization. The diagnostic itself has
/// already been recorded in `Diagnostics` by the time this is thrown.
struct ParseError;

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    tokens: Vec<Token>,
    current: usize,
    next_id: u32,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, diagnostics: &'a mut Diagnostics) -> Self {
        Parser {
            tokens,
            current: 0,
            next_id: 0,
            diagnostics,
        }
    }

    pub fn parse(mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(ParseError) => self.synchronize(),
            }
        }
        statements
    }

    fn fresh_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn expr(&mut self, kind: ExprKind) -> Expr {
        Expr {
            id: self.fresh_id(),
            kind,
        }
    }

    // ----- token stream primitives -----

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn match_any(&mut self, kinds: &[TokenKind]) -> bool {
        for &kind in kinds {
            if self.check(kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(&self.peek().clone(), message))
        }
    }

    fn error(&mut self, token: &Token, message: &str) -> ParseError {
        self.diagnostics.error_at_token(token, message);
        ParseError
    }

    /// Discard tokens until a statement boundary, per the panic-mode recovery
    /// rule: stop just after a `;`, or when the next token starts a new
    /// statement-level construct.
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            use TokenKind::*;
            match self.peek().kind {
                Class | Fun | Var | For | If | While | Print | Return => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ----- declarations -----

    fn declaration(&mut self) -> ParseResult<Stmt> {
        if self.match_any(&[TokenKind::Var]) {
            self.var_declaration()
        } else if self.match_any(&[TokenKind::Fun]) {
            self.function_declaration("function")
        } else {
            self.statement()
        }
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        let initializer = if self.match_any(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Stmt::Var { name, initializer })
    }

    fn function_declaration(&mut self, kind: &str) -> ParseResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {kind} name."))?;
        self.consume(
            TokenKind::LeftParen,
            &format!("Expect '(' after {kind} name."),
        )?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_PARAMS {
                    let tok = self.peek().clone();
                    self.error(&tok, "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_any(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(
            TokenKind::LeftBrace,
            &format!("Expect '{{' before {kind} body."),
        )?;
        let body = self.block()?;
        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    // ----- statements -----

    fn statement(&mut self) -> ParseResult<Stmt> {
        if self.match_any(&[TokenKind::Print]) {
            self.print_statement()
        } else if self.match_any(&[TokenKind::If]) {
            self.if_statement()
        } else if self.match_any(&[TokenKind::While]) {
            self.while_statement()
        } else if self.match_any(&[TokenKind::For]) {
            self.for_statement()
        } else if self.match_any(&[TokenKind::Return]) {
            self.return_statement()
        } else if self.match_any(&[TokenKind::LeftBrace]) {
            Ok(Stmt::Block(self.block()?))
        } else {
            self.expression_statement()
        }
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(value))
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(ParseError) => self.synchronize(),
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_any(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    /// Desugars `for (init; cond; incr) body` into
    /// `{ init; while (cond) { body; incr; } }` at parse time — there is no
    /// distinct loop AST node for `for`.
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_any(&[TokenKind::Semicolon]) {
            None
        } else if self.match_any(&[TokenKind::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or_else(|| {
            self.expr(ExprKind::Literal(LiteralValue::Bool(true)))
        });
        body = Stmt::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    // ----- expressions -----

    fn expression(&mut self) -> ParseResult<Expr> {
        self.assignment()
    }

    /// Parses an r-value with `logic_or`, then — if `=` follows — validates
    /// that the already-parsed left-hand side was a bare `Variable` before
    /// lowering to `Assign`.
    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.logic_or()?;

        if self.match_any(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;

            return match expr.kind {
                ExprKind::Variable { name } => {
                    Ok(self.expr(ExprKind::Assign {
                        name,
                        value: Box::new(value),
                    }))
                }
                _ => {
                    self.diagnostics
                        .error_at_token(&equals, "Invalid assignment target.");
                    Ok(expr)
                }
            };
        }

        Ok(expr)
    }

    fn logic_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.logic_and()?;
        while self.match_any(&[TokenKind::Or]) {
            let op = self.previous().clone();
            let right = self.logic_and()?;
            expr = self.expr(ExprKind::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;
        while self.match_any(&[TokenKind::And]) {
            let op = self.previous().clone();
            let right = self.equality()?;
            expr = self.expr(ExprKind::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;
        while self.match_any(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let op = self.previous().clone();
            let right = self.comparison()?;
            expr = self.expr(ExprKind::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;
        while self.match_any(&[
            TokenKind::Greater,
            TokenKind::GreaterEqual,
            TokenKind::Less,
            TokenKind::LessEqual,
        ]) {
            let op = self.previous().clone();
            let right = self.term()?;
            expr = self.expr(ExprKind::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;
        while self.match_any(&[TokenKind::Minus, TokenKind::Plus]) {
            let op = self.previous().clone();
            let right = self.factor()?;
            expr = self.expr(ExprKind::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;
        while self.match_any(&[TokenKind::Slash, TokenKind::Star]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            expr = self.expr(ExprKind::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_any(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous().clone();
            let operand = self.unary()?;
            return Ok(self.expr(ExprKind::Unary {
                op,
                operand: Box::new(operand),
            }));
        }
        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.match_any(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    let tok = self.peek().clone();
                    self.error(&tok, "Can't have more than 255 arguments.");
                }
                args.push(self.expression()?);
                if !self.match_any(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(self.expr(ExprKind::Call {
            callee: Box::new(callee),
            paren,
            args,
        }))
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        if self.match_any(&[TokenKind::False]) {
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Bool(false))));
        }
        if self.match_any(&[TokenKind::True]) {
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Bool(true))));
        }
        if self.match_any(&[TokenKind::Nil]) {
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Nil)));
        }
        if self.match_any(&[TokenKind::Number]) {
            let literal = self.previous().literal.clone();
            let n = match literal {
                Literal::Number(n) => n,
                _ => unreachable!("NUMBER token without a numeric literal"),
            };
            return Ok(self.expr(ExprKind::Literal(LiteralValue::Number(n))));
        }
        if self.match_any(&[TokenKind::String]) {
            let literal = self.previous().literal.clone();
            let s = match literal {
                Literal::String(s) => s,
                _ => unreachable!("STRING token without a string literal"),
            };
            return Ok(self.expr(ExprKind::Literal(LiteralValue::String(Rc::from(s.as_str())))));
        }
        if self.match_any(&[TokenKind::Identifier]) {
            let name = self.previous().clone();
            return Ok(self.expr(ExprKind::Variable { name }));
        }
        if self.match_any(&[TokenKind::LeftParen]) {
            let inner = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(self.expr(ExprKind::Grouping(Box::new(inner))));
        }

        let tok = self.peek().clone();
        Err(self.error(&tok, "Expect expression."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> (Vec<Stmt>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Lexer::new(src).scan(&mut diagnostics);
        let stmts = Parser::new(tokens, &mut diagnostics).parse();
        (stmts, diagnostics)
    }

    #[test]
    fn parses_var_declaration() {
        let (stmts, diagnostics) = parse("var x = 1;");
        assert!(!diagnostics.had_error());
        assert_eq!(stmts.len(), 1);
        matches!(stmts[0], Stmt::Var { .. });
    }

    #[test]
    fn desugars_for_into_block_and_while() {
        let (stmts, diagnostics) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(!diagnostics.had_error());
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Stmt::Block(inner) => {
                assert_eq!(inner.len(), 2);
                assert!(matches!(inner[0], Stmt::Var { .. }));
                match &inner[1] {
                    Stmt::While { body, .. } => match body.as_ref() {
                        Stmt::Block(loop_body) => assert_eq!(loop_body.len(), 2),
                        other => panic!("expected block body, got {other:?}"),
                    },
                    other => panic!("expected while, got {other:?}"),
                }
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn for_with_no_condition_desugars_to_true() {
        let (stmts, diagnostics) = parse("for (;;) print 1;");
        assert!(!diagnostics.had_error());
        match &stmts[0] {
            Stmt::While { condition, .. } => {
                assert!(matches!(
                    condition.kind,
                    ExprKind::Literal(LiteralValue::Bool(true))
                ));
            }
            other => panic!("expected while, got {other:?}"),
        }
    }

    #[test]
    fn invalid_assignment_target_reports_error_without_consuming() {
        let (_stmts, diagnostics) = parse("1 = 2;");
        assert!(diagnostics.had_error());
        assert!(diagnostics.errors()[0]
            .message
            .contains("Invalid assignment target"));
    }

    #[test]
    fn synchronizes_after_parse_error_to_report_later_statements() {
        let (_stmts, diagnostics) = parse("var = 1; var ok = 2;");
        // Both the broken declaration and nothing else should produce exactly
        // one error, and the parser should recover to parse `ok`.
        assert_eq!(diagnostics.errors().len(), 1);
    }
}
