// ABOUTME: Static resolver — computes lexical scope depth for every variable
// ABOUTME: reference ahead of evaluation

use crate::ast::{Expr, ExprKind, FunctionDecl, NodeId, Stmt};
use crate::error::Diagnostics;
use crate::token::Token;
use std::collections::HashMap;

/// Tracks whether the code currently being resolved sits inside a function
/// body, so a stray `return` at top level can be rejected.
#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
}

/// Keyed by `Expr::id` (only `Variable` and `Assign` nodes are ever
/// inserted); valued by the number of enclosing environment frames to walk
/// at evaluation time. Absent means "resolve against the global environment".
pub type ResolutionTable = HashMap<NodeId, usize>;

pub struct Resolver<'a> {
    scopes: Vec<HashMap<String, bool>>,
    resolution: ResolutionTable,
    current_function: FunctionType,
    diagnostics: &'a mut Diagnostics,
}

impl<'a> Resolver<'a> {
    pub fn new(diagnostics: &'a mut Diagnostics) -> Self {
        Resolver {
            scopes: Vec::new(),
            resolution: HashMap::new(),
            current_function: FunctionType::None,
            diagnostics,
        }
    }

    pub fn resolve(mut self, statements: &[Stmt]) -> ResolutionTable {
        self.resolve_stmts(statements);
        self.resolution
    }

    fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for stmt in statements {
            self.resolve_stmt(stmt);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                self.diagnostics.error_at_token(
                    name,
                    "Already a variable with this name in this scope.",
                );
            }
            scope.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    /// Walks the scope stack innermost-out; on the first match at index `i`,
    /// records depth = (top - i) keyed by this expression's id. No match
    /// leaves the expression unresolved, deferring to the global environment.
    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        for (i, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.resolution.insert(id, i);
                return;
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(statements) => {
                self.begin_scope();
                self.resolve_stmts(statements);
                self.end_scope();
            }
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Function(decl) => {
                // Declare+define eagerly so the function can recurse.
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }
            Stmt::Expression(expr) => self.resolve_expr(expr),
            Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.diagnostics
                        .error_at_token(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Variable { name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        self.diagnostics.error_at_token(
                            name,
                            "Can't read local variable in its own initializer.",
                        );
                    }
                }
                self.resolve_local(expr.id, name);
            }
            ExprKind::Assign { name, value } => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, name);
            }
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand),
            ExprKind::Grouping(inner) => self.resolve_expr(inner),
            ExprKind::Call { callee, args, .. } => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Literal(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn resolve(src: &str) -> (ResolutionTable, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = Lexer::new(src).scan(&mut diagnostics);
        let stmts = Parser::new(tokens, &mut diagnostics).parse();
        let table = Resolver::new(&mut diagnostics).resolve(&stmts);
        (table, diagnostics)
    }

    #[test]
    fn global_reference_is_left_unresolved() {
        let (table, diagnostics) = resolve(
            r#"
            var a = "global";
            {
                fun showA() { print a; }
                showA();
                var a = "block";
                showA();
            }
            "#,
        );
        assert!(!diagnostics.had_error());
        // `a` inside showA's body is read before the block's own `a` is even
        // declared, so it must resolve globally (no table entry) rather than
        // to the later block-scoped `a`.
        assert!(table.is_empty());
    }

    #[test]
    fn local_variable_resolves_to_its_enclosing_depth() {
        let (table, diagnostics) = resolve("{ var a = 1; { print a; } }");
        assert!(!diagnostics.had_error());
        assert_eq!(table.len(), 1);
        // `a` is declared one block out from where it is printed.
        assert_eq!(*table.values().next().unwrap(), 1);
    }

    #[test]
    fn self_initializer_is_a_resolve_error() {
        let (_table, diagnostics) = resolve("{ var a = a; }");
        assert!(diagnostics.had_error());
        assert!(diagnostics.errors()[0]
            .message
            .contains("own initializer"));
    }

    #[test]
    fn duplicate_declaration_in_block_scope_is_an_error() {
        let (_table, diagnostics) = resolve("{ var x = 1; var x = 2; }");
        assert!(diagnostics.had_error());
        assert!(diagnostics.errors()[0]
            .message
            .contains("Already a variable"));
    }

    #[test]
    fn top_level_return_is_an_error() {
        let (_table, diagnostics) = resolve("return 1;");
        assert!(diagnostics.had_error());
        assert!(diagnostics.errors()[0]
            .message
            .contains("top-level code"));
    }

    #[test]
    fn return_inside_function_is_fine() {
        let (_table, diagnostics) = resolve("fun f() { return 1; }");
        assert!(!diagnostics.had_error());
    }
}
