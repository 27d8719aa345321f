// ABOUTME: Tree-walking evaluator — executes the resolved AST against a
// ABOUTME: chain of lexical environments

use crate::ast::{Expr, ExprKind, LiteralValue, Stmt};
use crate::env::Environment;
use crate::error::RuntimeError;
use crate::resolver::ResolutionTable;
use crate::token::{Token, TokenKind};
use crate::value::{Callable, Value};
use std::rc::Rc;

/// The result of executing a statement. `Return` is the dedicated channel
/// non-local `return` propagates through — not a Rust `Err`-based unwind —
/// so the normal statement-execution path pays no exceptional cost and the
/// "a function call just finished" event is explicit at every call site.
enum Signal {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: Rc<Environment>,
    resolution: ResolutionTable,
}

impl Interpreter {
    pub fn new(resolution: ResolutionTable) -> Self {
        Interpreter {
            globals: Environment::new(),
            resolution,
        }
    }

    /// Builds an interpreter over a caller-supplied global environment, so a
    /// REPL can thread the same globals across successive lines.
    pub fn with_globals(resolution: ResolutionTable, globals: Rc<Environment>) -> Self {
        Interpreter { globals, resolution }
    }

    pub fn globals(&self) -> &Rc<Environment> {
        &self.globals
    }

    /// Executes a whole program's top-level statements against the global
    /// environment. A runtime error aborts the current top-level execution.
    pub fn interpret(&self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        let globals = Rc::clone(&self.globals);
        for stmt in statements {
            self.execute(stmt, &globals)?;
        }
        Ok(())
    }

    fn execute(&self, stmt: &Stmt, env: &Rc<Environment>) -> Result<Signal, RuntimeError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr, env)?;
                Ok(Signal::Normal)
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr, env)?;
                println!("{}", value.stringify());
                Ok(Signal::Normal)
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };
                env.define(name.lexeme.clone(), value);
                Ok(Signal::Normal)
            }
            Stmt::Block(statements) => {
                let block_env = Environment::with_parent(Rc::clone(env));
                self.execute_block(statements, &block_env)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.execute(then_branch, env)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch, env)
                } else {
                    Ok(Signal::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition, env)?.is_truthy() {
                    match self.execute(body, env)? {
                        Signal::Normal => {}
                        signal @ Signal::Return(_) => return Ok(signal),
                    }
                }
                Ok(Signal::Normal)
            }
            Stmt::Function(decl) => {
                let callable = Callable::User {
                    declaration: Rc::clone(decl),
                    closure: Rc::clone(env),
                };
                env.define(decl.name.lexeme.clone(), Value::Callable(callable));
                Ok(Signal::Normal)
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr, env)?,
                    None => Value::Nil,
                };
                Ok(Signal::Return(value))
            }
        }
    }

    /// Executes a statement list in `env`, short-circuiting on the first
    /// `return`. Used for both block bodies and function call bodies.
    fn execute_block(&self, statements: &[Stmt], env: &Rc<Environment>) -> Result<Signal, RuntimeError> {
        for stmt in statements {
            match self.execute(stmt, env)? {
                Signal::Normal => {}
                signal @ Signal::Return(_) => return Ok(signal),
            }
        }
        Ok(Signal::Normal)
    }

    fn evaluate(&self, expr: &Expr, env: &Rc<Environment>) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Grouping(inner) => self.evaluate(inner, env),
            ExprKind::Unary { op, operand } => {
                let value = self.evaluate(operand, env)?;
                match op.kind {
                    TokenKind::Bang => Ok(Value::Bool(!value.is_truthy())),
                    TokenKind::Minus => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::new("Operand must be a number.", op.line)),
                    },
                    _ => unreachable!("unary op restricted to ! and - by the parser"),
                }
            }
            ExprKind::Binary { left, op, right } => self.evaluate_binary(left, op, right, env),
            ExprKind::Logical { left, op, right } => {
                let left_value = self.evaluate(left, env)?;
                let is_or = op.kind == TokenKind::Or;
                if is_or == left_value.is_truthy() {
                    // `or` short-circuits on truthy left; `and` short-circuits
                    // on falsey left. Either way the operand that decided the
                    // outcome is returned as-is, uncoerced.
                    return Ok(left_value);
                }
                self.evaluate(right, env)
            }
            ExprKind::Variable { name } => self.lookup_variable(expr.id, name, env),
            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value, env)?;
                match self.resolution.get(&expr.id) {
                    Some(&depth) => env.assign_at(depth, &name.lexeme, value.clone()),
                    None => self.globals.assign(&name.lexeme, value.clone(), name.line)?,
                }
                Ok(value)
            }
            ExprKind::Call { callee, paren, args } => self.evaluate_call(callee, paren, args, env),
        }
    }

    fn lookup_variable(
        &self,
        id: crate::ast::NodeId,
        name: &Token,
        env: &Rc<Environment>,
    ) -> Result<Value, RuntimeError> {
        match self.resolution.get(&id) {
            Some(&depth) => Ok(env.get_at(depth, &name.lexeme)),
            None => self.globals.get(&name.lexeme, name.line),
        }
    }

    fn evaluate_binary(
        &self,
        left: &Expr,
        op: &Token,
        right: &Expr,
        env: &Rc<Environment>,
    ) -> Result<Value, RuntimeError> {
        let left = self.evaluate(left, env)?;
        let right = self.evaluate(right, env)?;
        use TokenKind::*;
        match op.kind {
            Plus => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::String(a), Value::String(b)) => {
                    Ok(Value::String(Rc::from(format!("{a}{b}"))))
                }
                _ => Err(RuntimeError::new(
                    "Operands must be two numbers or two strings.",
                    op.line,
                )),
            },
            Minus => numeric_binop(left, right, op, |a, b| a - b),
            Star => numeric_binop(left, right, op, |a, b| a * b),
            Slash => numeric_binop(left, right, op, |a, b| a / b),
            Greater => numeric_compare(left, right, op, |a, b| a > b),
            GreaterEqual => numeric_compare(left, right, op, |a, b| a >= b),
            Less => numeric_compare(left, right, op, |a, b| a < b),
            LessEqual => numeric_compare(left, right, op, |a, b| a <= b),
            BangEqual => Ok(Value::Bool(!left.values_equal(&right))),
            EqualEqual => Ok(Value::Bool(left.values_equal(&right))),
            _ => unreachable!("binary op restricted to the above kinds by the parser"),
        }
    }

    fn evaluate_call(
        &self,
        callee: &Expr,
        paren: &Token,
        args: &[Expr],
        env: &Rc<Environment>,
    ) -> Result<Value, RuntimeError> {
        let callee_value = self.evaluate(callee, env)?;

        let Value::Callable(callable) = callee_value else {
            return Err(RuntimeError::new(
                "Can only call functions and classes.",
                paren.line,
            ));
        };

        let mut arg_values = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.evaluate(arg, env)?);
        }

        if arg_values.len() != callable.arity() {
            return Err(RuntimeError::new(
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    arg_values.len()
                ),
                paren.line,
            ));
        }

        self.call(&callable, arg_values)
    }

    /// Invokes a user function per the call protocol in §4.6: a fresh
    /// environment enclosing the closure, parameters bound positionally, the
    /// body run as a block, `Nil` on normal completion or the `return`'d
    /// value otherwise.
    fn call(&self, callable: &Callable, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let Callable::User {
            declaration,
            closure,
        } = callable;

        let call_env = Environment::with_parent(Rc::clone(closure));
        for (param, arg) in declaration.params.iter().zip(args) {
            call_env.define(param.lexeme.clone(), arg);
        }

        match self.execute_block(&declaration.body, &call_env)? {
            Signal::Normal => Ok(Value::Nil),
            Signal::Return(value) => Ok(value),
        }
    }
}

fn literal_value(lit: &LiteralValue) -> Value {
    match lit {
        LiteralValue::Nil => Value::Nil,
        LiteralValue::Bool(b) => Value::Bool(*b),
        LiteralValue::Number(n) => Value::Number(*n),
        LiteralValue::String(s) => Value::String(Rc::clone(s)),
    }
}

fn numeric_binop(
    left: Value,
    right: Value,
    op: &Token,
    f: impl FnOnce(f64, f64) -> f64,
) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(a, b))),
        _ => Err(RuntimeError::new("Operands must be numbers.", op.line)),
    }
}

fn numeric_compare(
    left: Value,
    right: Value,
    op: &Token,
    f: impl FnOnce(f64, f64) -> bool,
) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(f(a, b))),
        _ => Err(RuntimeError::new("Operands must be numbers.", op.line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolver::Resolver;

    fn run(src: &str) -> Result<(), RuntimeError> {
        let mut diagnostics = Diagnostics::new();
        let tokens = Lexer::new(src).scan(&mut diagnostics);
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        assert!(!diagnostics.had_error(), "unexpected compile errors: {:?}", diagnostics.errors());
        let resolution = Resolver::new(&mut diagnostics).resolve(&statements);
        assert!(!diagnostics.had_error(), "unexpected resolve errors: {:?}", diagnostics.errors());
        Interpreter::new(resolution).interpret(&statements)
    }

    #[test]
    fn arithmetic_precedence() {
        // Exercised for side effect (stdout) only by the integration tests;
        // here we confirm it runs without error.
        run("print (1 + 2) * 3 / 2 - 1;").unwrap();
    }

    #[test]
    fn division_by_zero_yields_infinity_not_an_error() {
        run("var x = 1 / 0;").unwrap();
    }

    #[test]
    fn string_plus_number_is_a_runtime_error() {
        let err = run("\"a\" + 1;").unwrap_err();
        assert!(err.message.contains("two numbers or two strings"));
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let err = run("var x = 1; x();").unwrap_err();
        assert!(err.message.contains("Can only call"));
    }

    #[test]
    fn non_callable_check_happens_before_any_argument_is_evaluated() {
        // The callee-not-callable check must fire before arguments are
        // touched, so a bad argument expression never masks it.
        let err = run("1(\"a\" + 1);").unwrap_err();
        assert!(err.message.contains("Can only call"));
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error() {
        let err = run("fun f(a, b) { return a; } f(1);").unwrap_err();
        assert!(err.message.contains("Expected 2 arguments but got 1"));
    }

    #[test]
    fn recursion_and_return() {
        // fib(10) = 55; no panics/errors means the call stack and return
        // propagation both behave.
        run("fun fib(n) { if (n < 2) return n; return fib(n-1) + fib(n-2); } var r = fib(10);")
            .unwrap();
    }

    #[test]
    fn closures_share_the_declaring_frame() {
        run(r#"
            fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    return i;
                }
                return count;
            }
            var counter = makeCounter();
            var a = counter();
            var b = counter();
        "#)
        .unwrap();
    }

    #[test]
    fn unary_minus_on_non_number_is_a_runtime_error() {
        let err = run("-\"x\";").unwrap_err();
        assert!(err.message.contains("Operand must be a number"));
    }

    #[test]
    fn logical_and_or_return_the_deciding_operand() {
        // No direct value inspection here (print goes to stdout); we only
        // assert these evaluate without error, including the short-circuit
        // that must avoid the division by zero.
        run("print false and (1/0);").unwrap();
        run("print nil or \"hi\";").unwrap();
    }
}
