use std::io::Write;
use std::rc::Rc;

use log::debug;

use super::callable::Function;
use super::environment::Environment;
use super::object::{Object, RuntimeError, NULL};
use crate::ast::{
    BinaryOp, Expr, ExprInner, IfStatement, IntWidth, Program, Stmt, StmtInner, TypeAnnotation,
    UnaryOp, WhileStatement,
};

/// Non-local exits from evaluation. Both short-circuit every enclosing step unchanged; a return
/// is caught once at the call boundary
#[derive(Debug)]
pub enum Unwind {
    Return(Object),
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

type EvalResult = Result<Object, Unwind>;

/// Nested calls allowed before evaluation fails with a stack overflow error
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1000;

/// Tree-walking evaluator. `print` output goes to `out`
pub struct Interpreter<W> {
    out: W,
    depth: usize,
    max_depth: usize,
}

impl<W: Write> Interpreter<W> {
    pub fn new(out: W) -> Interpreter<W> {
        Interpreter::with_max_depth(out, DEFAULT_MAX_CALL_DEPTH)
    }

    pub fn with_max_depth(out: W, max_depth: usize) -> Interpreter<W> {
        Interpreter {
            out,
            depth: 0,
            max_depth,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Evaluate every statement in order. The result is the value of the last statement, the
    /// value of a top-level `return`, or the first runtime error as an `Object::Error`
    pub fn eval_program(&mut self, program: &Program, env: &Rc<Environment>) -> Object {
        debug!("evaluating {} statements", program.0.len());
        match self.execute_all(&program.0, env) {
            Ok(value) | Err(Unwind::Return(value)) => value,
            Err(Unwind::Error(error)) => Object::Error(error),
        }
    }

    // Blocks share the scope they appear in; only calls open a new one
    fn execute_all(&mut self, stmts: &[Stmt], env: &Rc<Environment>) -> EvalResult {
        let mut result = NULL;
        for stmt in stmts {
            result = self.execute(stmt, env)?;
        }
        Ok(result)
    }

    fn execute(&mut self, stmt: &Stmt, env: &Rc<Environment>) -> EvalResult {
        match &stmt.inner {
            StmtInner::Let {
                name,
                annotation,
                value,
            } => {
                let value = self.eval(value, env)?;
                let value = match annotation {
                    Some(annotation) => apply_annotation(name, *annotation, value)?,
                    None => value,
                };
                env.bind(name, value);
                Ok(NULL)
            }
            StmtInner::Print(expr) => {
                let value = self.eval(expr, env)?;
                writeln!(self.out, "{}", value.inspect())
                    .map_err(|err| RuntimeError::Io(err.to_string()))?;
                Ok(NULL)
            }
            StmtInner::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr, env)?,
                    None => NULL,
                };
                Err(Unwind::Return(value))
            }
            StmtInner::Expr(expr) => self.eval(expr, env),
            StmtInner::If(if_stmt) => self.eval_if(if_stmt, env),
            StmtInner::While(while_stmt) => self.eval_while(while_stmt, env),
        }
    }

    fn eval(&mut self, expr: &Expr, env: &Rc<Environment>) -> EvalResult {
        match &expr.inner {
            ExprInner::Identifier(name) => env
                .lookup(name)
                .ok_or_else(|| Unwind::from(RuntimeError::IdentifierNotFound(name.clone()))),
            ExprInner::Integer { value, width } => Ok(Object::Integer {
                value: *value,
                width: *width,
            }),
            ExprInner::String(s) => Ok(Object::string(s.as_str())),
            ExprInner::Boolean(b) => Ok(Object::bool(*b)),
            ExprInner::Unary { op, expr } => {
                let operand = self.eval(expr, env)?;
                Ok(eval_unary(*op, operand)?)
            }
            ExprInner::Binary { left, op, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                Ok(eval_binary(*op, left, right)?)
            }
            ExprInner::Function { parameters, body } => Ok(Object::Function(Rc::new(Function {
                parameters: parameters.clone(),
                body: body.clone(),
                closure: env.clone(),
            }))),
            ExprInner::Call { callee, arguments } => {
                let callee = self.eval(callee, env)?;
                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.eval(arg, env)?);
                }
                self.call(callee, args)
            }
            ExprInner::Index { collection, index } => {
                let collection = self.eval(collection, env)?;
                let index = self.eval(index, env)?;
                Ok(eval_index(collection, index)?)
            }
            ExprInner::If(if_stmt) => self.eval_if(if_stmt, env),
            ExprInner::While(while_stmt) => self.eval_while(while_stmt, env),
        }
    }

    fn eval_if(&mut self, if_stmt: &IfStatement, env: &Rc<Environment>) -> EvalResult {
        let condition = self.eval(&if_stmt.condition, env)?;
        if condition.is_truthy() {
            self.execute_all(&if_stmt.consequence.statements, env)
        } else if let Some(alternative) = &if_stmt.alternative {
            self.execute_all(&alternative.statements, env)
        } else {
            Ok(NULL)
        }
    }

    fn eval_while(&mut self, while_stmt: &WhileStatement, env: &Rc<Environment>) -> EvalResult {
        while self.eval(&while_stmt.condition, env)?.is_truthy() {
            self.execute_all(&while_stmt.body.statements, env)?;
        }
        Ok(NULL)
    }

    fn call(&mut self, callee: Object, args: Vec<Object>) -> EvalResult {
        match callee {
            Object::Native(native) => match native.call(args)? {
                Object::Error(error) => Err(Unwind::Error(error)),
                value => Ok(value),
            },
            Object::Function(func) => {
                if self.depth >= self.max_depth {
                    return Err(RuntimeError::StackOverflow(self.max_depth).into());
                }
                let env = func.bind_arguments(args)?;
                self.depth += 1;
                let result = self.execute_all(&func.body.statements, &env);
                self.depth -= 1;
                match result {
                    // The last statement's value is returned when there is no explicit return
                    Ok(value) | Err(Unwind::Return(value)) => Ok(value),
                    Err(error) => Err(error),
                }
            }
            other => Err(RuntimeError::NotAFunction(other.type_name()).into()),
        }
    }
}

fn apply_annotation(
    name: &str,
    annotation: TypeAnnotation,
    value: Object,
) -> Result<Object, RuntimeError> {
    match (annotation, value) {
        (TypeAnnotation::I64, Object::Integer { value, .. }) => Ok(Object::Integer {
            value,
            width: IntWidth::I64,
        }),
        (TypeAnnotation::I32, Object::Integer { value, .. }) => {
            if i32::try_from(value).is_err() {
                return Err(RuntimeError::WidthOverflow {
                    name: name.to_string(),
                    value,
                });
            }
            Ok(Object::Integer {
                value,
                width: IntWidth::I32,
            })
        }
        (TypeAnnotation::String, value @ Object::String(_)) => Ok(value),
        (annotation, value) => Err(RuntimeError::AnnotationMismatch {
            name: name.to_string(),
            annotation,
            found: value.type_name(),
        }),
    }
}

// Results of i32 arithmetic stay i32 only while they fit
fn tag_width(value: i64, narrow: bool) -> Object {
    let width = if narrow && i32::try_from(value).is_ok() {
        IntWidth::I32
    } else {
        IntWidth::I64
    };
    Object::Integer { value, width }
}

fn single_char_code(s: &str) -> Option<i64> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(i64::from(u32::from(c))),
        _ => None,
    }
}

fn is_arithmetic(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide
    )
}

fn eval_unary(op: UnaryOp, operand: Object) -> Result<Object, RuntimeError> {
    match (op, operand) {
        (UnaryOp::Not, operand) => Ok(Object::bool(!operand.is_truthy())),
        (UnaryOp::Negative, Object::Integer { value, width }) => {
            Ok(tag_width(value.wrapping_neg(), width == IntWidth::I32))
        }
        (op, operand) => Err(RuntimeError::UnknownPrefixOperator {
            op,
            operand: operand.type_name(),
        }),
    }
}

fn eval_integer_binary(op: BinaryOp, l: i64, r: i64, narrow: bool) -> Result<Object, RuntimeError> {
    let value = match op {
        BinaryOp::Add => l.wrapping_add(r),
        BinaryOp::Subtract => l.wrapping_sub(r),
        BinaryOp::Multiply => l.wrapping_mul(r),
        BinaryOp::Divide => {
            if r == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            l.wrapping_div(r)
        }
        BinaryOp::Remainder => {
            if r == 0 {
                return Err(RuntimeError::DivisionByZero);
            }
            l.wrapping_rem(r)
        }
        BinaryOp::Equal => return Ok(Object::bool(l == r)),
        BinaryOp::NotEqual => return Ok(Object::bool(l != r)),
        BinaryOp::LessThan => return Ok(Object::bool(l < r)),
        BinaryOp::GreaterThan => return Ok(Object::bool(l > r)),
    };
    Ok(tag_width(value, narrow))
}

fn eval_binary(op: BinaryOp, left: Object, right: Object) -> Result<Object, RuntimeError> {
    let unknown_operator = |left: &Object, right: &Object| RuntimeError::UnknownInfixOperator {
        left: left.type_name(),
        op,
        right: right.type_name(),
    };
    let type_mismatch = |left: &Object, right: &Object| RuntimeError::TypeMismatch {
        left: left.type_name(),
        op,
        right: right.type_name(),
    };

    match (&left, &right) {
        (Object::Integer { value: l, width: lw }, Object::Integer { value: r, width: rw }) => {
            let narrow = *lw == IntWidth::I32 && *rw == IntWidth::I32;
            eval_integer_binary(op, *l, *r, narrow)
        }
        (Object::String(l), Object::String(r)) => {
            // One-character strings behave as their character codes
            match (single_char_code(l), single_char_code(r)) {
                (Some(l), Some(r)) => eval_integer_binary(op, l, r, false),
                _ if op == BinaryOp::Add => Ok(Object::string(format!("{}{}", l, r))),
                _ => Err(unknown_operator(&left, &right)),
            }
        }
        (Object::String(s), Object::Integer { value, .. }) => match single_char_code(s) {
            Some(code) if is_arithmetic(op) => eval_integer_binary(op, code, *value, false),
            _ => Err(type_mismatch(&left, &right)),
        },
        (Object::Integer { value, .. }, Object::String(s)) => match single_char_code(s) {
            Some(code) if is_arithmetic(op) => eval_integer_binary(op, *value, code, false),
            _ => Err(type_mismatch(&left, &right)),
        },
        _ => match op {
            BinaryOp::Equal => Ok(Object::bool(left == right)),
            BinaryOp::NotEqual => Ok(Object::bool(left != right)),
            _ if left.type_name() == right.type_name() => Err(unknown_operator(&left, &right)),
            _ => Err(type_mismatch(&left, &right)),
        },
    }
}

fn eval_index(collection: Object, index: Object) -> Result<Object, RuntimeError> {
    match (&collection, &index) {
        (Object::String(s), Object::Integer { value, .. }) => Ok(usize::try_from(*value)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Object::string(c.to_string()))
            .unwrap_or(NULL)),
        (Object::String(_), index) => Err(RuntimeError::InvalidIndex(index.type_name())),
        (collection, _) => Err(RuntimeError::IndexNotSupported(collection.type_name())),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::interpreter::callable::NativeFunction;
    use crate::parser::parse;
    use crate::scanner::{Scanner, Syntax};

    fn run_with_output(code: &str) -> (Object, String) {
        let (program, errors) = parse(Scanner::new(code, Syntax::Indentation));
        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
        let env = Environment::new_global();
        let mut interpreter = Interpreter::new(Vec::new());
        let result = interpreter.eval_program(&program, &env);
        let output = String::from_utf8(interpreter.into_inner()).unwrap();
        (result, output)
    }

    fn run(code: &str) -> Object {
        run_with_output(code).0
    }

    fn error_message(code: &str) -> String {
        match run(code) {
            Object::Error(error) => error.to_string(),
            other => panic!("expected an error from {:?}, got {:?}", code, other),
        }
    }

    #[test]
    fn test_integer_arithmetic() {
        let cases = [
            ("5", 5),
            ("-5", -5),
            ("5 + 5 + 5 + 5 - 10", 10),
            ("2 * 2 * 2 * 2 * 2", 32),
            ("-50 + 100 + -50", 0),
            ("2 * (5 + 10)", 30),
            ("3 * 3 * 3 + 10", 37),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", 50),
            ("-7 / 2", -3),
            ("-7 % 2", -1),
            ("10 % 4", 2),
            ("9223372036854775807 + 1", i64::MIN),
        ];
        for (code, expected) in cases {
            assert_eq!(Object::int(expected), run(code), "{}", code);
        }
    }

    #[test]
    fn test_width_tagging() {
        let width = |code: &str| match run(code) {
            Object::Integer { width, .. } => width,
            other => panic!("expected an integer from {:?}, got {:?}", code, other),
        };
        assert_eq!(IntWidth::I32, width("2i32 * 3i32"));
        assert_eq!(IntWidth::I64, width("2147483647i32 + 1i32"));
        assert_eq!(IntWidth::I64, width("2i32 + 3"));
        assert_eq!(IntWidth::I64, width("7"));
        assert_eq!(IntWidth::I32, width("-7i32"));
        assert_eq!(Object::int(2147483648), run("2147483647i32 + 1i32"));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!("division by zero", error_message("1 / 0"));
        assert_eq!("division by zero", error_message("1 % 0"));
    }

    #[test]
    fn test_boolean_expressions() {
        let cases = [
            ("true", true),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("true == true", true),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("(1 > 2) == false", true),
            ("!true", false),
            ("!5", false),
            ("!!5", true),
            ("!0", false),
        ];
        for (code, expected) in cases {
            assert_eq!(Object::bool(expected), run(code), "{}", code);
        }
    }

    #[test]
    fn test_error_messages() {
        let cases = [
            ("5 + true;", "type mismatch: INTEGER + BOOLEAN"),
            ("5 + true; 5;", "type mismatch: INTEGER + BOOLEAN"),
            ("-true", "unknown operator: -BOOLEAN"),
            ("true + false;", "unknown operator: BOOLEAN + BOOLEAN"),
            ("5; true + false; 5", "unknown operator: BOOLEAN + BOOLEAN"),
            ("if 10 > 1: true + false", "unknown operator: BOOLEAN + BOOLEAN"),
            ("foobar", "identifier not found: foobar"),
            ("\"Hello\" - \"World\"", "unknown operator: STRING - STRING"),
            ("\"ab\" * 2", "type mismatch: STRING * INTEGER"),
            ("5()", "not a function: INTEGER"),
            ("5[0]", "index operator not supported: INTEGER"),
            ("\"abc\"[true]", "index must be an INTEGER, got BOOLEAN"),
        ];
        for (code, expected) in cases {
            assert_eq!(expected, error_message(code), "{}", code);
        }
    }

    #[test]
    fn test_errors_stop_evaluation() {
        let (result, output) = run_with_output("print 1\nx = 5 + true\nprint 2");
        assert!(matches!(result, Object::Error(_)));
        assert_eq!("1\n", output);

        let in_loop = "
i = 0
while true:
    i = i + 1
    if i == 3: i + true
";
        assert_eq!("type mismatch: INTEGER + BOOLEAN", error_message(in_loop));

        let arguments = "
noisy = fn(n):
    print n
    n
f = fn(a, b, c): a
f(noisy(1), missing, noisy(3))
";
        let (result, output) = run_with_output(arguments);
        assert_eq!(
            Object::Error(RuntimeError::IdentifierNotFound("missing".to_string())),
            result
        );
        assert_eq!("1\n", output);
    }

    #[test]
    fn test_lines_are_separate_statements() {
        assert_eq!(Object::int(12), run("total = 10\n(total - 4) * 2"));
        assert_eq!(Object::int(-1), run("x = 1\n-x"));
        assert_eq!(Object::int(5), run("f = fn(x):\n    x\n(5)"));
    }

    fn run_limited(
        code: &str,
        max_depth: usize,
    ) -> (Object, Interpreter<Vec<u8>>, Rc<Environment>) {
        let (program, errors) = parse(Scanner::new(code, Syntax::Indentation));
        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
        let env = Environment::new_global();
        let mut interpreter = Interpreter::with_max_depth(Vec::new(), max_depth);
        let result = interpreter.eval_program(&program, &env);
        (result, interpreter, env)
    }

    #[test]
    fn test_call_depth_limit() {
        let countdown = "f = fn(n): if n == 0: 0 else: 1 + f(n - 1)\n";
        // f(49) makes 50 nested calls
        let (result, _, _) = run_limited(&format!("{}f(49)", countdown), 50);
        assert_eq!(Object::int(49), result);

        let (result, mut interpreter, env) = run_limited(&format!("{}f(50)", countdown), 50);
        assert_eq!(Object::Error(RuntimeError::StackOverflow(50)), result);
        assert_eq!("ERROR: stack overflow: more than 50 nested calls", result.inspect());

        // The failed call unwinds completely, so the full depth is available again
        let (program, _) = parse(Scanner::new("f(49)", Syntax::Indentation));
        assert_eq!(Object::int(49), interpreter.eval_program(&program, &env));
    }

    #[test]
    fn test_strings() {
        assert_eq!(
            Object::string("Hello World!"),
            run("\"Hello\" + \" \" + \"World!\"")
        );
        assert_eq!(Object::int(98), run("\"a\" + 1"));
        assert_eq!(Object::int(1), run("\"b\" - \"a\""));
        assert_eq!(Object::int(195), run("\"a\" + \"b\""));
        assert_eq!(Object::bool(true), run("\"a\" < \"b\""));
        assert_eq!(Object::string("b"), run("\"abc\"[1]"));
        assert_eq!(NULL, run("\"abc\"[3]"));
        assert_eq!(NULL, run("\"abc\"[-1]"));
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(Object::int(10), run("if 1 < 2: 10"));
        assert_eq!(NULL, run("if 1 > 2: 10"));
        assert_eq!(Object::int(20), run("if 1 > 2: 10 else: 20"));
        assert_eq!(Object::int(10), run("if 0: 10 else: 20"));
        assert_eq!(Object::int(2), run("x = if 1 > 2: 1 else: 2\nx"));

        let (_, output) = run_with_output("if 1 > 2: print \"no\" else: print \"yes\"");
        assert_eq!("yes\n", output);
    }

    #[test]
    fn test_while_loops() {
        let code = "
i = 0
total = 0
while i < 5:
    i = i + 1
    total = total + i
total";
        assert_eq!(Object::int(15), run(code));
        assert_eq!(NULL, run("while false: 1"));
    }

    #[test]
    fn test_return_statements() {
        assert_eq!(Object::int(7), run("return 7; 9"));
        assert_eq!(NULL, run("return; 9"));
        let nested = "
if 10 > 1:
    if 10 > 1:
        return 10
    return 1
";
        assert_eq!(Object::int(10), run(nested));
        let in_loop = "
f = fn():
    i = 0
    while true:
        i = i + 1
        if i == 3: return i
f()";
        assert_eq!(Object::int(3), run(in_loop));
    }

    #[test]
    fn test_functions() {
        assert_eq!(Object::int(5), run("add = fn(a, b): a + b\nadd(2, 3)"));
        assert_eq!(
            Object::int(20),
            run("double = fn(x):\n    return x * 2\ndouble(double(5))")
        );
        assert_eq!(NULL, run("f = fn(): return\nf()"));
        assert_eq!(
            "wrong number of arguments: expected 1, got 2",
            error_message("f = fn(a): a\nf(1, 2)")
        );
    }

    #[test]
    fn test_recursion() {
        let code = "
fib = fn(n):
    if n < 2: return n
    return fib(n - 1) + fib(n - 2)
fib(10)";
        assert_eq!(Object::int(55), run(code));
    }

    #[test]
    fn test_closures() {
        let code = "
newAdder = fn(x):
    return fn(y): x + y
addTwo = newAdder(2)
addTwo(3)";
        assert_eq!(Object::int(5), run(code));
    }

    #[test]
    fn test_scope_isolation() {
        assert_eq!(
            "identifier not found: inner",
            error_message("f = fn():\n    inner = 1\n    inner\nf()\ninner")
        );
        assert_eq!(Object::int(1), run("x = 1\nf = fn(): x = 2\nf()\nx"));
    }

    #[test]
    fn test_print() {
        let (result, output) =
            run_with_output("print 1 + 2\nprint \"hi\"\nprint fn(a, b): a\nprint 1 > 2");
        assert_eq!(NULL, result);
        assert_eq!("3\nhi\nfn(a, b)\nfalse\n", output);
    }

    #[test]
    fn test_annotations() {
        assert_eq!(
            Object::Integer {
                value: 5,
                width: IntWidth::I32
            },
            run("x: i32 = 5\nx")
        );
        match run("x: i64 = 5i32\nx") {
            Object::Integer { width, .. } => assert_eq!(IntWidth::I64, width),
            other => panic!("expected an integer, got {:?}", other),
        }
        assert_eq!(
            "value 3000000000 of x does not fit in i32",
            error_message("x: i32 = 3000000000")
        );
        assert_eq!(
            "cannot bind INTEGER to s: string",
            error_message("s: string = 5")
        );
        assert_eq!(Object::string("ok"), run("s: string = \"ok\"\ns"));
    }

    #[test]
    fn test_let_yields_null() {
        assert_eq!(NULL, run("x = 5"));
    }

    fn fail(_args: Vec<Object>) -> Result<Object, RuntimeError> {
        Err(RuntimeError::Native("fail: always fails".to_string()))
    }

    fn error_object(_args: Vec<Object>) -> Result<Object, RuntimeError> {
        Ok(Object::Error(RuntimeError::Native("returned".to_string())))
    }

    fn count(args: Vec<Object>) -> Result<Object, RuntimeError> {
        Ok(Object::int(args.len() as i64))
    }

    #[test]
    fn test_native_calls() {
        let env = Environment::new_global();
        for (name, call) in [
            ("fail", fail as fn(Vec<Object>) -> Result<Object, RuntimeError>),
            ("error_object", error_object),
            ("count", count),
        ] {
            env.bind(name, Object::Native(NativeFunction { name, call }));
        }
        let mut interpreter = Interpreter::new(Vec::new());
        let mut eval = |code: &str| {
            let (program, errors) = parse(Scanner::new(code, Syntax::Indentation));
            assert!(errors.is_empty());
            interpreter.eval_program(&program, &env)
        };
        assert_eq!(Object::int(3), eval("count(1, \"a\", true)"));
        assert_eq!(
            Object::Error(RuntimeError::Native("fail: always fails".to_string())),
            eval("fail() + 1")
        );
        assert_eq!(
            Object::Error(RuntimeError::Native("returned".to_string())),
            eval("x = error_object()\n5")
        );
    }

    #[test]
    fn test_reevaluation_is_stable() {
        let (program, _) = parse(Scanner::new(
            "f = fn(n): n * 2\nf(21)",
            Syntax::Indentation,
        ));
        let first = Interpreter::new(Vec::new()).eval_program(&program, &Environment::new_global());
        let second =
            Interpreter::new(Vec::new()).eval_program(&program, &Environment::new_global());
        assert_eq!(Object::int(42), first);
        assert_eq!(first, second);
    }
}
