use std::{cell::RefCell, path::PathBuf, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::{
        Block, CasePattern, CatchHandler, Expr, ExprKind, Program, Stmt, StmtKind, SwitchCase,
    },
    diagnostics::{Diagnostic, DiagnosticKind, LynxError, Position, Result},
    environment::{Environment, EnvironmentRef},
    modules::ModuleSearch,
    operators, parser, stdlib,
    value::{Class, Function, HashPair, Instance, Value, ValueKind},
};

/// Host-side configuration of an [`Interpreter`].
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Directory that relative module searches start from.
    pub script_dir: PathBuf,
    /// Bound as the constant `args` array.
    pub args: Vec<String>,
    pub search: ModuleSearch,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            script_dir: PathBuf::from("."),
            args: Vec::new(),
            search: ModuleSearch::default(),
        }
    }
}

/// Non-local exits travelling up the evaluator. Returns, breaks and
/// continues are consumed at function and loop boundaries; errors at the
/// nearest `catch` or the top level.
pub(crate) enum Signal {
    Return(Value),
    Break,
    Continue,
    Error(Diagnostic),
}

impl Signal {
    fn located(self, position: Position) -> Self {
        match self {
            Signal::Error(diag) => Signal::Error(diag.or_position(position)),
            other => other,
        }
    }
}

impl From<Diagnostic> for Signal {
    fn from(diag: Diagnostic) -> Self {
        Signal::Error(diag)
    }
}

pub(crate) type Eval<T> = std::result::Result<T, Signal>;

pub struct Interpreter {
    pub(crate) globals: EnvironmentRef,
    pub(crate) search: ModuleSearch,
    pub(crate) loading: Vec<String>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_context(ExecutionContext::default())
    }

    pub fn with_context(context: ExecutionContext) -> Self {
        let globals = Environment::new(context.script_dir);
        stdlib::install(&globals);
        let args = context.args.into_iter().map(Value::string).collect();
        globals
            .borrow_mut()
            .define("args", Value::array(args), true);
        Self {
            globals,
            search: context.search,
            loading: Vec::new(),
        }
    }

    pub fn globals(&self) -> &EnvironmentRef {
        &self.globals
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        Environment::get(&self.globals, name)
    }

    pub fn eval_source(&mut self, source: &str) -> Result<Value> {
        let program = parser::parse_program(source)?;
        self.eval_program(&program)
    }

    /// Evaluates `program` in the root environment. The result is the value
    /// of the final statement when that is an expression statement.
    pub fn eval_program(&mut self, program: &Program) -> Result<Value> {
        let globals = Rc::clone(&self.globals);
        let outcome = self.eval_statements(&program.statements, &globals);
        finish(outcome)
    }

    /// Calls any callable value from host code.
    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        let outcome = self.apply(callee, args);
        finish(outcome)
    }

    pub(crate) fn eval_statements(&mut self, statements: &[Stmt], env: &EnvironmentRef) -> Eval<Value> {
        let mut last = Value::null();
        for stmt in statements {
            last = self.execute(stmt, env)?;
            if last.is_error() {
                return Ok(last);
            }
        }
        match statements.last() {
            Some(Stmt {
                kind: StmtKind::Expr(_),
                ..
            }) => Ok(last),
            _ => Ok(Value::null()),
        }
    }

    fn execute_block(&mut self, block: &Block, env: &EnvironmentRef) -> Eval<Value> {
        let scope = Environment::enclosed(env);
        self.eval_statements(&block.statements, &scope)
    }

    fn execute(&mut self, stmt: &Stmt, env: &EnvironmentRef) -> Eval<Value> {
        let result = match &stmt.kind {
            StmtKind::Var {
                name,
                value,
                constant,
            } => {
                let value = self.operand(value, env)?;
                env.borrow_mut().define(name.clone(), value, *constant);
                Ok(Value::null())
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.operand(expr, env)?,
                    None => Value::null(),
                };
                Err(Signal::Return(value))
            }
            StmtKind::Expr(expr) => self.evaluate(expr, env),
            StmtKind::Block(block) => self.execute_block(block, env),
            StmtKind::For {
                item,
                index,
                iterable,
                body,
            } => self.execute_for(item, index.as_deref(), iterable, body, env),
            StmtKind::While { condition, body } => {
                while self.operand(condition, env)?.is_truthy() {
                    match self.execute_block(body, env) {
                        Ok(value) if value.is_error() => return Ok(value),
                        Ok(_) | Err(Signal::Continue) => {}
                        Err(Signal::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(Value::null())
            }
            StmtKind::Break => Err(Signal::Break),
            StmtKind::Continue => Err(Signal::Continue),
            StmtKind::Class {
                name,
                superclass,
                body,
            } => self.declare_class(name, superclass.as_deref(), body, env),
            StmtKind::ModuleLoad { name, members } => {
                self.load_module(name, members.as_deref(), env)
            }
        };
        result.map_err(|signal| signal.located(stmt.position))
    }

    fn execute_for(
        &mut self,
        item: &str,
        index: Option<&str>,
        iterable: &Expr,
        body: &Block,
        env: &EnvironmentRef,
    ) -> Eval<Value> {
        let collection = self.operand(iterable, env)?;
        let entries: Vec<(Value, Value)> = match collection.kind() {
            ValueKind::Array(items) => items
                .borrow()
                .iter()
                .enumerate()
                .map(|(i, value)| (value.clone(), Value::integer(i as i64)))
                .collect(),
            ValueKind::Hash(pairs) => pairs
                .borrow()
                .values()
                .map(|pair| (pair.value.clone(), pair.key.clone()))
                .collect(),
            ValueKind::String(text) => text
                .chars()
                .enumerate()
                .map(|(i, ch)| (Value::string(ch), Value::integer(i as i64)))
                .collect(),
            _ => {
                return Err(Diagnostic::runtime(format!(
                    "for-range not supported on: {}",
                    collection.type_name()
                ))
                .with_position(iterable.position)
                .into())
            }
        };

        let loop_env = Environment::enclosed(env);
        for (value, position) in entries {
            {
                let mut scope = loop_env.borrow_mut();
                scope.define(item, value, false);
                if let Some(index) = index {
                    scope.define(index, position, false);
                }
            }
            match self.execute_block(body, &loop_env) {
                Ok(value) if value.is_error() => return Ok(value),
                Ok(_) | Err(Signal::Continue) => {}
                Err(Signal::Break) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(Value::null())
    }

    pub(crate) fn evaluate(&mut self, expr: &Expr, env: &EnvironmentRef) -> Eval<Value> {
        self.evaluate_kind(expr, env)
            .map_err(|signal| signal.located(expr.position))
    }

    fn evaluate_kind(&mut self, expr: &Expr, env: &EnvironmentRef) -> Eval<Value> {
        match &expr.kind {
            ExprKind::Integer(n) => Ok(Value::integer(*n)),
            ExprKind::Float(f) => Ok(Value::float(*f)),
            ExprKind::Str(s) => Ok(Value::string(s.clone())),
            ExprKind::Boolean(b) => Ok(Value::boolean(*b)),
            ExprKind::Null => Ok(Value::null()),
            ExprKind::Identifier(name) => Environment::get(env, name).ok_or_else(|| {
                Diagnostic::runtime(format!("identifier not found: {name}")).into()
            }),
            ExprKind::SelfRef => Environment::get(env, "self").ok_or_else(|| {
                Diagnostic::new(
                    DiagnosticKind::Scope,
                    "'self' can only be used inside a class method",
                )
                .into()
            }),
            ExprKind::Prefix { op, right } => {
                let right = self.operand(right, env)?;
                Ok(operators::prefix(*op, &right)?)
            }
            ExprKind::Infix { op, left, right } => {
                let left = self.operand(left, env)?;
                let right = self.operand(right, env)?;
                Ok(operators::infix(*op, &left, &right)?)
            }
            ExprKind::Pipe { left, right } => {
                let input = self.operand(left, env)?;
                self.pipe_into(input, right, env)
            }
            ExprKind::If {
                condition,
                consequence,
                alternative,
            } => {
                if self.operand(condition, env)?.is_truthy() {
                    self.execute_block(consequence, env)
                } else if let Some(alternative) = alternative {
                    self.execute_block(alternative, env)
                } else {
                    Ok(Value::null())
                }
            }
            ExprKind::Function(literal) => Ok(Value::new(ValueKind::Function(Function {
                literal: Rc::clone(literal),
                env: Rc::clone(env),
            }))),
            ExprKind::Call { function, args } => {
                let callee = self.operand(function, env)?;
                let args = self.evaluate_all(args, env)?;
                self.apply(&callee, args)
            }
            ExprKind::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = self.evaluate(object, env)?;
                let args = self.evaluate_all(args, env)?;
                self.call_method(&receiver, method, args)
            }
            ExprKind::Index { target, index } => {
                let target = self.operand(target, env)?;
                let index = self.operand(index, env)?;
                Ok(crate::methods::index(&target, &index)?)
            }
            ExprKind::Property { object, name } => {
                let object = self.evaluate(object, env)?;
                Ok(crate::methods::property(&object, name)?)
            }
            ExprKind::Assign { target, value } => {
                let value = self.operand(value, env)?;
                self.assign(target, value.clone(), env)?;
                Ok(value)
            }
            ExprKind::Array(items) => Ok(Value::array(self.evaluate_all(items, env)?)),
            ExprKind::Hash(entries) => {
                let mut pairs = IndexMap::new();
                for (key_expr, value_expr) in entries {
                    let key = self.operand(key_expr, env)?;
                    let hash_key = key.hash_key().ok_or_else(|| {
                        Diagnostic::runtime(format!("unusable as hash key: {}", key.type_name()))
                            .with_position(key_expr.position)
                    })?;
                    let value = self.operand(value_expr, env)?;
                    pairs.insert(hash_key, HashPair { key, value });
                }
                Ok(Value::hash(pairs))
            }
            ExprKind::Switch { subject, cases } => self.evaluate_switch(subject, cases, env),
            ExprKind::Error(message) => {
                let value = self.evaluate(message, env)?;
                let message = match value.kind() {
                    ValueKind::Error(inner) => inner.clone(),
                    _ => value.to_string(),
                };
                Err(Diagnostic::runtime(message).into())
            }
            ExprKind::Catch { body, handler } => self.evaluate_catch(body, handler.as_ref(), env),
        }
    }

    fn evaluate_all(&mut self, exprs: &[Expr], env: &EnvironmentRef) -> Eval<Vec<Value>> {
        exprs.iter().map(|expr| self.operand(expr, env)).collect()
    }

    /// Evaluates `expr` where its value is consumed. An Error value met
    /// here is raised again, so it ends the enclosing evaluation.
    fn operand(&mut self, expr: &Expr, env: &EnvironmentRef) -> Eval<Value> {
        let value = self.evaluate(expr, env)?;
        match value.kind() {
            ValueKind::Error(message) => Err(Diagnostic::runtime(message.clone())
                .with_position(expr.position)
                .into()),
            _ => Ok(value),
        }
    }

    /// Threads `input` in as the first argument of the call on the right.
    fn pipe_into(&mut self, input: Value, target: &Expr, env: &EnvironmentRef) -> Eval<Value> {
        match &target.kind {
            ExprKind::Call { function, args } => {
                let callee = self.operand(function, env)?;
                let mut argv = vec![input];
                argv.extend(self.evaluate_all(args, env)?);
                self.apply(&callee, argv)
            }
            ExprKind::MethodCall {
                object,
                method,
                args,
            } => {
                let receiver = self.evaluate(object, env)?;
                let mut argv = vec![input];
                argv.extend(self.evaluate_all(args, env)?);
                self.call_method(&receiver, method, argv)
            }
            ExprKind::Pipe { left, right } => {
                let intermediate = self.pipe_into(input, left, env)?;
                self.pipe_into(intermediate, right, env)
            }
            _ => {
                let callee = self.operand(target, env)?;
                self.apply(&callee, vec![input])
            }
        }
    }

    pub(crate) fn apply(&mut self, callee: &Value, args: Vec<Value>) -> Eval<Value> {
        match callee.kind() {
            ValueKind::Function(function) => self.call_function(function, args, None),
            ValueKind::Builtin(builtin) => Ok(builtin.call(&args)?),
            ValueKind::Class(class) => self.instantiate(class, args),
            _ => Err(Diagnostic::runtime(format!("not a function: {}", callee.type_name())).into()),
        }
    }

    /// Runs `function` in a fresh frame on top of its captured environment.
    /// With a `receiver`, `self` is bound and a leading `self` parameter is
    /// filled from it rather than from `args`.
    pub(crate) fn call_function(
        &mut self,
        function: &Function,
        args: Vec<Value>,
        receiver: Option<&Value>,
    ) -> Eval<Value> {
        let mut params = function.params();
        if receiver.is_some() && params.first().map(String::as_str) == Some("self") {
            params = &params[1..];
        }
        if params.len() != args.len() {
            return Err(Diagnostic::runtime(format!(
                "wrong number of arguments: want={}, got={}",
                params.len(),
                args.len()
            ))
            .into());
        }

        let frame = Environment::enclosed(&function.env);
        {
            let mut scope = frame.borrow_mut();
            if let Some(receiver) = receiver {
                scope.define("self", receiver.clone(), false);
            }
            for (name, value) in params.iter().zip(args) {
                scope.define(name.clone(), value, false);
            }
        }

        match self.eval_statements(&function.literal.body.statements, &frame) {
            Ok(value) | Err(Signal::Return(value)) => Ok(value),
            Err(Signal::Break) | Err(Signal::Continue) => {
                Err(Diagnostic::runtime("break or continue outside of loop").into())
            }
            Err(error) => Err(error),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, env: &EnvironmentRef) -> Eval<()> {
        match &target.kind {
            ExprKind::Identifier(name) => Ok(Environment::assign(env, name, value)?),
            ExprKind::Index { target, index } => {
                let container = self.operand(target, env)?;
                let index = self.operand(index, env)?;
                Ok(crate::methods::assign_index(&container, &index, value)?)
            }
            ExprKind::Property { object, name } => {
                let object = self.evaluate(object, env)?;
                Ok(crate::methods::assign_property(&object, name, value)?)
            }
            _ => Err(Diagnostic::new(DiagnosticKind::Syntax, "Invalid assignment target").into()),
        }
    }

    fn evaluate_switch(
        &mut self,
        subject: &Expr,
        cases: &[SwitchCase],
        env: &EnvironmentRef,
    ) -> Eval<Value> {
        let subject = self.operand(subject, env)?;
        for case in cases {
            let scope = match &case.pattern {
                CasePattern::Default => Rc::clone(env),
                CasePattern::Binding(name) => {
                    let scope = Environment::enclosed(env);
                    scope.borrow_mut().define(name.clone(), subject.clone(), false);
                    scope
                }
                CasePattern::Value(expr) => {
                    let candidate = self.evaluate(expr, env)?;
                    if !subject.deep_eq(&candidate) {
                        continue;
                    }
                    Rc::clone(env)
                }
            };
            if let Some(guard) = &case.guard {
                if !self.evaluate(guard, &scope)?.is_truthy() {
                    continue;
                }
            }
            return self.execute_block(&case.body, &scope);
        }
        Ok(Value::null())
    }

    fn evaluate_catch(
        &mut self,
        body: &Block,
        handler: Option<&CatchHandler>,
        env: &EnvironmentRef,
    ) -> Eval<Value> {
        let outcome = self.execute_block(body, env);
        let Some(handler) = handler else {
            return outcome;
        };
        let caught = match outcome {
            Err(Signal::Error(diag)) => {
                tracing::debug!(message = %diag.message, "caught runtime error");
                Value::error(diag.message)
            }
            Ok(value) if value.is_error() => value,
            other => return other,
        };
        let scope = Environment::enclosed(env);
        scope.borrow_mut().define(handler.name.clone(), caught, false);
        self.execute_block(&handler.body, &scope)
    }

    fn declare_class(
        &mut self,
        name: &str,
        superclass: Option<&str>,
        body: &Block,
        env: &EnvironmentRef,
    ) -> Eval<Value> {
        let parent = match superclass {
            Some(parent_name) => {
                let value = Environment::get(env, parent_name).ok_or_else(|| {
                    Diagnostic::runtime(format!("Undefined class: {parent_name}"))
                })?;
                match value.kind() {
                    ValueKind::Class(class) => Some(Rc::clone(class)),
                    _ => {
                        return Err(
                            Diagnostic::runtime(format!("{parent_name} is not a class")).into()
                        )
                    }
                }
            }
            None => None,
        };

        let (mut methods, mut fields) = match &parent {
            Some(parent) => (parent.methods.clone(), parent.fields.clone()),
            None => (IndexMap::new(), IndexMap::new()),
        };
        let class_env = Environment::enclosed(env);
        for stmt in &body.statements {
            match &stmt.kind {
                StmtKind::Var { name, value, .. } => match &value.kind {
                    ExprKind::Function(literal) => {
                        let method = Function {
                            literal: Rc::clone(literal),
                            env: Rc::clone(&class_env),
                        };
                        methods.insert(name.clone(), method);
                    }
                    _ => {
                        let default = self.evaluate(value, &class_env)?;
                        fields.insert(name.clone(), default);
                    }
                },
                _ => {
                    self.execute(stmt, &class_env)?;
                }
            }
        }

        tracing::trace!(
            class = name,
            superclass = ?superclass,
            methods = methods.len(),
            "declared class"
        );
        let class = Class {
            name: name.to_string(),
            superclass: parent,
            methods,
            fields,
            env: class_env,
        };
        env.borrow_mut()
            .define(name, Value::new(ValueKind::Class(Rc::new(class))), false);
        Ok(Value::null())
    }

    fn instantiate(&mut self, class: &Rc<Class>, args: Vec<Value>) -> Eval<Value> {
        let attributes = class
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.shallow_copy()))
            .collect();
        let instance = Value::new(ValueKind::Instance(Instance {
            class: Rc::clone(class),
            attributes: RefCell::new(attributes),
        }));
        tracing::trace!(class = %class.name, "instantiating");
        match class.methods.get("init") {
            Some(init) => {
                self.call_function(init, args, Some(&instance))?;
            }
            None if !args.is_empty() => {
                return Err(Diagnostic::runtime(format!(
                    "class {} has no init method but was given {} arguments",
                    class.name,
                    args.len()
                ))
                .into());
            }
            None => {}
        }
        Ok(instance)
    }
}

fn finish(outcome: Eval<Value>) -> Result<Value> {
    match outcome {
        Ok(value) | Err(Signal::Return(value)) => Ok(value),
        Err(Signal::Error(diag)) => Err(LynxError::Runtime(diag)),
        Err(Signal::Break) | Err(Signal::Continue) => Err(LynxError::Runtime(
            Diagnostic::runtime("break or continue outside of loop"),
        )),
    }
}
