//! Deferred method calls looked up by name.
//!
//! Methods of an owner type are registered in a [`MethodTable`] at startup,
//! each with its parameter types and an optional mode tag. A [`MethodInfo`]
//! (name plus positional [`Parameter`] values) is then bound against the
//! table to produce a [`BoundCall`]. A name or signature that does not match
//! any registered method binds to nothing.

use crate::error::Result;
use crate::executor::Task;
use crate::mode::{ExecutionMode, ModeSource, ModeTag};
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Arg = Box<dyn Any + Send>;
type Invoker<T> = Arc<dyn Fn(&T, Vec<Arg>) + Send + Sync>;

/// One positional argument and its runtime type.
pub struct Parameter {
    value: Arg,
    type_id: TypeId,
    type_name: &'static str,
}

impl Parameter {
    pub fn new<V: Any + Send>(value: V) -> Self {
        Self {
            value: Box::new(value),
            type_id: TypeId::of::<V>(),
            type_name: type_name::<V>(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("type", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Name and arguments of a call to bind against a [`MethodTable`].
#[derive(Debug)]
pub struct MethodInfo {
    name: String,
    parameters: Vec<Parameter>,
}

impl MethodInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameters(name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    pub fn arg<V: Any + Send>(mut self, value: V) -> Self {
        self.parameters.push(Parameter::new(value));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    fn signature(&self) -> Vec<TypeId> {
        self.parameters.iter().map(Parameter::type_id).collect()
    }
}

struct MethodEntry<T> {
    signature: Vec<TypeId>,
    tag: Option<ModeTag>,
    invoke: Invoker<T>,
}

/// Named methods of `T`, registered once and bound many times.
///
/// Overloads are allowed: entries sharing a name are told apart by their
/// parameter types.
pub struct MethodTable<T> {
    methods: HashMap<String, Vec<MethodEntry<T>>>,
}

impl<T> MethodTable<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    fn insert(&mut self, name: impl Into<String>, entry: MethodEntry<T>) -> &mut Self {
        let entries = self.methods.entry(name.into()).or_default();
        entries.retain(|existing| existing.signature != entry.signature);
        entries.push(entry);
        self
    }

    pub fn register0<F>(&mut self, name: impl Into<String>, mode: Option<ExecutionMode>, f: F) -> &mut Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.insert(
            name,
            MethodEntry {
                signature: Vec::new(),
                tag: mode.map(ModeTag::new),
                invoke: Arc::new(move |owner: &T, _args: Vec<Arg>| f(owner)),
            },
        )
    }

    pub fn register1<A, F>(&mut self, name: impl Into<String>, mode: Option<ExecutionMode>, f: F) -> &mut Self
    where
        A: Any + Send,
        F: Fn(&T, A) + Send + Sync + 'static,
    {
        self.insert(
            name,
            MethodEntry {
                signature: vec![TypeId::of::<A>()],
                tag: mode.map(ModeTag::new),
                invoke: Arc::new(move |owner: &T, args: Vec<Arg>| {
                    let mut args = args.into_iter();
                    match take::<A>(&mut args) {
                        Some(a) => f(owner, a),
                        None => tracing::warn!("bound call arguments did not match"),
                    }
                }),
            },
        )
    }

    pub fn register2<A, B, F>(
        &mut self,
        name: impl Into<String>,
        mode: Option<ExecutionMode>,
        f: F,
    ) -> &mut Self
    where
        A: Any + Send,
        B: Any + Send,
        F: Fn(&T, A, B) + Send + Sync + 'static,
    {
        self.insert(
            name,
            MethodEntry {
                signature: vec![TypeId::of::<A>(), TypeId::of::<B>()],
                tag: mode.map(ModeTag::new),
                invoke: Arc::new(move |owner: &T, args: Vec<Arg>| {
                    let mut args = args.into_iter();
                    match (take::<A>(&mut args), take::<B>(&mut args)) {
                        (Some(a), Some(b)) => f(owner, a, b),
                        _ => tracing::warn!("bound call arguments did not match"),
                    }
                }),
            },
        )
    }

    pub fn register3<A, B, C, F>(
        &mut self,
        name: impl Into<String>,
        mode: Option<ExecutionMode>,
        f: F,
    ) -> &mut Self
    where
        A: Any + Send,
        B: Any + Send,
        C: Any + Send,
        F: Fn(&T, A, B, C) + Send + Sync + 'static,
    {
        self.insert(
            name,
            MethodEntry {
                signature: vec![TypeId::of::<A>(), TypeId::of::<B>(), TypeId::of::<C>()],
                tag: mode.map(ModeTag::new),
                invoke: Arc::new(move |owner: &T, args: Vec<Arg>| {
                    let mut args = args.into_iter();
                    match (
                        take::<A>(&mut args),
                        take::<B>(&mut args),
                        take::<C>(&mut args),
                    ) {
                        (Some(a), Some(b), Some(c)) => f(owner, a, b, c),
                        _ => tracing::warn!("bound call arguments did not match"),
                    }
                }),
            },
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Tag registered for `name` with exactly these parameter types.
    pub fn tag(&self, name: &str, signature: &[TypeId]) -> Option<ModeTag> {
        self.find(name, signature).and_then(|entry| entry.tag)
    }

    /// Binds `info` to `owner`. `None` when no registered method has that
    /// name and parameter types.
    pub fn bind(&self, owner: Arc<T>, info: MethodInfo) -> Option<BoundCall> {
        let signature = info.signature();
        let entry = self.find(&info.name, &signature)?;

        let invoke = Arc::clone(&entry.invoke);
        let args: Vec<Arg> = info.parameters.into_iter().map(|p| p.value).collect();
        let task = Task::new(move || invoke(owner.as_ref(), args));

        Some(BoundCall {
            name: info.name,
            tag: entry.tag,
            task,
        })
    }

    fn find(&self, name: &str, signature: &[TypeId]) -> Option<&MethodEntry<T>> {
        self.methods
            .get(name)?
            .iter()
            .find(|entry| entry.signature == signature)
    }
}

impl<T> Default for MethodTable<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for MethodTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn take<V: Any>(args: &mut impl Iterator<Item = Arg>) -> Option<V> {
    args.next()
        .and_then(|arg| arg.downcast::<V>().ok())
        .map(|boxed| *boxed)
}

/// A method call bound to its owner and arguments, ready to post.
pub struct BoundCall {
    name: String,
    tag: Option<ModeTag>,
    task: Task,
}

impl BoundCall {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn into_task(self) -> Task {
        self.task
    }
}

impl ModeSource for BoundCall {
    fn mode_tag(&self) -> Result<Option<ModeTag>> {
        Ok(self.tag)
    }
}

impl fmt::Debug for BoundCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCall")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("task", &self.task)
            .finish()
    }
}
