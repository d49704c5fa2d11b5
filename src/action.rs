//! Actions: the only way state changes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::state::State;

/// Mutates a volume's state.
///
/// A mutator may suspend; the dispatch engine awaits it to completion before the next action
/// of the same batch starts.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use volume_flow::{Action, Mutator, State};
///
/// struct Reset;
///
/// #[async_trait]
/// impl Mutator for Reset {
///     async fn apply(&self, state: &mut State, _args: &[Value]) -> anyhow::Result<()> {
///         state.set("count", 0);
///         Ok(())
///     }
/// }
///
/// let reset = Action::from_mutator(["count"], Reset);
/// assert_eq!(reset.fields(), ["count"]);
/// ```
#[async_trait]
pub trait Mutator: Send + Sync + 'static {
    /// Apply the mutation with the positional arguments the action was called with.
    async fn apply(&self, state: &mut State, args: &[Value]) -> anyhow::Result<()>;
}

struct FnMutator<F>(F);

#[async_trait]
impl<F> Mutator for FnMutator<F>
where
    F: Fn(&mut State, &[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
{
    async fn apply(&self, state: &mut State, args: &[Value]) -> anyhow::Result<()> {
        (self.0)(state, args)
    }
}

/// A mutator paired with the state fields it may touch.
///
/// The declared fields decide what re-renders; nothing is inferred from what the mutator
/// actually changed.
#[derive(Clone)]
pub struct Action {
    fields: Arc<[String]>,
    mutator: Arc<dyn Mutator>,
}

impl Action {
    /// An action backed by a synchronous closure.
    pub fn new<I, S, F>(fields: I, mutator: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&mut State, &[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self::from_mutator(fields, FnMutator(mutator))
    }

    /// An action backed by any [`Mutator`], including asynchronous ones.
    pub fn from_mutator<I, S>(fields: I, mutator: impl Mutator) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            mutator: Arc::new(mutator),
        }
    }

    /// The fields this action may touch.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Prepare a call without arguments.
    pub fn call(&self) -> BoundAction {
        self.with(Vec::new())
    }

    /// Prepare a call with positional arguments for the mutator.
    pub fn with(&self, args: impl IntoIterator<Item = Value>) -> BoundAction {
        BoundAction {
            action: self.clone(),
            args: args.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// An action together with the arguments it will be applied with.
#[derive(Clone, Debug)]
pub struct BoundAction {
    action: Action,
    args: Vec<Value>,
}

impl BoundAction {
    /// The fields the action may touch.
    pub fn fields(&self) -> &[String] {
        self.action.fields()
    }

    /// The arguments passed to the mutator.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub(crate) async fn apply(&self, state: &mut State) -> anyhow::Result<()> {
        self.action.mutator.apply(state, &self.args).await
    }
}

impl From<Action> for BoundAction {
    fn from(action: Action) -> Self {
        action.call()
    }
}

impl From<&Action> for BoundAction {
    fn from(action: &Action) -> Self {
        action.call()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_bound_action_passes_args() {
        let add = Action::new(["a"], |state, args| {
            let amount = args.first().and_then(Value::as_i64).unwrap_or(1);
            let current = state.get_i64("a").unwrap_or(0);
            state.set("a", current + amount);
            Ok(())
        });

        let mut state = State::from_value(json!({"a": 1})).unwrap();
        let call = add.with([json!(5)]);
        assert_eq!(call.args(), [json!(5)]);
        assert_eq!(call.fields(), ["a"]);

        block_on(call.apply(&mut state)).unwrap();
        assert_eq!(state.get_i64("a"), Some(6));

        block_on(BoundAction::from(&add).apply(&mut state)).unwrap();
        assert_eq!(state.get_i64("a"), Some(7));
    }

    #[test]
    fn test_mutator_error_is_returned() {
        let fail = Action::new(["a"], |_, _| Err(anyhow::anyhow!("nope")));
        let mut state = State::new();
        let err = block_on(fail.call().apply(&mut state)).unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
