//! Environment declaration resolution.
//!
//! Resolving an ordered list of declarations is a strict left-to-right fold:
//! each declaration is turned into a [`DeclarationCommand`] against the
//! environment produced by every earlier declaration, and the command is
//! applied before the next declaration is looked at. The returned command
//! history can be replayed against the same starting environment to
//! reproduce the result.

use std::collections::btree_map;
use std::collections::{BTreeMap, HashMap};

use super::expand::expand;
use super::item::EnvironmentItem;
use crate::error::{Result, RunwayError};

/// A resolved environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub key: String,
    pub value: String,
    /// Declared sensitive, or expanded from a sensitive variable.
    pub is_sensitive: bool,
}

impl Variable {
    /// Create a non-sensitive variable.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_sensitive: false,
        }
    }

    /// Create a sensitive variable.
    pub fn sensitive(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            is_sensitive: true,
            ..Self::new(key, value)
        }
    }
}

/// An environment snapshot: variables by unique key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, Variable>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an environment of non-sensitive variables from key/value pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut env = Self::new();
        for (key, value) in pairs {
            env.insert(Variable::new(key, value));
        }
        env
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.vars.get(key)
    }

    /// Look up a variable's value.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|var| var.value.as_str())
    }

    /// Check if a variable is present.
    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Insert or replace a variable.
    pub fn insert(&mut self, var: Variable) {
        self.vars.insert(var.key.clone(), var);
    }

    /// Remove a variable.
    pub fn remove(&mut self, key: &str) -> Option<Variable> {
        self.vars.remove(key)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if the environment is empty.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterate variables in key order.
    pub fn iter(&self) -> btree_map::Values<'_, String, Variable> {
        self.vars.values()
    }

    /// `KEY`/`VALUE` pairs in key order, suitable for a child process.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.vars
            .values()
            .map(|var| (var.key.clone(), var.value.clone()))
            .collect()
    }

    /// Values of every sensitive variable.
    pub fn sensitive_values(&self) -> Vec<String> {
        self.vars
            .values()
            .filter(|var| var.is_sensitive)
            .map(|var| var.value.clone())
            .collect()
    }
}

impl<'a> IntoIterator for &'a Environment {
    type Item = &'a Variable;
    type IntoIter = btree_map::Values<'a, String, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Something that can provide the initial environment for resolution.
pub trait EnvironmentSource {
    /// A snapshot of the environment. Resolution never mutates the source.
    fn environment(&self) -> Environment;
}

/// The host process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn environment(&self) -> Environment {
        let mut env = Environment::new();
        for (key, value) in std::env::vars_os() {
            let key = key.to_string_lossy();
            if key.is_empty() {
                continue;
            }
            env.insert(Variable::new(key, value.to_string_lossy()));
        }
        env
    }
}

impl EnvironmentSource for Environment {
    fn environment(&self) -> Environment {
        self.clone()
    }
}

impl EnvironmentSource for HashMap<String, String> {
    fn environment(&self) -> Environment {
        Environment::from_pairs(self.iter().map(|(k, v)| (k.clone(), v.clone())))
    }
}

/// The concrete effect of one declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationCommand {
    /// Set (or replace) a variable.
    Set(Variable),
    /// Remove a variable if present.
    Unset { key: String },
    /// Leave the environment untouched.
    Skip { key: String },
}

impl DeclarationCommand {
    /// The variable key this command is about.
    pub fn key(&self) -> &str {
        match self {
            DeclarationCommand::Set(var) => &var.key,
            DeclarationCommand::Unset { key } | DeclarationCommand::Skip { key } => key,
        }
    }

    /// Apply this command to `env`.
    pub fn apply(&self, env: &mut Environment) {
        match self {
            DeclarationCommand::Set(var) => env.insert(var.clone()),
            DeclarationCommand::Unset { key } => {
                env.remove(key);
            }
            DeclarationCommand::Skip { .. } => {}
        }
    }
}

/// Everything a resolution produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclarationSideEffects {
    /// One command per declaration, in declaration order.
    pub command_history: Vec<DeclarationCommand>,
    /// The environment after applying every command to the source snapshot.
    pub result_environment: Environment,
    /// Variables set by this resolution and still present at the end.
    pub evaluated_new_envs: Environment,
}

/// Resolve `declarations` in order against the environment of `source`.
///
/// # Errors
///
/// Returns [`RunwayError::MalformedDeclaration`] or
/// [`RunwayError::InvalidOption`] for the first declaration that cannot be
/// decomposed. No partial result is returned.
///
/// # Example
///
/// ```
/// use runway::env::{resolve_declarations, Environment, EnvironmentItem};
///
/// let source = Environment::from_pairs([("HOST", "example.com")]);
/// let declarations = vec![
///     EnvironmentItem::expanded("URL", "https://$HOST/api"),
///     EnvironmentItem::unset("HOST"),
/// ];
///
/// let effects = resolve_declarations(&declarations, &source).unwrap();
/// assert_eq!(effects.result_environment.value("URL"), Some("https://example.com/api"));
/// assert!(!effects.result_environment.contains("HOST"));
/// ```
pub fn resolve_declarations(
    declarations: &[EnvironmentItem],
    source: &dyn EnvironmentSource,
) -> Result<DeclarationSideEffects> {
    let mut env = source.environment();
    let mut new_envs = Environment::new();
    let mut command_history = Vec::with_capacity(declarations.len());

    for (index, declaration) in declarations.iter().enumerate() {
        let command = declaration_command(declaration, &env).map_err(|err| match err {
            RunwayError::MalformedDeclaration { key, message } => {
                RunwayError::MalformedDeclaration {
                    key,
                    message: format!("declaration #{}: {}", index + 1, message),
                }
            }
            other => other,
        })?;

        command.apply(&mut env);
        command.apply(&mut new_envs);
        command_history.push(command);
    }

    Ok(DeclarationSideEffects {
        command_history,
        result_environment: env,
        evaluated_new_envs: new_envs,
    })
}

/// Apply `history` in order to a copy of `initial`.
pub fn replay(history: &[DeclarationCommand], initial: &Environment) -> Environment {
    let mut env = initial.clone();
    for command in history {
        command.apply(&mut env);
    }
    env
}

/// Map one declaration to its command against the environment so far.
fn declaration_command(
    declaration: &EnvironmentItem,
    env: &Environment,
) -> Result<DeclarationCommand> {
    let (key, value) = declaration.key_value_pair()?;
    let options = declaration.options()?;

    if options.unsets() {
        return Ok(DeclarationCommand::Unset { key });
    }

    if options.skips_if_empty() && value.is_empty() {
        return Ok(DeclarationCommand::Skip { key });
    }

    let mut is_sensitive = options.sensitive();
    let value = if options.expands() {
        expand(&value, |name| match env.get(name) {
            Some(var) => {
                is_sensitive |= var.is_sensitive;
                var.value.clone()
            }
            None => String::new(),
        })
    } else {
        value
    };

    Ok(DeclarationCommand::Set(Variable {
        key,
        value,
        is_sensitive,
    }))
}
