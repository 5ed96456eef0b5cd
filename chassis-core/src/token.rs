// Provider identity tokens

use std::any::{type_name, TypeId};
use std::fmt;

/// Identity under which a provider is registered and resolved.
///
/// Most providers are keyed by their Rust type; explicit named tokens cover
/// cases where several providers share a type (configuration values,
/// connection handles) or where the consumer should not name the concrete
/// type at all.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    /// Identified by a Rust type.
    Type {
        id: TypeId,
        name: &'static str,
    },
    /// Identified by an explicit name.
    Named(String),
}

impl Token {
    /// Token for the type `T`.
    pub fn of<T: 'static>() -> Self {
        Token::Type {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// Explicitly named token.
    pub fn named(name: impl Into<String>) -> Self {
        Token::Named(name.into())
    }

    /// Human-readable name used in diagnostics.
    pub fn name(&self) -> &str {
        match self {
            Token::Type { name, .. } => name,
            Token::Named(name) => name,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserService;

    #[test]
    fn test_type_tokens_compare_by_type() {
        assert_eq!(Token::of::<UserService>(), Token::of::<UserService>());
        assert_ne!(Token::of::<UserService>(), Token::of::<String>());
    }

    #[test]
    fn test_named_tokens_compare_by_name() {
        assert_eq!(Token::named("DB"), Token::named("DB"));
        assert_ne!(Token::named("DB"), Token::named("CACHE"));
        assert_ne!(Token::named("DB"), Token::of::<String>());
    }

    #[test]
    fn test_display_uses_name() {
        assert_eq!(Token::named("DB").to_string(), "DB");
        assert!(Token::of::<UserService>().to_string().contains("UserService"));
    }
}
