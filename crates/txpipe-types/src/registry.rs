//! Registry trait for self-registering implementations.
//!
//! Pluggable components (key providers today) expose a `Registry` struct that
//! names the implementation as it appears in configuration and hands out its
//! factory function.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// The name used in configuration files to reference this implementation,
	/// e.g. "local" for `[account.implementations.local]`.
	const NAME: &'static str;

	/// The factory function type this implementation provides.
	type Factory;

	/// Get the factory function for this implementation.
	fn factory() -> Self::Factory;
}
