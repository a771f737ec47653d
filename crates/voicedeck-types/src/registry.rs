//! Registry trait for self-registering implementations.
//!
//! Each implementation module exposes a `Registry` struct naming the key it is
//! configured under and the factory that builds it.

/// Base trait for implementation registries.
pub trait ImplementationRegistry {
	/// Key of the implementation in TOML, for example `evm_alloy` under
	/// `[delivery.implementations]` or `http` under
	/// `[contributions.implementations]`.
	const NAME: &'static str;

	/// Factory function type of the implementation family.
	type Factory;

	/// Returns the factory building this implementation from its config table.
	fn factory() -> Self::Factory;
}
