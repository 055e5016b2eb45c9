//! # Accessor Macros
//!
//! Shorthand for building [`crate::MemberAccessor`]s from struct fields.
//!
//! ## field!
//!
//! ```ignore
//! field!(Point, x)
//!
//! // Expands to:
//! // MemberAccessor::field("x", |o: &Point| o.x.clone(), |o: &mut Point, v| o.x = v)
//! ```
//!
//! ## composite!
//!
//! ```ignore
//! composite!(Line, start: Point)
//!
//! // Expands to a composite accessor over `Line::start`, constructing
//! // `Point` through its `Default` impl.
//! ```
//!
//! Nested accessors are built by re-rooting a local accessor under its
//! composite parent with [`crate::MemberAccessor::nested`].

/// Scalar accessor over a named struct field. Evaluates to
/// `Result<MemberAccessor, BindError>`.
#[macro_export]
macro_rules! field {
    ($owner:ty, $field:ident) => {
        $crate::MemberAccessor::field(
            stringify!($field),
            |owner: &$owner| owner.$field.clone(),
            |owner: &mut $owner, value| owner.$field = value,
        )
    };
}

/// Composite accessor over a named struct field whose type implements
/// `Default`. Evaluates to `Result<MemberAccessor, BindError>`.
#[macro_export]
macro_rules! composite {
    ($owner:ty, $field:ident : $member:ty) => {
        $crate::MemberAccessor::composite::<$owner, $member, _>(
            stringify!($field),
            |owner: &$owner| &owner.$field,
            |owner: &mut $owner| &mut owner.$field,
            |owner: &mut $owner, value: $member| owner.$field = value,
        )
    };
}
