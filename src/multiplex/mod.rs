//! Multiplexed dispatch: several record layouts in one stream.
//!
//! A [`Dispatcher`] holds an ordered list of registrations, one per entity
//! type, plus an optional default. Each registration maps its own entity
//! type into a user enum `E` through a wrap/project function pair.
//!
//! - Reading: the first registration whose predicate accepts the raw tokens
//!   decodes the record. The default is tried only after all of them.
//! - Writing: the first registration whose entity predicate accepts the
//!   value encodes it. Without an explicit predicate a registration accepts
//!   every value its projection can unwrap.
//!
//! When nothing matches the record fails with `NoMatchingSchema`.
//!
//! # Example
//!
//! ```
//! use flatbind::{field, Column, Dispatcher, TypeMapping, Variant};
//!
//! #[derive(Debug, Default)]
//! struct Header { kind: String, batch: i32 }
//! #[derive(Debug, Default)]
//! struct Detail { kind: String, amount: f64 }
//!
//! enum Line { Header(Header), Detail(Detail) }
//!
//! fn header(line: &Line) -> Option<&Header> {
//!     match line { Line::Header(h) => Some(h), _ => None }
//! }
//! fn detail(line: &Line) -> Option<&Detail> {
//!     match line { Line::Detail(d) => Some(d), _ => None }
//! }
//!
//! # fn main() -> Result<(), flatbind::BindError> {
//! let mut headers = TypeMapping::<Header>::new();
//! headers.member(field!(Header, kind)?, Column::string("kind"))?;
//! headers.member(field!(Header, batch)?, Column::int("batch"))?;
//!
//! let mut details = TypeMapping::<Detail>::new();
//! details.member(field!(Detail, kind)?, Column::string("kind"))?;
//! details.member(field!(Detail, amount)?, Column::float("amount"))?;
//!
//! let dispatcher = Dispatcher::new()
//!     .when(Variant::new(headers.finish(), Line::Header, header).reading_when(|raw| raw[0] == "H"))
//!     .otherwise(Variant::new(details.finish(), Line::Detail, detail));
//! # let _ = dispatcher;
//! # Ok(())
//! # }
//! ```

mod stream;

pub use stream::{AsyncMultiplexedReader, AsyncMultiplexedWriter, MultiplexedReader, MultiplexedWriter};

use std::any::Any;
use std::cell::OnceCell;
use std::sync::Arc;

use crate::codec::RecordContext;
use crate::config::MapperOptions;
use crate::error::BindError;
use crate::mapper::EntityMapper;
use crate::mapping::Mapping;
use crate::schema::Schema;
use crate::value::Value;

/// Decides from the raw tokens whether a registration reads a record.
pub type RawPredicate = Box<dyn Fn(&[String]) -> bool + Send + Sync>;

/// Decides whether a registration writes a value.
pub type EntityPredicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// One entity type registered with a [`Dispatcher`].
pub struct Variant<T, E> {
    name: String,
    mapping: Mapping<T>,
    options: MapperOptions,
    wrap: fn(T) -> E,
    project: for<'a> fn(&'a E) -> Option<&'a T>,
    read_when: Option<RawPredicate>,
    write_when: Option<EntityPredicate<E>>,
    mapper: OnceCell<EntityMapper<T>>,
}

impl<T: Any, E> Variant<T, E> {
    /// # Arguments
    ///
    /// * `mapping` - Bindings of the entity type
    /// * `wrap` - Lifts a decoded entity into the dispatcher's value type
    /// * `project` - Borrows the entity back out of a value, if it holds one
    pub fn new(mapping: Mapping<T>, wrap: fn(T) -> E, project: for<'a> fn(&'a E) -> Option<&'a T>) -> Self {
        let name = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            mapping,
            options: MapperOptions::default(),
            wrap,
            project,
            read_when: None,
            write_when: None,
            mapper: OnceCell::new(),
        }
    }

    /// Name used in log output.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn reading_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&[String]) -> bool + Send + Sync + 'static,
    {
        self.read_when = Some(Box::new(predicate));
        self
    }

    pub fn writing_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.write_when = Some(Box::new(predicate));
        self
    }

    fn mapper(&self) -> Result<&EntityMapper<T>, BindError> {
        if let Some(mapper) = self.mapper.get() {
            return Ok(mapper);
        }
        let mapper = EntityMapper::from_mapping(&self.mapping, &self.options)?;
        tracing::debug!(variant = %self.name, "compiled multiplexed mapper");
        Ok(self.mapper.get_or_init(|| mapper))
    }
}

/// Type-erased view of a [`Variant`] over the dispatcher's value type.
trait Registration<E> {
    fn name(&self) -> &str;
    fn schema(&self) -> &Arc<Schema>;
    fn set_options(&mut self, options: &MapperOptions);
    fn reads(&self, raw: &[String]) -> bool;
    fn writes(&self, value: &E) -> bool;
    fn projects(&self, value: &E) -> bool;
    fn decode(&self, ctx: &RecordContext, values: &[Value]) -> Result<E, BindError>;
    fn encode(&self, ctx: &RecordContext, value: &E) -> Result<Vec<Value>, BindError>;
}

impl<T: Any, E> Registration<E> for Variant<T, E> {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Arc<Schema> {
        self.mapping.schema()
    }

    fn set_options(&mut self, options: &MapperOptions) {
        self.options = options.clone();
    }

    fn reads(&self, raw: &[String]) -> bool {
        self.read_when.as_ref().is_some_and(|predicate| predicate(raw))
    }

    fn writes(&self, value: &E) -> bool {
        match &self.write_when {
            Some(predicate) => predicate(value),
            None => self.projects(value),
        }
    }

    fn projects(&self, value: &E) -> bool {
        (self.project)(value).is_some()
    }

    fn decode(&self, ctx: &RecordContext, values: &[Value]) -> Result<E, BindError> {
        self.mapper()?.read(ctx, values).map(self.wrap)
    }

    fn encode(&self, ctx: &RecordContext, value: &E) -> Result<Vec<Value>, BindError> {
        let entity = (self.project)(value).ok_or_else(|| BindError::InvalidTarget {
            member: self.name.clone(),
            expected: std::any::type_name::<T>(),
        })?;
        self.mapper()?.write_values(ctx, entity)
    }
}

/// Routes records to per-type mappers.
pub struct Dispatcher<E> {
    registrations: Vec<Box<dyn Registration<E>>>,
    default: Option<Box<dyn Registration<E>>>,
    options: MapperOptions,
}

impl<E: 'static> Dispatcher<E> {
    pub fn new() -> Self {
        Self::with_options(MapperOptions::default())
    }

    /// Mapper options applied to every registration.
    pub fn with_options(options: MapperOptions) -> Self {
        Self {
            registrations: Vec::new(),
            default: None,
            options,
        }
    }

    /// Append a registration. Registrations are tried in insertion order.
    pub fn when<T: Any>(mut self, mut variant: Variant<T, E>) -> Self {
        variant.set_options(&self.options);
        self.registrations.push(Box::new(variant));
        self
    }

    /// Registration used when no other one matches. Replaces any previous
    /// default.
    ///
    /// Its read and write predicates are not consulted: it reads every
    /// record no other registration claims and writes every value it can
    /// project.
    pub fn otherwise<T: Any>(mut self, mut variant: Variant<T, E>) -> Self {
        variant.set_options(&self.options);
        self.default = Some(Box::new(variant));
        self
    }

    pub fn len(&self) -> usize {
        self.registrations.len() + usize::from(self.default.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select_for_read(&self, raw: &[String]) -> Result<&dyn Registration<E>, BindError> {
        let selected = self
            .registrations
            .iter()
            .find(|r| r.reads(raw))
            .or(self.default.as_ref())
            .ok_or(BindError::NoMatchingSchema)?;
        Ok(selected.as_ref())
    }

    fn select_for_write(&self, value: &E) -> Result<&dyn Registration<E>, BindError> {
        let selected = self
            .registrations
            .iter()
            .find(|r| r.writes(value))
            .or_else(|| self.default.as_ref().filter(|d| d.projects(value)))
            .ok_or(BindError::NoMatchingSchema)?;
        Ok(selected.as_ref())
    }

    /// Schema that would read `raw`.
    pub fn schema_for(&self, raw: &[String]) -> Result<&Arc<Schema>, BindError> {
        Ok(self.select_for_read(raw)?.schema())
    }

    /// Decode one record's raw tokens.
    pub fn decode(&self, ctx: &RecordContext, raw: &[String]) -> Result<E, BindError> {
        let registration = self.select_for_read(raw)?;
        tracing::trace!(
            variant = registration.name(),
            record = ctx.physical_record_number(),
            "dispatching record"
        );
        let values = registration.schema().parse_record(ctx, raw)?;
        registration.decode(ctx, &values)
    }

    /// Encode one value into raw tokens.
    pub fn encode(&self, ctx: &RecordContext, value: &E) -> Result<Vec<String>, BindError> {
        let registration = self.select_for_write(value)?;
        let values = registration.encode(ctx, value)?;
        Ok(registration.schema().format_record(ctx, &values)?)
    }

    /// Column names of the schema that would write `value`.
    pub fn header_for(&self, value: &E) -> Result<Vec<String>, BindError> {
        Ok(self.select_for_write(value)?.schema().column_names())
    }
}

impl<E: 'static> Default for Dispatcher<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;
    use crate::field;
    use crate::mapping::TypeMapping;

    #[derive(Debug, Default, PartialEq)]
    struct Credit {
        tag: String,
        amount: i64,
    }

    #[derive(Debug, Default, PartialEq)]
    struct Debit {
        tag: String,
        amount: i64,
    }

    #[derive(Debug, PartialEq)]
    enum Entry {
        Credit(Credit),
        Debit(Debit),
    }

    fn credit(entry: &Entry) -> Option<&Credit> {
        match entry {
            Entry::Credit(c) => Some(c),
            _ => None,
        }
    }

    fn debit(entry: &Entry) -> Option<&Debit> {
        match entry {
            Entry::Debit(d) => Some(d),
            _ => None,
        }
    }

    fn credits() -> Mapping<Credit> {
        let mut mapping = TypeMapping::<Credit>::new();
        mapping.member(field!(Credit, tag).unwrap(), Column::string("tag")).unwrap();
        mapping.member(field!(Credit, amount).unwrap(), Column::int("amount")).unwrap();
        mapping.finish()
    }

    fn debits() -> Mapping<Debit> {
        let mut mapping = TypeMapping::<Debit>::new();
        mapping.member(field!(Debit, tag).unwrap(), Column::string("tag")).unwrap();
        mapping.member(field!(Debit, amount).unwrap(), Column::int("amount")).unwrap();
        mapping.ignored(Column::ignored("memo"));
        mapping.finish()
    }

    fn raw(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_first_match_wins_and_default_is_last() {
        let dispatcher = Dispatcher::new()
            .otherwise(Variant::new(debits(), Entry::Debit, debit))
            .when(Variant::new(credits(), Entry::Credit, credit).reading_when(|raw| raw[0] == "C"))
            .when(Variant::new(debits(), Entry::Debit, debit).reading_when(|raw| raw[0].starts_with('C')));
        let ctx = RecordContext::default();

        let first = dispatcher.decode(&ctx, &raw(&["C", "10"])).unwrap();
        let fallback = dispatcher.decode(&ctx, &raw(&["D", "4", "memo"])).unwrap();

        assert_eq!(
            first,
            Entry::Credit(Credit {
                tag: "C".to_string(),
                amount: 10
            })
        );
        assert!(matches!(fallback, Entry::Debit(Debit { amount: 4, .. })));
        assert_eq!(dispatcher.len(), 3);
    }

    #[test]
    fn test_no_matching_schema() {
        let dispatcher = Dispatcher::new()
            .when(Variant::new(credits(), Entry::Credit, credit).reading_when(|raw| raw[0] == "C"));
        let ctx = RecordContext::default();

        assert!(matches!(
            dispatcher.decode(&ctx, &raw(&["X", "1"])),
            Err(BindError::NoMatchingSchema)
        ));
        let entry = Entry::Debit(Debit::default());
        assert!(matches!(
            dispatcher.encode(&ctx, &entry),
            Err(BindError::NoMatchingSchema)
        ));
    }

    #[test]
    fn test_encode_selects_by_projection() {
        let dispatcher = Dispatcher::new()
            .when(Variant::new(credits(), Entry::Credit, credit).reading_when(|raw| raw[0] == "C"))
            .when(Variant::new(debits(), Entry::Debit, debit).reading_when(|raw| raw[0] == "D"));
        let ctx = RecordContext::default();
        let entry = Entry::Debit(Debit {
            tag: "D".to_string(),
            amount: 7,
        });

        assert_eq!(dispatcher.encode(&ctx, &entry).unwrap(), raw(&["D", "7", ""]));
        assert_eq!(dispatcher.header_for(&entry).unwrap(), raw(&["tag", "amount", "memo"]));
    }

    #[test]
    fn test_write_predicate_overrides_projection() {
        let dispatcher = Dispatcher::new()
            .when(
                Variant::new(credits(), Entry::Credit, credit)
                    .reading_when(|raw| raw[0] == "C")
                    .writing_when(|entry| matches!(entry, Entry::Credit(c) if c.amount > 0)),
            )
            .otherwise(Variant::new(credits(), Entry::Credit, credit).named("zero-credit"));
        let ctx = RecordContext::default();
        let zero = Entry::Credit(Credit {
            tag: "Z".to_string(),
            amount: 0,
        });

        assert_eq!(dispatcher.encode(&ctx, &zero).unwrap(), raw(&["Z", "0"]));
    }

    #[test]
    fn test_default_ignores_its_write_predicate() {
        let dispatcher = Dispatcher::new()
            .when(Variant::new(credits(), Entry::Credit, credit).reading_when(|raw| raw[0] == "C"))
            .otherwise(Variant::new(debits(), Entry::Debit, debit).writing_when(|_| false));
        let ctx = RecordContext::default();
        let entry = Entry::Debit(Debit {
            tag: "D".to_string(),
            amount: 2,
        });

        assert_eq!(dispatcher.encode(&ctx, &entry).unwrap(), raw(&["D", "2", ""]));
    }
}
