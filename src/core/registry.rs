//! Type registry for database enums and composite types
//!
//! Enums are declared with [`db_enum!`](crate::db_enum), which generates the
//! Rust enum together with an [`EnumDescriptor`]: the database type name,
//! the naming convention used in storage, and the code-level variant names.
//! Encoding applies the convention to the variant name; decoding searches for
//! the variant whose encoding equals the stored text.

use super::error::{DatabaseError, Result};
use super::mapping::{FieldType, FromRecord, TypeDescriptor};
use super::naming::NamingConvention;
use std::collections::BTreeMap;

/// Static description of a database enum
#[derive(Debug, PartialEq, Eq)]
pub struct EnumDescriptor {
    /// Database-side type name (`publication_type`)
    pub name: &'static str,
    /// Spelling of the variants in storage
    pub convention: NamingConvention,
    /// Code-level variant names, in declaration order
    pub variants: &'static [&'static str],
}

impl EnumDescriptor {
    /// Database representation of a code-level variant name
    pub fn encode(&self, code_name: &str) -> Result<String> {
        if self.variants.contains(&code_name) {
            Ok(self.convention.apply(code_name))
        } else {
            Err(DatabaseError::unknown_enum_value(self.name, code_name))
        }
    }

    /// Code-level variant name for a stored value
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::UnknownEnumValue`] when no variant encodes to
    /// `db_value`.
    pub fn decode(&self, db_value: &str) -> Result<&'static str> {
        self.variants
            .iter()
            .copied()
            .find(|variant| self.convention.apply(variant) == db_value)
            .ok_or_else(|| DatabaseError::unknown_enum_value(self.name, db_value))
    }

    /// Convention-insensitive lookup, used for user and API input
    ///
    /// `"light novel"`, `"LIGHT_NOVEL"` and `"lightNovel"` all resolve to
    /// `LightNovel`.
    pub fn parse_lenient(&self, input: &str) -> Option<&'static str> {
        let wanted = NamingConvention::UpperSnakeCase.apply(input.trim());
        self.variants
            .iter()
            .copied()
            .find(|variant| NamingConvention::UpperSnakeCase.apply(variant) == wanted)
    }

    /// All stored representations, in declaration order
    pub fn db_values(&self) -> Vec<String> {
        self.variants
            .iter()
            .map(|variant| self.convention.apply(variant))
            .collect()
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeMap::new();
        for variant in self.variants {
            let encoded = self.convention.apply(variant);
            if let Some(previous) = seen.insert(encoded.clone(), *variant) {
                return Err(DatabaseError::other(format!(
                    "Enum {}: variants {} and {} both encode to '{}'",
                    self.name, previous, variant, encoded
                )));
            }
        }
        Ok(())
    }
}

/// A Rust enum with a database representation
///
/// Implemented by [`db_enum!`](crate::db_enum); implement by hand only when
/// the macro does not fit.
pub trait DbEnum: Sized + Copy + Send + Sync + 'static {
    /// Descriptor shared by all values of the enum
    const DESCRIPTOR: &'static EnumDescriptor;

    /// Every variant, in declaration order
    fn variants() -> &'static [Self];

    /// The variant name as written in code
    fn code_name(&self) -> &'static str;

    /// Stored representation
    fn to_db(&self) -> String {
        Self::DESCRIPTOR.convention.apply(self.code_name())
    }

    /// Decode a stored representation
    fn from_db(value: &str) -> Result<Self> {
        let name = Self::DESCRIPTOR.decode(value)?;
        Self::from_code_name(name)
            .ok_or_else(|| DatabaseError::unknown_enum_value(Self::DESCRIPTOR.name, value))
    }

    /// Variant with the given code-level name
    fn from_code_name(name: &str) -> Option<Self> {
        Self::variants()
            .iter()
            .copied()
            .find(|variant| variant.code_name() == name)
    }

    /// Convention-insensitive parse
    fn parse(input: &str) -> Option<Self> {
        Self::DESCRIPTOR
            .parse_lenient(input)
            .and_then(Self::from_code_name)
    }

    /// Key of the display label in the translation table
    fn translation_key(&self) -> String {
        format!(
            "{}.{}",
            Self::DESCRIPTOR.name,
            NamingConvention::SnakeCase.apply(self.code_name())
        )
    }
}

/// Declare an enum stored in the database
///
/// ```
/// use media_catalog::core::registry::DbEnum;
///
/// media_catalog::db_enum! {
///     /// Shelf the item sits on
///     pub enum Shelf as "shelf" with SnakeCase {
///         CurrentlyReading,
///         Finished,
///     }
/// }
///
/// assert_eq!(Shelf::CurrentlyReading.to_db(), "currently_reading");
/// assert_eq!(Shelf::from_db("finished").unwrap(), Shelf::Finished);
/// ```
///
/// The generated serde impls write SCREAMING_SNAKE_CASE and accept any
/// spelling on input.
#[macro_export]
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident as $db_name:literal with $convention:ident {
            $( $(#[$vmeta:meta])* $variant:ident ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $crate::core::registry::DbEnum for $name {
            const DESCRIPTOR: &'static $crate::core::registry::EnumDescriptor =
                &$crate::core::registry::EnumDescriptor {
                    name: $db_name,
                    convention: $crate::core::naming::NamingConvention::$convention,
                    variants: &[$(stringify!($variant)),+],
                };

            fn variants() -> &'static [Self] {
                &[$($name::$variant),+]
            }

            fn code_name(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl ::std::convert::From<$name> for $crate::core::value::DatabaseValue {
            fn from(value: $name) -> Self {
                $crate::core::value::DatabaseValue::String(
                    $crate::core::registry::DbEnum::to_db(&value),
                )
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S: ::serde::Serializer>(
                &self,
                serializer: S,
            ) -> ::std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(
                    &$crate::core::naming::NamingConvention::UpperSnakeCase
                        .apply($crate::core::registry::DbEnum::code_name(self)),
                )
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D: ::serde::Deserializer<'de>>(
                deserializer: D,
            ) -> ::std::result::Result<Self, D::Error> {
                let raw = <::std::string::String as ::serde::Deserialize>::deserialize(deserializer)?;
                <$name as $crate::core::registry::DbEnum>::parse(&raw).ok_or_else(|| {
                    <D::Error as ::serde::de::Error>::custom(format!(
                        "unknown {} value '{}'",
                        $db_name, raw
                    ))
                })
            }
        }
    };
}

/// Registry of the enum and composite types known to a schema
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    enums: BTreeMap<&'static str, &'static EnumDescriptor>,
    composites: BTreeMap<&'static str, &'static TypeDescriptor>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enum type
    ///
    /// # Errors
    ///
    /// Fails when two variants encode to the same stored value, or when a
    /// different enum is already registered under the same name.
    pub fn register_enum<E: DbEnum>(&mut self) -> Result<&mut Self> {
        self.register_enum_descriptor(E::DESCRIPTOR)?;
        Ok(self)
    }

    /// Register a record type together with every enum and composite it uses
    pub fn register_record<T: FromRecord>(&mut self) -> Result<&mut Self> {
        self.register_type_descriptor(T::DESCRIPTOR)?;
        Ok(self)
    }

    /// Register an enum descriptor directly
    pub fn register_enum_descriptor(&mut self, descriptor: &'static EnumDescriptor) -> Result<()> {
        descriptor.validate()?;
        match self.enums.get(descriptor.name) {
            Some(existing) if **existing != *descriptor => {
                Err(DatabaseError::other(format!(
                    "Enum {} is already registered with different variants",
                    descriptor.name
                )))
            }
            _ => {
                self.enums.insert(descriptor.name, descriptor);
                Ok(())
            }
        }
    }

    /// Register a composite descriptor and, recursively, its field types
    pub fn register_type_descriptor(&mut self, descriptor: &'static TypeDescriptor) -> Result<()> {
        if let Some(existing) = self.composites.get(descriptor.name) {
            if **existing == *descriptor {
                return Ok(());
            }
            return Err(DatabaseError::other(format!(
                "Type {} is already registered",
                descriptor.name
            )));
        }
        self.composites.insert(descriptor.name, descriptor);

        for field in descriptor.fields {
            match field.ty {
                FieldType::Enum(inner) => self.register_enum_descriptor(inner)?,
                FieldType::Composite(inner) => self.register_type_descriptor(inner)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// Look up an enum descriptor by database name
    pub fn enum_descriptor(&self, name: &str) -> Result<&'static EnumDescriptor> {
        self.enums
            .get(name)
            .copied()
            .ok_or_else(|| DatabaseError::UnknownType(name.to_string()))
    }

    /// Look up a composite descriptor by name
    pub fn type_descriptor(&self, name: &str) -> Result<&'static TypeDescriptor> {
        self.composites
            .get(name)
            .copied()
            .ok_or_else(|| DatabaseError::UnknownType(name.to_string()))
    }

    /// Encode a variant of a registered enum
    pub fn encode_enum(&self, enum_name: &str, code_name: &str) -> Result<String> {
        self.enum_descriptor(enum_name)?.encode(code_name)
    }

    /// Decode a stored value of a registered enum
    pub fn decode_enum(&self, enum_name: &str, db_value: &str) -> Result<&'static str> {
        self.enum_descriptor(enum_name)?.decode(db_value)
    }

    /// `CHECK` constraint restricting `column` to the stored values of an enum
    pub fn check_constraint(&self, column: &str, enum_name: &str) -> Result<String> {
        let values: Vec<String> = self
            .enum_descriptor(enum_name)?
            .db_values()
            .iter()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect();
        Ok(format!("CHECK ({} IN ({}))", column, values.join(", ")))
    }

    /// Names of all registered enums
    pub fn enum_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.enums.keys().copied()
    }

    /// Names of all registered composite types
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.composites.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mapping::{FieldDescriptor, Record};

    crate::db_enum! {
        enum Mood as "mood" with UpperSnakeCase {
            VeryHappy,
            Calm,
            HTTPError,
        }
    }

    const STATE: TypeDescriptor = TypeDescriptor {
        name: "state",
        table: None,
        convention: NamingConvention::SnakeCase,
        fields: &[FieldDescriptor::required("mood", FieldType::Enum(Mood::DESCRIPTOR))],
    };

    struct State;

    impl FromRecord for State {
        const DESCRIPTOR: &'static TypeDescriptor = &STATE;

        fn from_record(_record: &Record) -> Result<Self> {
            Ok(State)
        }
    }

    #[test]
    fn test_enum_round_trip() {
        for mood in Mood::variants() {
            assert_eq!(Mood::from_db(&mood.to_db()).unwrap(), *mood);
        }
        assert_eq!(Mood::VeryHappy.to_db(), "VERY_HAPPY");
        assert_eq!(Mood::HTTPError.to_db(), "HTTP_ERROR");
    }

    #[test]
    fn test_unknown_enum_value() {
        let err = Mood::from_db("very_happy").unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownEnumValue { .. }));
    }

    #[test]
    fn test_lenient_parse_and_serde() {
        assert_eq!(Mood::parse("very happy"), Some(Mood::VeryHappy));
        assert_eq!(Mood::parse("veryHappy"), Some(Mood::VeryHappy));
        assert_eq!(Mood::parse("grumpy"), None);

        let json = serde_json::to_string(&Mood::VeryHappy).unwrap();
        assert_eq!(json, "\"VERY_HAPPY\"");
        let back: Mood = serde_json::from_str("\"VeryHappy\"").unwrap();
        assert_eq!(back, Mood::VeryHappy);
        assert!(serde_json::from_str::<Mood>("\"nope\"").is_err());
    }

    #[test]
    fn test_translation_key() {
        assert_eq!(Mood::VeryHappy.translation_key(), "mood.very_happy");
    }

    #[test]
    fn test_registry_registers_nested_types() {
        let mut registry = TypeRegistry::new();
        registry.register_record::<State>().unwrap();

        assert!(registry.type_descriptor("state").is_ok());
        assert_eq!(registry.encode_enum("mood", "Calm").unwrap(), "CALM");
        assert_eq!(registry.decode_enum("mood", "CALM").unwrap(), "Calm");
        assert!(matches!(
            registry.enum_descriptor("colour"),
            Err(DatabaseError::UnknownType(_))
        ));
    }

    #[test]
    fn test_check_constraint() {
        let mut registry = TypeRegistry::new();
        registry.register_enum::<Mood>().unwrap();
        assert_eq!(
            registry.check_constraint("mood", "mood").unwrap(),
            "CHECK (mood IN ('VERY_HAPPY', 'CALM', 'HTTP_ERROR'))"
        );
    }

    #[test]
    fn test_colliding_encodings_rejected() {
        static CLASH: EnumDescriptor = EnumDescriptor {
            name: "clash",
            convention: NamingConvention::SnakeCase,
            variants: &["LightNovel", "Light_Novel"],
        };
        let mut registry = TypeRegistry::new();
        assert!(registry.register_enum_descriptor(&CLASH).is_err());
    }
}
