//! Type-safe ID management
//!
//! Every identifier in the migration engine is a distinct newtype so that
//! the two id spaces the diff logic depends on can never be conflated:
//! [`TemplateEntityId`] is the template-scoped key that stays stable across
//! template versions, while [`LiveEntityId`] is whatever the remote entity
//! system handed back on creation and is regenerated on every create.

/// Trait for types that can be used as ID markers
pub trait IdType: Send + Sync + 'static {
    /// Short prefix used in the display form (e.g. "deployment")
    const PREFIX: &'static str;

    /// The raw string key
    fn as_key(&self) -> &str;
}

/// Macro to define new ID types with minimal boilerplate
#[macro_export]
macro_rules! define_id_type {
    ($type_name:ident, $prefix:expr) => {
        #[derive(
            Debug,
            PartialEq,
            Eq,
            Hash,
            Clone,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize,
            ::schemars::JsonSchema,
        )]
        #[serde(transparent)]
        pub struct $type_name(pub String);

        impl $crate::id::IdType for $type_name {
            const PREFIX: &'static str = $prefix;

            fn as_key(&self) -> &str {
                &self.0
            }
        }

        impl $type_name {
            /// Create from any string-like value
            pub fn new(id: impl Into<String>) -> Self {
                $type_name(id.into())
            }

            /// Generate a new random (UUID-based) id
            pub fn generate() -> Self {
                $type_name(::uuid::Uuid::new_v4().simple().to_string())
            }

            /// Check whether this is the nil id
            pub fn is_nil(&self) -> bool {
                self.0 == ::uuid::Uuid::nil().simple().to_string()
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $type_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    "{}:{}",
                    <$type_name as $crate::id::IdType>::PREFIX,
                    self.0,
                )
            }
        }

        impl ::std::str::FromStr for $type_name {
            type Err = ::std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($type_name(s.to_string()))
            }
        }

        impl From<&str> for $type_name {
            fn from(s: &str) -> Self {
                $type_name(s.to_string())
            }
        }

        impl From<String> for $type_name {
            fn from(s: String) -> Self {
                $type_name(s)
            }
        }
    };
}

define_id_type!(DeploymentId, "deployment");
define_id_type!(TemplateId, "template");
define_id_type!(OrganizationId, "org");
define_id_type!(ActorId, "actor");

// The stable, template-scoped entity key. This is the join key for every
// diff; it survives version snapshots unchanged.
define_id_type!(TemplateEntityId, "entity");

// The remote system's own id for a live agent/block/group. Never reused
// after deletion, never meaningful across deployments.
define_id_type!(LiveEntityId, "live");
