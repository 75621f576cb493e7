//! Enums, structs and unions from `gold.thrift`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use bytes::Bytes;
use thrum_protocol::{
    EnumSet, EnumSpec, FieldSpec, canonical_bits, ProtocolError, ProtocolReader,
    ProtocolWriter, Requiredness, Result, StructKind, StructSpec, ThriftEnum,
    ThriftStruct, TypeSpec, WireValue, enum_wire_value, read_field,
    read_struct, read_union, require, struct_wire_value, write_field,
    write_optional_field, write_struct,
};

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

pub static ROLE_SPEC: EnumSpec = EnumSpec {
    name: "Role",
    values: &[("GUEST", 0), ("MEMBER", 1), ("ADMIN", 5)],
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Role {
    #[default]
    Guest,
    Member,
    Admin,
}

impl ThriftEnum for Role {
    const NAME: &'static str = "Role";
    const VALUES: &'static [Self] = &[Role::Guest, Role::Member, Role::Admin];

    fn value(self) -> i32 {
        match self {
            Role::Guest => 0,
            Role::Member => 1,
            Role::Admin => 5,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Role::Guest => "GUEST",
            Role::Member => "MEMBER",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

enum_wire_value!(Role);

static ROLE_TYPE: TypeSpec = TypeSpec::Enum(&ROLE_SPEC);

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

pub static USER_SPEC: StructSpec = StructSpec {
    name: "User",
    kind: StructKind::Struct,
    fields: &[
        FieldSpec {
            id: 1,
            name: "id",
            ty: TypeSpec::I32,
            requiredness: Requiredness::Required,
        },
        FieldSpec {
            id: 2,
            name: "name",
            ty: TypeSpec::String,
            requiredness: Requiredness::Optional,
        },
    ],
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct User {
    id: i32,
    name: Option<String>,
}

impl User {
    pub fn new(id: i32) -> Self {
        Self { id, name: None }
    }

    pub fn builder() -> UserBuilder {
        UserBuilder::default()
    }

    /// A builder holding this value's fields.
    pub fn copy(&self) -> UserBuilder {
        UserBuilder {
            id: Some(self.id),
            name: self.name.clone(),
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserBuilder {
    id: Option<i32>,
    name: Option<String>,
}

impl UserBuilder {
    pub fn id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn unset_id(mut self) -> Self {
        self.id = None;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unset_name(mut self) -> Self {
        self.name = None;
        self
    }

    pub fn build(self) -> Result<User> {
        Ok(User {
            id: require(self.id, "id", "User")?,
            name: self.name,
        })
    }
}

impl ThriftStruct for User {
    fn spec() -> &'static StructSpec {
        &USER_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "User", |out| {
            write_field(out, 1, &self.id)?;
            write_optional_field(out, 2, &self.name)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut builder = UserBuilder::default();
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut builder.id),
            2 => read_field(input, field, &mut builder.name),
            _ => input.skip(field.ttype),
        })?;
        builder.build()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User(id={}", self.id)?;
        if let Some(name) = &self.name {
            write!(f, ", name={name:?}")?;
        }
        f.write_str(")")
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

pub const PROFILE_DEFAULT_SCORE: f64 = 1.5;
pub const PROFILE_DEFAULT_ACTIVE: bool = true;

pub static PROFILE_SPEC: StructSpec = StructSpec {
    name: "Profile",
    kind: StructKind::Struct,
    fields: &[
        FieldSpec {
            id: 1,
            name: "user",
            ty: TypeSpec::Struct(&USER_SPEC),
            requiredness: Requiredness::Required,
        },
        FieldSpec {
            id: 2,
            name: "aliases",
            ty: TypeSpec::List(&TypeSpec::String),
            requiredness: Requiredness::Default,
        },
        FieldSpec {
            id: 3,
            name: "roles",
            ty: TypeSpec::Set(&ROLE_TYPE),
            requiredness: Requiredness::Default,
        },
        FieldSpec {
            id: 4,
            name: "counters",
            ty: TypeSpec::Map(&TypeSpec::String, &TypeSpec::I64),
            requiredness: Requiredness::Default,
        },
        FieldSpec {
            id: 5,
            name: "avatar",
            ty: TypeSpec::Binary,
            requiredness: Requiredness::Optional,
        },
        FieldSpec {
            id: 6,
            name: "score",
            ty: TypeSpec::Double,
            requiredness: Requiredness::Default,
        },
        FieldSpec {
            id: 7,
            name: "active",
            ty: TypeSpec::Bool,
            requiredness: Requiredness::Default,
        },
        FieldSpec {
            id: 8,
            name: "level",
            ty: TypeSpec::I16,
            requiredness: Requiredness::Default,
        },
        FieldSpec {
            id: 9,
            name: "flags",
            ty: TypeSpec::Byte,
            requiredness: Requiredness::Default,
        },
        FieldSpec {
            id: 10,
            name: "groups",
            ty: TypeSpec::List(&TypeSpec::Map(&TypeSpec::String, &TypeSpec::Set(&TypeSpec::I32))),
            requiredness: Requiredness::Optional,
        },
        FieldSpec {
            id: 11,
            name: "primary_role",
            ty: TypeSpec::Enum(&ROLE_SPEC),
            requiredness: Requiredness::Optional,
        },
    ],
};

/// Group name to member ids.
pub type Group = BTreeMap<String, BTreeSet<i32>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    user: User,
    aliases: Vec<String>,
    roles: EnumSet<Role>,
    counters: BTreeMap<String, i64>,
    avatar: Option<Bytes>,
    score: f64,
    active: bool,
    level: i16,
    flags: i8,
    groups: Option<Vec<Group>>,
    primary_role: Option<Role>,
}

impl Profile {
    /// A profile with every non-optional field at its default.
    pub fn new(user: User) -> Self {
        Self {
            user,
            aliases: Vec::new(),
            roles: EnumSet::new(),
            counters: BTreeMap::new(),
            avatar: None,
            score: PROFILE_DEFAULT_SCORE,
            active: PROFILE_DEFAULT_ACTIVE,
            level: 0,
            flags: 0,
            groups: None,
            primary_role: None,
        }
    }

    pub fn builder() -> ProfileBuilder {
        ProfileBuilder::default()
    }

    pub fn copy(&self) -> ProfileBuilder {
        ProfileBuilder {
            user: Some(self.user.clone()),
            aliases: Some(self.aliases.clone()),
            roles: Some(self.roles),
            counters: Some(self.counters.clone()),
            avatar: self.avatar.clone(),
            score: Some(self.score),
            active: Some(self.active),
            level: Some(self.level),
            flags: Some(self.flags),
            groups: self.groups.clone(),
            primary_role: self.primary_role,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn roles(&self) -> EnumSet<Role> {
        self.roles
    }

    pub fn counters(&self) -> &BTreeMap<String, i64> {
        &self.counters
    }

    pub fn avatar(&self) -> Option<&Bytes> {
        self.avatar.as_ref()
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn level(&self) -> i16 {
        self.level
    }

    pub fn flags(&self) -> i8 {
        self.flags
    }

    pub fn groups(&self) -> Option<&[Group]> {
        self.groups.as_deref()
    }

    pub fn primary_role(&self) -> Option<Role> {
        self.primary_role
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProfileBuilder {
    user: Option<User>,
    aliases: Option<Vec<String>>,
    roles: Option<EnumSet<Role>>,
    counters: Option<BTreeMap<String, i64>>,
    avatar: Option<Bytes>,
    score: Option<f64>,
    active: Option<bool>,
    level: Option<i16>,
    flags: Option<i8>,
    groups: Option<Vec<Group>>,
    primary_role: Option<Role>,
}

impl ProfileBuilder {
    pub fn user(mut self, user: User) -> Self {
        self.user = Some(user);
        self
    }

    pub fn unset_user(mut self) -> Self {
        self.user = None;
        self
    }

    pub fn aliases(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.aliases = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    pub fn unset_aliases(mut self) -> Self {
        self.aliases = None;
        self
    }

    pub fn roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = Some(roles.into_iter().collect());
        self
    }

    pub fn unset_roles(mut self) -> Self {
        self.roles = None;
        self
    }

    pub fn counters(mut self, counters: BTreeMap<String, i64>) -> Self {
        self.counters = Some(counters);
        self
    }

    pub fn unset_counters(mut self) -> Self {
        self.counters = None;
        self
    }

    pub fn avatar(mut self, avatar: impl Into<Bytes>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn unset_avatar(mut self) -> Self {
        self.avatar = None;
        self
    }

    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn unset_score(mut self) -> Self {
        self.score = None;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    pub fn unset_active(mut self) -> Self {
        self.active = None;
        self
    }

    pub fn level(mut self, level: i16) -> Self {
        self.level = Some(level);
        self
    }

    pub fn unset_level(mut self) -> Self {
        self.level = None;
        self
    }

    pub fn flags(mut self, flags: i8) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn unset_flags(mut self) -> Self {
        self.flags = None;
        self
    }

    pub fn groups(mut self, groups: Vec<Group>) -> Self {
        self.groups = Some(groups);
        self
    }

    pub fn unset_groups(mut self) -> Self {
        self.groups = None;
        self
    }

    pub fn primary_role(mut self, role: Role) -> Self {
        self.primary_role = Some(role);
        self
    }

    pub fn unset_primary_role(mut self) -> Self {
        self.primary_role = None;
        self
    }

    pub fn build(self) -> Result<Profile> {
        Ok(Profile {
            user: require(self.user, "user", "Profile")?,
            aliases: self.aliases.unwrap_or_default(),
            roles: self.roles.unwrap_or_default(),
            counters: self.counters.unwrap_or_default(),
            avatar: self.avatar,
            score: self.score.unwrap_or(PROFILE_DEFAULT_SCORE),
            active: self.active.unwrap_or(PROFILE_DEFAULT_ACTIVE),
            level: self.level.unwrap_or_default(),
            flags: self.flags.unwrap_or_default(),
            groups: self.groups,
            primary_role: self.primary_role,
        })
    }
}

impl ThriftStruct for Profile {
    fn spec() -> &'static StructSpec {
        &PROFILE_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "Profile", |out| {
            write_field(out, 1, &self.user)?;
            write_field(out, 2, &self.aliases)?;
            write_field(out, 3, &self.roles)?;
            write_field(out, 4, &self.counters)?;
            write_optional_field(out, 5, &self.avatar)?;
            write_field(out, 6, &self.score)?;
            write_field(out, 7, &self.active)?;
            write_field(out, 8, &self.level)?;
            write_field(out, 9, &self.flags)?;
            write_optional_field(out, 10, &self.groups)?;
            write_optional_field(out, 11, &self.primary_role)
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        let mut b = ProfileBuilder::default();
        read_struct(input, |input, field| match field.id {
            1 => read_field(input, field, &mut b.user),
            2 => read_field(input, field, &mut b.aliases),
            3 => read_field(input, field, &mut b.roles),
            4 => read_field(input, field, &mut b.counters),
            5 => read_field(input, field, &mut b.avatar),
            6 => read_field(input, field, &mut b.score),
            7 => read_field(input, field, &mut b.active),
            8 => read_field(input, field, &mut b.level),
            9 => read_field(input, field, &mut b.flags),
            10 => read_field(input, field, &mut b.groups),
            11 => read_field(input, field, &mut b.primary_role),
            _ => input.skip(field.ttype),
        })?;
        b.build()
    }
}

impl Hash for Profile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.user.hash(state);
        self.aliases.hash(state);
        self.roles.hash(state);
        self.counters.hash(state);
        self.avatar.hash(state);
        // 0.0 == -0.0, so both must hash alike.
        canonical_bits(self.score).hash(state);
        self.active.hash(state);
        self.level.hash(state);
        self.flags.hash(state);
        self.groups.hash(state);
        self.primary_role.hash(state);
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Profile(user={}, aliases={:?}, roles={:?}, counters={:?}",
            self.user, self.aliases, self.roles, self.counters
        )?;
        if let Some(avatar) = &self.avatar {
            write!(f, ", avatar={avatar:?}")?;
        }
        write!(
            f,
            ", score={:?}, active={}, level={}, flags={}",
            self.score, self.active, self.level, self.flags
        )?;
        if let Some(groups) = &self.groups {
            write!(f, ", groups={groups:?}")?;
        }
        if let Some(role) = self.primary_role {
            write!(f, ", primary_role={role}")?;
        }
        f.write_str(")")
    }
}

// ---------------------------------------------------------------------------
// Contact
// ---------------------------------------------------------------------------

pub static CONTACT_SPEC: StructSpec = StructSpec {
    name: "Contact",
    kind: StructKind::Union,
    fields: &[
        FieldSpec {
            id: 1,
            name: "email",
            ty: TypeSpec::String,
            requiredness: Requiredness::Optional,
        },
        FieldSpec {
            id: 2,
            name: "phone",
            ty: TypeSpec::I64,
            requiredness: Requiredness::Optional,
        },
        FieldSpec {
            id: 3,
            name: "referral",
            ty: TypeSpec::Struct(&USER_SPEC),
            requiredness: Requiredness::Optional,
        },
    ],
};

/// How to reach a user. Exactly one variant is ever set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Contact {
    Email(String),
    Phone(i64),
    Referral(User),
}

impl Contact {
    pub fn builder() -> ContactBuilder {
        ContactBuilder::default()
    }

    pub fn copy(&self) -> ContactBuilder {
        let builder = ContactBuilder::default();
        match self {
            Contact::Email(email) => builder.email(email.clone()),
            Contact::Phone(phone) => builder.phone(*phone),
            Contact::Referral(user) => builder.referral(user.clone()),
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Contact::Email(email) => Some(email),
            _ => None,
        }
    }

    pub fn phone(&self) -> Option<i64> {
        match self {
            Contact::Phone(phone) => Some(*phone),
            _ => None,
        }
    }

    pub fn referral(&self) -> Option<&User> {
        match self {
            Contact::Referral(user) => Some(user),
            _ => None,
        }
    }
}

/// Stages a [`Contact`]. [`build`](Self::build) fails unless exactly one
/// slot is set.
#[derive(Debug, Clone, Default)]
pub struct ContactBuilder {
    email: Option<String>,
    phone: Option<i64>,
    referral: Option<User>,
}

impl ContactBuilder {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn unset_email(mut self) -> Self {
        self.email = None;
        self
    }

    pub fn phone(mut self, phone: i64) -> Self {
        self.phone = Some(phone);
        self
    }

    pub fn unset_phone(mut self) -> Self {
        self.phone = None;
        self
    }

    pub fn referral(mut self, user: User) -> Self {
        self.referral = Some(user);
        self
    }

    pub fn unset_referral(mut self) -> Self {
        self.referral = None;
        self
    }

    pub fn build(self) -> Result<Contact> {
        let mut set = [
            self.email.map(Contact::Email),
            self.phone.map(Contact::Phone),
            self.referral.map(Contact::Referral),
        ]
        .into_iter()
        .flatten();

        match (set.next(), set.next()) {
            (Some(contact), None) => Ok(contact),
            (None, _) => Err(ProtocolError::UnionNoValue("Contact")),
            (Some(_), Some(_)) => Err(ProtocolError::UnionMultipleValues("Contact")),
        }
    }
}

impl ThriftStruct for Contact {
    fn spec() -> &'static StructSpec {
        &CONTACT_SPEC
    }

    fn write<W: ProtocolWriter + ?Sized>(&self, out: &mut W) -> Result<()> {
        write_struct(out, "Contact", |out| match self {
            Contact::Email(email) => write_field(out, 1, email),
            Contact::Phone(phone) => write_field(out, 2, phone),
            Contact::Referral(user) => write_field(out, 3, user),
        })
    }

    fn read<R: ProtocolReader + ?Sized>(input: &mut R) -> Result<Self> {
        read_union(input, "Contact", |input, field| match field.id {
            1 if String::TTYPE.accepts(field.ttype) => {
                Ok(Some(Contact::Email(String::read_value(input)?)))
            }
            2 if i64::TTYPE.accepts(field.ttype) => {
                Ok(Some(Contact::Phone(i64::read_value(input)?)))
            }
            3 if User::TTYPE.accepts(field.ttype) => {
                Ok(Some(Contact::Referral(User::read_value(input)?)))
            }
            _ => {
                input.skip(field.ttype)?;
                Ok(None)
            }
        })
    }
}

impl fmt::Display for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contact::Email(email) => write!(f, "Contact(email={email:?})"),
            Contact::Phone(phone) => write!(f, "Contact(phone={phone})"),
            Contact::Referral(user) => write!(f, "Contact(referral={user})"),
        }
    }
}

struct_wire_value!(User, Profile, Contact);

#[cfg(test)]
mod tests {
    use super::*;
    use thrum_protocol::{BinaryCodec, Codec, DynamicStruct, Value};

    #[test]
    fn test_role_values_and_names() {
        assert_eq!(Role::Admin.value(), 5);
        assert_eq!(Role::find_by_value(1), Some(Role::Member));
        assert_eq!(Role::find_by_value(2), None);
        assert_eq!(Role::find_by_name("ADMIN"), Some(Role::Admin));
        assert_eq!(ROLE_SPEC.name_of(5), Some("ADMIN"));
        assert_eq!(Role::default(), Role::Guest);
    }

    #[test]
    fn test_user_builder_requires_id() {
        let err = User::builder().name("ann").build().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::RequiredFieldMissing { field: "id", struct_name: "User" }
        ));
    }

    #[test]
    fn test_user_copy_and_unset() {
        let user = User::builder().id(1).name("ann").build().unwrap();
        let renamed = user.copy().unset_name().build().unwrap();
        assert_eq!(renamed, User::new(1));
        assert_eq!(renamed.name(), None);
        assert_eq!(user.name(), Some("ann"));
    }

    #[test]
    fn test_user_display() {
        let user = User::builder().id(7).name("bo").build().unwrap();
        assert_eq!(user.to_string(), r#"User(id=7, name="bo")"#);
        assert_eq!(User::new(7).to_string(), "User(id=7)");
    }

    #[test]
    fn test_profile_defaults_applied_on_build() {
        let profile = Profile::builder().user(User::new(1)).build().unwrap();
        assert_eq!(profile.score(), 1.5);
        assert!(profile.active());
        assert_eq!(profile.level(), 0);
        assert!(profile.aliases().is_empty());
        assert!(profile.avatar().is_none());
        assert_eq!(profile, Profile::new(User::new(1)));
    }

    #[test]
    fn test_contact_builder_exclusivity() {
        assert_eq!(
            Contact::builder().phone(5).build().unwrap(),
            Contact::Phone(5)
        );
        assert!(matches!(
            Contact::builder().build(),
            Err(ProtocolError::UnionNoValue("Contact"))
        ));
        assert!(matches!(
            Contact::builder().email("a@b").phone(5).build(),
            Err(ProtocolError::UnionMultipleValues("Contact"))
        ));
    }

    #[test]
    fn test_contact_copy_switches_variant() {
        let email = Contact::Email("a@b".into());
        let phone = email.copy().unset_email().phone(9).build().unwrap();
        assert_eq!(phone.phone(), Some(9));
        assert_eq!(phone.email(), None);
    }

    #[test]
    fn test_equal_values_equal_fingerprints() {
        let a = User::builder().id(3).name("x").build().unwrap();
        let b = a.copy().build().unwrap();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), User::new(3).fingerprint().unwrap());
    }

    #[test]
    fn test_signed_zero_scores_hash_alike() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(profile: &Profile) -> u64 {
            let mut hasher = DefaultHasher::new();
            profile.hash(&mut hasher);
            hasher.finish()
        }

        let positive = Profile::builder().user(User::new(1)).score(0.0).build().unwrap();
        let negative = positive.copy().score(-0.0).build().unwrap();
        assert_eq!(positive, negative);
        assert_eq!(hash_of(&positive), hash_of(&negative));
        assert_eq!(positive.fingerprint().unwrap(), negative.fingerprint().unwrap());
    }

    #[test]
    fn test_profile_unknown_primary_role_left_unset() {
        // Encode a profile whose primary_role is 2, which Role doesn't declare.
        let codec = BinaryCodec::default();
        let mut user = DynamicStruct::new(&USER_SPEC);
        user.set(1, Value::I32(1)).unwrap();
        let mut value = DynamicStruct::new(&PROFILE_SPEC);
        value.set(1, Value::Struct(user)).unwrap();
        value.set(11, Value::I32(2)).unwrap();
        let mut writer = codec.writer();
        value.write(&mut writer).unwrap();
        let bytes = writer.into_bytes();

        let profile: Profile = codec.decode(&bytes).unwrap();
        assert_eq!(profile.primary_role(), None);
    }
}
